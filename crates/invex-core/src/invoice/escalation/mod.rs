//! Last-resort escalation of incomplete records to a remote extraction service.
//!
//! The service sits behind the [`Escalation`] trait so the pipeline can run
//! with [`NullEscalation`] when there is no network or credential, and tests
//! can plug in fakes. Whatever the service answers only fills fields that
//! local detection left absent.

#[cfg(feature = "ai")]
pub mod openai;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::EscalationError;
use crate::models::{InvoiceRecord, Money};

use super::rules::amounts::{has_amount, parse_amount};
use super::rules::patterns::{
    BUYER_SECTION, GROSS_KEYWORDS, LEGAL_FORMS, NET_KEYWORDS, SELLER_SECTION, TOTALS_KEYWORDS,
    VAT_KEYWORDS, contains_any,
};

#[cfg(feature = "ai")]
pub use openai::OpenAiEscalation;

/// Fixed instruction sent with every excerpt.
pub const INSTRUCTION: &str = "You extract fields from OCR text of a single invoice. \
Return only JSON matching the schema. Use null for any field that is not clearly present. \
sellerName is the issuing company, never the buyer. net and vat are the invoice totals as numbers. \
currency is a three-letter ISO code. evidence lists the source lines you used.";

/// Fields an escalation call can contribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialFields {
    pub seller_name: Option<String>,
    pub net: Money,
    pub vat: Money,
    pub currency: Option<String>,
    pub confidence: Option<f32>,
    pub evidence: Vec<String>,
}

impl PartialFields {
    pub fn is_empty(&self) -> bool {
        self.seller_name.is_none()
            && self.net.is_absent()
            && self.vat.is_absent()
            && self.currency.is_none()
    }
}

/// Remote extraction capability.
pub trait Escalation: Send + Sync {
    /// Extract whatever fields the service can find in `excerpt`.
    fn extract(&self, excerpt: &str) -> Result<PartialFields, EscalationError>;
}

/// Escalation that never contributes anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEscalation;

impl Escalation for NullEscalation {
    fn extract(&self, _excerpt: &str) -> Result<PartialFields, EscalationError> {
        Ok(PartialFields::default())
    }
}

/// Service answer, as constrained by [`response_schema`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EscalationResponse {
    #[serde(rename = "sellerName")]
    pub seller_name: Option<String>,
    pub net: Option<Value>,
    pub vat: Option<Value>,
    pub currency: Option<String>,
    pub confidence: f32,
    pub evidence: Vec<String>,
}

impl EscalationResponse {
    /// Parse and validate the model's JSON content.
    pub fn parse(content: &str) -> Result<Self, EscalationError> {
        let response: Self = serde_json::from_str(content.trim())
            .map_err(|e| EscalationError::Schema(e.to_string()))?;

        if !(0.0..=1.0).contains(&response.confidence) {
            return Err(EscalationError::Schema(format!(
                "confidence {} outside 0..1",
                response.confidence
            )));
        }

        Ok(response)
    }

    pub fn into_fields(self) -> PartialFields {
        PartialFields {
            seller_name: self
                .seller_name
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty()),
            net: json_amount(self.net.as_ref()),
            vat: json_amount(self.vat.as_ref()),
            currency: self.currency.as_deref().and_then(currency_code),
            confidence: Some(self.confidence),
            evidence: self.evidence,
        }
    }
}

/// JSON schema the service must answer with.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["sellerName", "net", "vat", "currency", "confidence", "evidence"],
        "properties": {
            "sellerName": { "type": ["string", "null"] },
            "net": { "type": ["number", "null"] },
            "vat": { "type": ["number", "null"] },
            "currency": { "type": ["string", "null"] },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
            "evidence": { "type": "array", "items": { "type": "string" } }
        }
    })
}

fn json_amount(value: Option<&Value>) -> Money {
    let amount = match value {
        Some(Value::Number(n)) => n
            .to_string()
            .parse::<Decimal>()
            .ok()
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        Some(Value::String(s)) => parse_amount(s),
        _ => None,
    };
    Money::from(amount)
}

fn currency_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_uppercase();
    (code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())).then_some(code)
}

/// Cheap pre-check: at least one amount and some totals vocabulary.
pub fn is_worth_escalating(text: &str) -> bool {
    has_amount(text) && contains_any(text, TOTALS_KEYWORDS)
}

/// Lines carrying totals or party vocabulary, bounded in lines and characters.
pub fn build_excerpt(text: &str, max_lines: usize, max_chars: usize) -> String {
    let excerpt = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && is_excerpt_line(line))
        .take(max_lines)
        .collect::<Vec<_>>()
        .join("\n");

    match excerpt.char_indices().nth(max_chars) {
        Some((cut, _)) => excerpt[..cut].to_string(),
        None => excerpt,
    }
}

fn is_excerpt_line(line: &str) -> bool {
    contains_any(line, TOTALS_KEYWORDS)
        || contains_any(line, NET_KEYWORDS)
        || contains_any(line, VAT_KEYWORDS)
        || contains_any(line, GROSS_KEYWORDS)
        || contains_any(line, LEGAL_FORMS)
        || SELLER_SECTION.is_match(line)
        || BUYER_SECTION.is_match(line)
}

/// Fill the record's absent fields from `fields`; true if anything was filled.
pub fn merge_fields(record: &mut InvoiceRecord, fields: PartialFields) -> bool {
    let mut filled = false;

    if record.seller_name.is_none() && fields.seller_name.is_some() {
        record.seller_name = fields.seller_name;
        filled = true;
    }
    filled |= record.net.fill_from(fields.net);
    filled |= record.vat.fill_from(fields.vat);
    if record.currency.is_none() && fields.currency.is_some() {
        record.currency = fields.currency;
        filled = true;
    }

    if filled {
        record.metadata.escalated = true;
        record.metadata.escalation_confidence = fields.confidence;
    }
    filled
}
