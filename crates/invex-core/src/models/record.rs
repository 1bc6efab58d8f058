//! Bookkeeping record produced for each OCR text file.

use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Column headers of the tabular export, in order.
pub const EXPORT_HEADERS: [&str; 7] = [
    "Invoice Number",
    "Issue Date",
    "Net",
    "VAT",
    "Currency",
    "Gross",
    "Registration Number",
];

/// One OCR text file handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// File name including the `.txt` extension.
    pub filename: String,
    /// Raw OCR text.
    pub raw_text: String,
}

impl SourceDocument {
    pub fn new(filename: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            raw_text: raw_text.into(),
        }
    }
}

/// A monetary value with cent precision, or an explicit absent marker.
///
/// Zero is a real amount; "could not be determined" is `Absent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<Decimal>", into = "Option<Decimal>")]
pub enum Money {
    #[default]
    Absent,
    Amount(Decimal),
}

impl Money {
    /// Create an amount rounded to two places (midpoint away from zero).
    pub fn new(value: Decimal) -> Self {
        let mut cents = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        cents.rescale(2);
        Money::Amount(cents)
    }

    pub fn value(&self) -> Option<Decimal> {
        match self {
            Money::Amount(v) => Some(*v),
            Money::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Money::Absent)
    }

    pub fn is_present(&self) -> bool {
        !self.is_absent()
    }

    /// Same value with the sign flipped; absent stays absent.
    pub fn negated(&self) -> Self {
        match self {
            Money::Amount(v) => Money::Amount(-*v),
            Money::Absent => Money::Absent,
        }
    }

    /// Fill this slot from `other` only if it is currently absent.
    pub fn fill_from(&mut self, other: Money) -> bool {
        if self.is_absent() && other.is_present() {
            *self = other;
            true
        } else {
            false
        }
    }
}

impl From<Option<Decimal>> for Money {
    fn from(value: Option<Decimal>) -> Self {
        value.map(Money::new).unwrap_or(Money::Absent)
    }
}

impl From<Money> for Option<Decimal> {
    fn from(money: Money) -> Self {
        money.value()
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money::new(value)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Money::Amount(v) => write!(f, "{:.2}", v),
            Money::Absent => Ok(()),
        }
    }
}

/// Whether the record was extracted normally.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RecordStatus {
    /// Text was read and the pipeline ran.
    #[default]
    Extracted,
    /// Confirmation document handled by a fixed rule.
    Confirmation,
    /// The file could not be read; only filename-derived fields are set.
    Unreadable { reason: String },
}

/// Where the record's values came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    /// Name of the amount detector that filled net/VAT first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_source: Option<String>,

    /// Special rule that matched the invoice number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,

    /// Escalation filled at least one field.
    pub escalated: bool,

    /// Confidence reported by the escalation service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_confidence: Option<f32>,

    /// Issues noticed during extraction.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Structured bookkeeping record for one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Invoice number decoded from the file name.
    pub invoice_number: String,

    /// Issue date as `dd.mm.yyyy`.
    pub issue_date: Option<String>,

    /// Registration number decoded from the file name.
    pub registration_number: String,

    /// Seller name, upper-cased.
    pub seller_name: Option<String>,

    pub net: Money,
    pub vat: Money,
    pub gross: Money,

    /// Three-letter currency code.
    pub currency: Option<String>,

    /// File the record was built from.
    pub source_filename: String,

    pub status: RecordStatus,

    pub metadata: ExtractionMetadata,
}

impl InvoiceRecord {
    /// Record with only the filename-derived fields set.
    pub fn empty(
        invoice_number: impl Into<String>,
        registration_number: impl Into<String>,
        source_filename: impl Into<String>,
    ) -> Self {
        Self {
            invoice_number: invoice_number.into(),
            issue_date: None,
            registration_number: registration_number.into(),
            seller_name: None,
            net: Money::Absent,
            vat: Money::Absent,
            gross: Money::Absent,
            currency: None,
            source_filename: source_filename.into(),
            status: RecordStatus::Extracted,
            metadata: ExtractionMetadata::default(),
        }
    }

    /// Cells for the tabular export, matching [`EXPORT_HEADERS`].
    pub fn export_row(&self) -> [String; 7] {
        [
            self.invoice_number.clone(),
            self.issue_date.clone().unwrap_or_default(),
            self.net.to_string(),
            self.vat.to_string(),
            self.currency.clone().unwrap_or_default(),
            self.gross.to_string(),
            self.registration_number.clone(),
        ]
    }

    /// Fields a bookkeeper needs that are still missing.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.seller_name.is_none() {
            missing.push("seller");
        }
        if self.net.is_absent() {
            missing.push("net");
        }
        if self.vat.is_absent() {
            missing.push("vat");
        }
        missing
    }
}
