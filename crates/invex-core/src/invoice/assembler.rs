//! Turns one source document into one invoice record.

use std::path::Path;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::batch::CancelToken;
use crate::error::{EscalationError, InvexError, Result};
use crate::models::{
    EscalationConfig, ExtractionConfig, InvexConfig, InvoiceRecord, Money, RecordStatus,
    SourceDocument,
};

use super::escalation::{Escalation, NullEscalation, build_excerpt, is_worth_escalating, merge_fields};
use super::fallback::{AmountPlan, FallbackOrchestrator};
use super::reconcile::SanityReconciler;
use super::rules::{DateStrategy, FieldExtractor, SellerExtractor, extract_currency, extract_invoice_date};
use super::special::{AmountStrategy, RuleBook, SpecialSellerRule};

/// Invoice and registration numbers encoded in a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFilename {
    pub invoice_number: String,
    pub registration_number: String,
}

/// Decode `<identifier>_<registration>.txt`.
///
/// Dashes in the identifier stand for `/` in the invoice number. Stems
/// without an underscore are not invoice files and yield `None`.
pub fn decode_filename(filename: &str) -> Option<DecodedFilename> {
    let stem = Path::new(filename).file_stem()?.to_str()?;
    let (identifier, registration) = stem.split_once('_')?;

    Some(DecodedFilename {
        invoice_number: identifier.replace('-', "/"),
        registration_number: registration.to_string(),
    })
}

/// Drives detection, fallback, reconciliation and escalation for one file.
pub struct RecordAssembler {
    extraction: ExtractionConfig,
    escalation_config: EscalationConfig,
    rules: RuleBook,
    seller: SellerExtractor,
    orchestrator: FallbackOrchestrator,
    reconciler: SanityReconciler,
    escalation: Box<dyn Escalation>,
}

impl RecordAssembler {
    /// Assembler with no escalation backend attached.
    pub fn new(config: &InvexConfig) -> Result<Self> {
        let extraction = config.extraction.clone();

        Ok(Self {
            rules: RuleBook::compile(&extraction.special_rules)?,
            seller: SellerExtractor::new().with_denylist(&extraction.seller_denylist),
            orchestrator: FallbackOrchestrator::new(extraction.default_vat_rate),
            reconciler: SanityReconciler::new(),
            escalation: Box::new(NullEscalation),
            escalation_config: config.escalation.clone(),
            extraction,
        })
    }

    /// Assembler with the HTTP escalation backend when escalation is enabled.
    #[cfg(feature = "ai")]
    pub fn from_config(config: &InvexConfig) -> Result<Self> {
        let assembler = Self::new(config)?;
        if !config.escalation.enabled {
            return Ok(assembler);
        }

        let backend = super::escalation::OpenAiEscalation::new(&config.escalation)
            .map_err(|e| InvexError::Config(e.to_string()))?;
        Ok(assembler.with_escalation(Box::new(backend)))
    }

    #[cfg(not(feature = "ai"))]
    pub fn from_config(config: &InvexConfig) -> Result<Self> {
        if config.escalation.enabled {
            warn!("Escalation enabled but invex-core was built without the `ai` feature");
        }
        Self::new(config)
    }

    pub fn with_escalation(mut self, escalation: Box<dyn Escalation>) -> Self {
        self.escalation = escalation;
        self
    }

    /// Turn escalation on or off without touching the backend.
    pub fn with_escalation_enabled(mut self, enabled: bool) -> Self {
        self.escalation_config.enabled = enabled;
        self
    }

    /// Build the record for one document.
    ///
    /// Returns `Ok(None)` for files whose name does not encode an invoice.
    /// Errors are fatal for the batch: cancellation and a missing
    /// escalation credential.
    pub fn assemble(&self, doc: &SourceDocument, cancel: &CancelToken) -> Result<Option<InvoiceRecord>> {
        let Some(decoded) = decode_filename(&doc.filename) else {
            debug!("Skipping {}: no underscore in file name", doc.filename);
            return Ok(None);
        };

        let mut record = InvoiceRecord::empty(
            decoded.invoice_number,
            decoded.registration_number,
            doc.filename.clone(),
        );
        let text = doc.raw_text.as_str();
        let rule = self.rules.find(&record.invoice_number);

        if let Some(rule) = rule {
            record.metadata.rule = Some(rule.name().to_string());
            if *rule.amount_strategy() == AmountStrategy::Confirmation {
                self.fill_confirmation(&mut record, text, rule);
                return Ok(Some(record));
            }
        }

        record.seller_name = match rule {
            Some(rule) => Some(rule.seller().to_string()),
            None => self.seller.extract(text).map(|m| m.value),
        };

        let general = DateStrategy::General;
        let date_strategy = rule.map(SpecialSellerRule::date_strategy).unwrap_or(&general);
        record.issue_date = extract_invoice_date(text, date_strategy);

        record.currency = extract_currency(text)
            .or_else(|| rule.and_then(|r| r.default_currency()).map(str::to_string));

        let plan = rule
            .and_then(|r| AmountPlan::for_strategy(r.amount_strategy()))
            .unwrap_or_default();
        let amounts = self.orchestrator.run(text, &plan);
        record.net = amounts.net;
        record.vat = amounts.vat;
        record.gross = amounts.gross;
        record.metadata.amount_source = amounts.source.map(str::to_string);

        debug!(
            "{}: amounts from {}",
            doc.filename,
            amounts.source.unwrap_or("nothing")
        );

        self.reconciler.reconcile(&mut record);

        if self.should_escalate(&record, text) {
            self.escalate(&mut record, text, cancel)?;
        }

        Ok(Some(record))
    }

    /// Record for a file whose text could not be read.
    pub fn unreadable(&self, filename: &str, reason: &str) -> Option<InvoiceRecord> {
        let decoded = decode_filename(filename)?;
        let mut record = InvoiceRecord::empty(decoded.invoice_number, decoded.registration_number, filename);
        record.status = RecordStatus::Unreadable {
            reason: reason.to_string(),
        };
        Some(record)
    }

    fn fill_confirmation(&self, record: &mut InvoiceRecord, text: &str, rule: &SpecialSellerRule) {
        record.status = RecordStatus::Confirmation;
        record.seller_name = Some(rule.seller().to_string());
        record.issue_date = None;
        record.net = Money::Absent;
        record.vat = Money::new(Decimal::ZERO);
        record.gross = Money::Absent;
        record.currency = Some(
            extract_currency(text)
                .or_else(|| rule.default_currency().map(str::to_string))
                .unwrap_or_else(|| self.extraction.default_currency.clone()),
        );
    }

    fn should_escalate(&self, record: &InvoiceRecord, text: &str) -> bool {
        self.escalation_config.enabled
            && !record.missing_fields().is_empty()
            && is_worth_escalating(text)
    }

    fn escalate(&self, record: &mut InvoiceRecord, text: &str, cancel: &CancelToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(InvexError::Cancelled);
        }

        let excerpt = build_excerpt(
            text,
            self.escalation_config.max_excerpt_lines,
            self.escalation_config.max_excerpt_chars,
        );
        debug!(
            "{}: escalating ({} missing, {} excerpt chars)",
            record.source_filename,
            record.missing_fields().join(", "),
            excerpt.chars().count()
        );

        match self.escalation.extract(&excerpt) {
            Ok(fields) => {
                if merge_fields(record, fields) {
                    self.reconciler.reconcile(record);
                }
                Ok(())
            }
            Err(EscalationError::MissingCredential(name)) => Err(InvexError::MissingCredential(name)),
            Err(e) => {
                warn!("{}: escalation failed: {}", record.source_filename, e);
                record.metadata.warnings.push(format!("escalation failed: {}", e));
                Ok(())
            }
        }
    }
}
