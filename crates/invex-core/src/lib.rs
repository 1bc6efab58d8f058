//! Core library for turning OCR invoice text into bookkeeping records.
//!
//! This crate provides:
//! - Amount and date normalization for OCR-damaged tokens
//! - Seller, date, currency and VAT-rate detectors
//! - An ordered amount fallback chain with sanity reconciliation
//! - Optional escalation of incomplete records to a remote extraction service
//! - Directory batch processing with per-file isolation

pub mod batch;
pub mod error;
pub mod invoice;
pub mod models;

pub use batch::{BatchOutcome, BatchProcessor, CancelToken};
pub use error::{EscalationError, ExtractionError, InvexError, Result};
pub use invoice::{Escalation, NullEscalation, PartialFields, RecordAssembler};
#[cfg(feature = "ai")]
pub use invoice::escalation::OpenAiEscalation;
pub use invoice::rules::{normalize_date, parse_amount};
pub use models::{
    EXPORT_HEADERS, ExtractionMetadata, InvexConfig, InvoiceRecord, Money, RecordStatus,
    SourceDocument,
};
