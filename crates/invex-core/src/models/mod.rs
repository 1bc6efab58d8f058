//! Data models for records and configuration.

pub mod config;
pub mod record;

pub use config::{BatchConfig, EscalationConfig, ExtractionConfig, InvexConfig};
pub use record::{
    EXPORT_HEADERS, ExtractionMetadata, InvoiceRecord, Money, RecordStatus, SourceDocument,
};
