//! Rule-based field detectors for OCR invoice text.

pub mod amounts;
pub mod currency;
pub mod dates;
pub mod patterns;
pub mod seller;
pub mod vat;

pub use amounts::{AmountExtractor, extract_gross, line_amounts, parse_amount, try_parse_amount};
pub use currency::{CurrencyExtractor, extract_currency};
pub use dates::{DateExtractor, DateStrategy, extract_invoice_date, normalize_date, parse_date};
pub use seller::SellerExtractor;
pub use vat::{VatRateExtractor, extract_vat_rate_hint};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// Extracted value with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// Byte span in the source text.
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, confidence: f32, source: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }
}
