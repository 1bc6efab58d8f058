//! Currency detection.

use lazy_static::lazy_static;
use regex::Regex;

use super::{ExtractionMatch, FieldExtractor};

lazy_static! {
    /// Currency codes and symbols, checked in order.
    static ref CURRENCY_TABLE: Vec<(&'static str, Regex)> = vec![
        ("PLN", Regex::new(r"(?i)\bPLN\b|\bzł\b|\bzl\b").unwrap()),
        ("EUR", Regex::new(r"(?i)\bEUR\b|€").unwrap()),
        ("CZK", Regex::new(r"(?i)\bCZK\b|\bKč\b").unwrap()),
        ("SEK", Regex::new(r"(?i)\bSEK\b").unwrap()),
        ("HUF", Regex::new(r"(?i)\bHUF\b|\bFt\b").unwrap()),
        ("RON", Regex::new(r"(?i)\bRON\b|\bLei\b").unwrap()),
        ("NOK", Regex::new(r"(?i)\bNOK\b").unwrap()),
        ("DKK", Regex::new(r"(?i)\bDKK\b").unwrap()),
        ("GBP", Regex::new(r"(?i)\bGBP\b|£").unwrap()),
        ("CHF", Regex::new(r"(?i)\bCHF\b").unwrap()),
        ("USD", Regex::new(r"(?i)\bUSD\b|US\$").unwrap()),
    ];
}

/// Currency code extractor backed by a fixed code/symbol table.
pub struct CurrencyExtractor;

impl CurrencyExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CurrencyExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for CurrencyExtractor {
    type Output = ExtractionMatch<String>;

    /// First table entry that occurs anywhere in the text.
    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    /// Every currency present, in table order.
    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        CURRENCY_TABLE
            .iter()
            .filter_map(|(code, pattern)| {
                pattern.find(text).map(|m| {
                    ExtractionMatch::new(code.to_string(), 0.9, m.as_str())
                        .with_position(m.start(), m.end())
                })
            })
            .collect()
    }
}

/// Detect the invoice currency as a three-letter code.
pub fn extract_currency(text: &str) -> Option<String> {
    CurrencyExtractor::new().extract(text).map(|m| m.value)
}
