//! Seller name detection.
//!
//! Two strategies, first hit wins:
//! 1. Header-anchored scan: below a seller header, the first qualifying
//!    line within [`HEADER_WINDOW`] lines, stopping at a buyer header.
//! 2. Fallback: the first qualifying line among the first
//!    [`FALLBACK_LINES`] non-empty lines that is long and digit-free.
//!
//! Supplier rules keyed on the invoice number run before either strategy
//! and live in [`crate::invoice::special`].

use super::patterns::{BUYER_SECTION, LABEL_LINE, SELLER_SECTION, TAX_ID};
use super::{ExtractionMatch, FieldExtractor};

/// Lines scanned below a seller header.
pub const HEADER_WINDOW: usize = 6;

/// Non-empty lines scanned by the fallback.
pub const FALLBACK_LINES: usize = 20;

/// Seller name extractor.
pub struct SellerExtractor {
    denylist: Vec<String>,
}

impl SellerExtractor {
    /// Create a seller extractor with an empty denylist.
    pub fn new() -> Self {
        Self { denylist: Vec::new() }
    }

    /// Set noise substrings that disqualify a candidate line.
    pub fn with_denylist<I, S>(mut self, denylist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.denylist = denylist
            .into_iter()
            .map(|s| s.as_ref().to_uppercase())
            .collect();
        self
    }

    /// Whether `line` could be a party name at all.
    pub fn qualifies(&self, line: &str) -> bool {
        let line = line.trim();

        if line.chars().count() < 4 {
            return false;
        }
        if !line.chars().any(char::is_alphabetic) {
            return false;
        }
        if LABEL_LINE.is_match(line) {
            return false;
        }
        if TAX_ID.is_match(line) {
            return false;
        }

        let upper = line.to_uppercase();
        !self.denylist.iter().any(|noise| upper.contains(noise.as_str()))
    }

    fn from_header(&self, lines: &[&str]) -> Option<ExtractionMatch<String>> {
        for (i, line) in lines.iter().enumerate() {
            if !SELLER_SECTION.is_match(line) {
                continue;
            }

            for candidate in lines.iter().skip(i + 1).take(HEADER_WINDOW) {
                let candidate = candidate.trim();
                if candidate.is_empty() {
                    continue;
                }
                if BUYER_SECTION.is_match(candidate) {
                    break;
                }
                if self.qualifies(candidate) {
                    return Some(ExtractionMatch::new(candidate.to_uppercase(), 0.85, candidate));
                }
            }
        }

        None
    }

    fn from_leading_lines(&self, lines: &[&str]) -> Option<ExtractionMatch<String>> {
        lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .take(FALLBACK_LINES)
            .find(|l| {
                l.chars().count() > 8
                    && !l.chars().any(|c| c.is_ascii_digit())
                    && !SELLER_SECTION.is_match(l)
                    && !BUYER_SECTION.is_match(l)
                    && self.qualifies(l)
            })
            .map(|l| ExtractionMatch::new(l.to_uppercase(), 0.5, l))
    }
}

impl Default for SellerExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for SellerExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        let lines: Vec<&str> = text.lines().collect();
        self.from_header(&lines)
            .or_else(|| self.from_leading_lines(&lines))
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let lines: Vec<&str> = text.lines().collect();
        self.from_header(&lines)
            .into_iter()
            .chain(self.from_leading_lines(&lines))
            .collect()
    }
}
