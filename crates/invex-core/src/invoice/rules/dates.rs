//! Date normalization and invoice-date detection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;

use super::patterns::{DATE_DMY, DATE_TOKEN, DATE_YMD, ISSUE_DATE_LABEL};
use super::{ExtractionMatch, FieldExtractor};

/// Canonical output format.
const CANONICAL: &str = "%d.%m.%Y";

/// How the invoice date is located in the text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DateStrategy {
    /// Labeled issue date first, then the first valid date anywhere.
    #[default]
    General,
    /// First valid date on the first line containing `label`.
    LabeledLine { label: String },
    /// The document carries no invoice date.
    None,
}

/// Date-shaped token extractor. Only real calendar dates are returned.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        DATE_TOKEN
            .find_iter(text)
            .filter_map(|m| {
                parse_date(m.as_str()).ok().map(|date| {
                    ExtractionMatch::new(date, 0.9, m.as_str()).with_position(m.start(), m.end())
                })
            })
            .collect()
    }
}

/// Parse `yyyy-mm-dd`, `dd.mm.yyyy`, `dd/mm/yyyy` or `dd-mm-yyyy`.
///
/// Impossible dates (month 13, 30 February) are errors, never repaired.
pub fn parse_date(token: &str) -> Result<NaiveDate, ExtractionError> {
    let token = token.trim();
    let invalid = || ExtractionError::UnparsableDate(token.to_string());

    let (year, month, day) = if let Some(caps) = DATE_YMD.captures(token) {
        (caps[1].parse().ok(), caps[2].parse().ok(), caps[3].parse().ok())
    } else if let Some(caps) = DATE_DMY.captures(token) {
        // Mixed separators like 05.01-2024 are not a date.
        if caps[2] != caps[4] {
            return Err(invalid());
        }
        (caps[5].parse().ok(), caps[3].parse().ok(), caps[1].parse().ok())
    } else {
        return Err(invalid());
    };

    match (year, month, day) {
        (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d).ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

/// Normalize a date token to `dd.mm.yyyy`; anything invalid is absent.
pub fn normalize_date(token: &str) -> Option<String> {
    parse_date(token).ok().map(|d| d.format(CANONICAL).to_string())
}

/// Locate the invoice date according to `strategy`.
pub fn extract_invoice_date(text: &str, strategy: &DateStrategy) -> Option<String> {
    let extractor = DateExtractor::new();

    let date = match strategy {
        DateStrategy::None => return None,
        DateStrategy::LabeledLine { label } => {
            let label = label.to_lowercase();
            text.lines()
                .filter(|line| line.to_lowercase().contains(&label))
                .find_map(|line| extractor.extract(line))
                .or_else(|| general_date(text, &extractor))
        }
        DateStrategy::General => general_date(text, &extractor),
    };

    date.map(|m| m.value.format(CANONICAL).to_string())
}

fn general_date(text: &str, extractor: &DateExtractor) -> Option<ExtractionMatch<NaiveDate>> {
    text.lines()
        .filter(|line| ISSUE_DATE_LABEL.is_match(line))
        .find_map(|line| extractor.extract(line))
        .or_else(|| extractor.extract(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_date_forms() {
        assert_eq!(normalize_date("2024-01-05"), Some("05.01.2024".to_string()));
        assert_eq!(normalize_date("05.01.2024"), Some("05.01.2024".to_string()));
        assert_eq!(normalize_date("05/01/2024"), Some("05.01.2024".to_string()));
        assert_eq!(normalize_date("05-01-2024"), Some("05.01.2024".to_string()));
        assert_eq!(normalize_date("5.1.2024"), Some("05.01.2024".to_string()));
    }

    #[test]
    fn test_normalize_date_rejects_impossible() {
        assert_eq!(normalize_date("2024-02-30"), None);
        assert_eq!(normalize_date("30.02.2024"), None);
        assert_eq!(normalize_date("31.04.2024"), None);
        assert_eq!(normalize_date("01.13.2024"), None);
        assert_eq!(normalize_date("29.02.2023"), None);
        assert_eq!(normalize_date("29.02.2024"), Some("29.02.2024".to_string()));
    }

    #[test]
    fn test_normalize_date_rejects_other_shapes() {
        assert_eq!(normalize_date("05.01-2024"), None);
        assert_eq!(normalize_date("15.01.24"), None);
        assert_eq!(normalize_date("yesterday"), None);
        assert_eq!(
            parse_date("2024/01/05"),
            Err(ExtractionError::UnparsableDate("2024/01/05".to_string()))
        );
    }

    #[test]
    fn test_normalize_date_idempotent() {
        for token in ["2024-01-05", "5/1/2024", "31-12-2023"] {
            let once = normalize_date(token).unwrap();
            assert_eq!(normalize_date(&once), Some(once.clone()));
        }
    }

    #[test]
    fn test_general_prefers_labeled_issue_date() {
        let text = "Termin płatności: 29.01.2024\nData wystawienia: 15.01.2024\n";
        assert_eq!(
            extract_invoice_date(text, &DateStrategy::General),
            Some("15.01.2024".to_string())
        );
    }

    #[test]
    fn test_general_falls_back_to_first_valid_date() {
        let text = "Nr 31.02.2024 (typo)\nDelivered 2024-03-07\nPaid 10.03.2024";
        assert_eq!(
            extract_invoice_date(text, &DateStrategy::General),
            Some("07.03.2024".to_string())
        );
    }

    #[test]
    fn test_labeled_line_strategy() {
        let text = "Printed 01-01-2024\nDATA: 12-03-2024\n";
        let strategy = DateStrategy::LabeledLine { label: "data:".to_string() };
        assert_eq!(extract_invoice_date(text, &strategy), Some("12.03.2024".to_string()));
    }

    #[test]
    fn test_none_strategy() {
        assert_eq!(extract_invoice_date("15.01.2024", &DateStrategy::None), None);
    }

    #[test]
    fn test_extract_all_skips_invalid() {
        let extractor = DateExtractor::new();
        let results = extractor.extract_all("30.02.2024 and 01.03.2024");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].value, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }
}
