//! Amount parsing and monetary token scanning.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::ExtractionError;

use super::patterns::{AMOUNT_TOKEN, CURRENCY_AFFIX, DASH_DECIMAL};
use super::{ExtractionMatch, FieldExtractor};

/// Monetary token extractor.
///
/// Finds amounts with exactly two decimal places and rejects tokens that
/// are really fragments of dates, tax identifiers or percentages.
pub struct AmountExtractor;

impl AmountExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AmountExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for AmountExtractor {
    type Output = ExtractionMatch<Decimal>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();

        for m in AMOUNT_TOKEN.find_iter(text) {
            let (start, end) = (m.start(), m.end());
            if !stands_alone(text, start, end) {
                continue;
            }

            let negative = has_minus_sign(text, start);
            if let Some(amount) = parse_amount(m.as_str()) {
                let value = if negative { -amount } else { amount };
                let source_start = if negative { start - 1 } else { start };
                results.push(
                    ExtractionMatch::new(value, 0.8, &text[source_start..end])
                        .with_position(source_start, end),
                );
            }
        }

        results
    }
}

/// Parse an OCR-damaged amount, reporting why it failed.
///
/// Accepts `1 234,56`, `1.234,56`, `1,234.56`, `1234.56` and the dash
/// form `1234-56`. When both `,` and `.` occur, the right-most one is the
/// decimal separator. Spaces, apostrophes and a leading or trailing
/// currency are ignored; any other letter makes the token unparsable.
pub fn try_parse_amount(token: &str) -> Result<Decimal, ExtractionError> {
    let unparsable = || ExtractionError::UnparsableAmount(token.to_string());

    let bare = CURRENCY_AFFIX.replace_all(token.trim(), "");
    let cleaned: String = bare
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'')
        .map(|c| if c == '\u{2212}' { '-' } else { c })
        .collect();

    if !cleaned
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
    {
        return Err(unparsable());
    }

    let (negative, body) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };
    let body = DASH_DECIMAL.replace(body, "$1.$2");
    if body.contains('-') {
        return Err(unparsable());
    }

    let normalized = match (body.rfind(','), body.rfind('.')) {
        (Some(c), Some(d)) if c > d => body.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => body.replace(',', ""),
        (Some(_), None) => body.replace(',', "."),
        _ => body.into_owned(),
    };

    let amount = Decimal::from_str(&normalized).map_err(|_| unparsable())?;

    Ok(if negative { -amount } else { amount })
}

/// Parse an OCR-damaged amount; anything unreadable is absent.
pub fn parse_amount(token: &str) -> Option<Decimal> {
    try_parse_amount(token).ok()
}

/// All monetary values on one line, in reading order.
pub fn line_amounts(line: &str) -> Vec<Decimal> {
    AmountExtractor::new()
        .extract_all(line)
        .into_iter()
        .map(|m| m.value)
        .collect()
}

/// Gross total: the monetary token with the largest magnitude.
pub fn extract_gross(text: &str) -> Option<Decimal> {
    AmountExtractor::new()
        .extract_all(text)
        .into_iter()
        .map(|m| m.value)
        .fold(None, |best: Option<Decimal>, v| match best {
            Some(b) if b.abs() >= v.abs() => Some(b),
            _ => Some(v),
        })
}

/// Whether the text holds at least one monetary token.
pub fn has_amount(text: &str) -> bool {
    AmountExtractor::new().extract(text).is_some()
}

fn char_before(text: &str, idx: usize) -> Option<char> {
    text[..idx].chars().next_back()
}

fn char_after(text: &str, idx: usize) -> Option<char> {
    text[idx..].chars().next()
}

/// Reject matches glued to other digits (dates, identifiers, longer numbers)
/// or followed by a percent sign.
fn stands_alone(text: &str, start: usize, end: usize) -> bool {
    if let Some(prev) = char_before(text, start) {
        if prev.is_ascii_digit() {
            return false;
        }
        if matches!(prev, '.' | ',' | '/' | '-') {
            let before = char_before(text, start - prev.len_utf8());
            if before.is_some_and(|c| c.is_ascii_digit()) {
                return false;
            }
        }
    }

    if let Some(next) = char_after(text, end) {
        if next.is_ascii_digit() || next == '%' {
            return false;
        }
        if matches!(next, '.' | ',' | '/' | '-') {
            let after = char_after(text, end + next.len_utf8());
            if after.is_some_and(|c| c.is_ascii_digit()) {
                return false;
            }
        }
        if next == ' ' && text[end + 1..].starts_with('%') {
            return false;
        }
    }

    true
}

fn has_minus_sign(text: &str, start: usize) -> bool {
    if char_before(text, start) != Some('-') {
        return false;
    }
    let before = char_before(text, start - 1);
    !before.is_some_and(|c| c.is_alphanumeric())
}
