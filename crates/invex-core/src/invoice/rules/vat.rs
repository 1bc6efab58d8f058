//! VAT rate hint detection.

use rust_decimal::Decimal;

use super::amounts::parse_amount;
use super::patterns::PERCENT;
use super::{ExtractionMatch, FieldExtractor};

/// Highest plausible VAT rate, in percent.
const MAX_RATE_PERCENT: i64 = 30;

/// Extracts percentage tokens in the plausible VAT range as fractions.
pub struct VatRateExtractor;

impl VatRateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VatRateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for VatRateExtractor {
    type Output = ExtractionMatch<Decimal>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let max = Decimal::from(MAX_RATE_PERCENT);

        PERCENT
            .captures_iter(text)
            .filter_map(|caps| {
                let percent = parse_amount(&caps[1])?;
                if percent < Decimal::ZERO || percent > max {
                    return None;
                }
                let full = caps.get(0)?;
                Some(
                    ExtractionMatch::new(percent / Decimal::ONE_HUNDRED, 0.9, full.as_str())
                        .with_position(full.start(), full.end()),
                )
            })
            .collect()
    }
}

/// VAT rate hint: the largest percentage in `[0, 30]`, as a fraction.
///
/// Reduced rates are usually smaller, so the principal rate wins.
pub fn extract_vat_rate_hint(text: &str) -> Option<Decimal> {
    VatRateExtractor::new()
        .extract_all(text)
        .into_iter()
        .map(|m| m.value)
        .max()
}

/// Split a gross amount into (net, vat) at `rate`, both rounded to cents.
/// `None` when the amounts are outside `Decimal` range.
pub fn split_gross(gross: Decimal, rate: Decimal) -> Option<(Decimal, Decimal)> {
    let divisor = Decimal::ONE.checked_add(rate)?;
    let net = if divisor.is_zero() { gross } else { gross.checked_div(divisor)? };
    let net = round_cents(net);
    Some((net, round_cents(gross.checked_sub(net)?)))
}

pub(crate) fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_rate_hint_takes_maximum() {
        let text = "Stawka 8% 100,00 8,00\nStawka 23 % 1000,00 230,00";
        assert_eq!(extract_vat_rate_hint(text), Some(dec("0.23")));
    }

    #[test]
    fn test_rate_hint_ignores_out_of_range() {
        assert_eq!(extract_vat_rate_hint("Rabat 50% i 5,5%"), Some(dec("0.055")));
        assert_eq!(extract_vat_rate_hint("Rabat 50%"), None);
        assert_eq!(extract_vat_rate_hint("no rates"), None);
    }

    #[test]
    fn test_zero_rate_counts() {
        assert_eq!(extract_vat_rate_hint("VAT 0%"), Some(Decimal::ZERO));
    }

    #[test]
    fn test_split_gross() {
        assert_eq!(split_gross(dec("123.00"), dec("0.23")), Some((dec("100.00"), dec("23.00"))));
        assert_eq!(split_gross(dec("100.00"), dec("0.23")), Some((dec("81.30"), dec("18.70"))));
        assert_eq!(split_gross(dec("-123.00"), dec("0.23")), Some((dec("-100.00"), dec("-23.00"))));
        assert_eq!(split_gross(Decimal::MAX, dec("-0.9999999999")), None);
    }
}
