//! Cross-field consistency checks on net, VAT and gross.

use rust_decimal::Decimal;

use crate::models::{InvoiceRecord, Money};

use super::fallback::SUBTRACTION_TOLERANCE;

/// Enforces the VAT sign rule and reports other inconsistencies.
///
/// Only VAT is ever corrected. Net and gross are left as read; a sign
/// mismatch between them becomes a warning on the record.
#[derive(Debug, Clone, Copy, Default)]
pub struct SanityReconciler;

impl SanityReconciler {
    pub fn new() -> Self {
        Self
    }

    /// VAT with its sign aligned to net's. Absent inputs pass through.
    pub fn align_vat(&self, net: Money, vat: Money) -> Money {
        match (net.value(), vat.value()) {
            (Some(n), Some(v)) if n >= Decimal::ZERO && v < Decimal::ZERO => vat.negated(),
            (Some(n), Some(v)) if n < Decimal::ZERO && v > Decimal::ZERO => vat.negated(),
            _ => vat,
        }
    }

    /// Apply the rules to a record in place.
    pub fn reconcile(&self, record: &mut InvoiceRecord) {
        let aligned = self.align_vat(record.net, record.vat);
        if aligned != record.vat {
            tracing::debug!(
                "{}: VAT sign flipped to match net",
                record.source_filename
            );
            record.vat = aligned;
        }

        if let (Some(net), Some(gross)) = (record.net.value(), record.gross.value()) {
            if !net.is_zero() && !gross.is_zero() && net.is_sign_negative() != gross.is_sign_negative() {
                push_warning(record, "net and gross signs disagree".to_string());
            }

            if let Some(vat) = record.vat.value() {
                match net.checked_add(vat).and_then(|sum| sum.checked_sub(gross)) {
                    Some(gap) if gap.abs() <= SUBTRACTION_TOLERANCE => {}
                    Some(gap) => push_warning(
                        record,
                        format!("net + VAT differs from gross by {:.2}", gap.abs()),
                    ),
                    None => push_warning(record, "net + VAT is out of range of gross".to_string()),
                }
            }
        }
    }
}

fn push_warning(record: &mut InvoiceRecord, warning: String) {
    if !record.metadata.warnings.contains(&warning) {
        record.metadata.warnings.push(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn money(s: &str) -> Money {
        Money::new(Decimal::from_str(s).unwrap())
    }

    fn record(net: Money, vat: Money, gross: Money) -> InvoiceRecord {
        let mut record = InvoiceRecord::empty("1", "A", "1_A.txt");
        record.net = net;
        record.vat = vat;
        record.gross = gross;
        record
    }

    #[test]
    fn test_vat_follows_positive_net() {
        let mut r = record(money("100.00"), money("-23.00"), money("123.00"));
        SanityReconciler::new().reconcile(&mut r);
        assert_eq!(r.vat, money("23.00"));
        assert!(r.metadata.warnings.is_empty());
    }

    #[test]
    fn test_vat_follows_negative_net() {
        let mut r = record(money("-100.00"), money("23.00"), money("-123.00"));
        SanityReconciler::new().reconcile(&mut r);
        assert_eq!(r.vat, money("-23.00"));
        assert!(r.metadata.warnings.is_empty());
    }

    #[test]
    fn test_zero_net_counts_as_non_negative() {
        let reconciler = SanityReconciler::new();
        assert_eq!(reconciler.align_vat(money("0.00"), money("-5.00")), money("5.00"));
    }

    #[test]
    fn test_absent_values_untouched() {
        let reconciler = SanityReconciler::new();
        assert_eq!(reconciler.align_vat(Money::Absent, money("-5.00")), money("-5.00"));
        assert_eq!(reconciler.align_vat(money("5.00"), Money::Absent), Money::Absent);
    }

    #[test]
    fn test_net_gross_mismatch_is_only_a_warning() {
        let mut r = record(money("100.00"), money("23.00"), money("-123.00"));
        SanityReconciler::new().reconcile(&mut r);
        assert_eq!(r.net, money("100.00"));
        assert_eq!(r.gross, money("-123.00"));
        assert!(r.metadata.warnings.iter().any(|w| w.contains("signs disagree")));
    }

    #[test]
    fn test_out_of_range_sum_warns_without_overflow() {
        let max = Money::new(Decimal::MAX);
        let mut r = record(max, max, max);
        SanityReconciler::new().reconcile(&mut r);
        assert_eq!(r.net, max);
        assert_eq!(r.metadata.warnings, vec!["net + VAT is out of range of gross".to_string()]);
    }

    #[test]
    fn test_idempotent() {
        let mut r = record(money("100.00"), money("-23.00"), money("-500.00"));
        let reconciler = SanityReconciler::new();
        reconciler.reconcile(&mut r);
        let once = r.clone();
        reconciler.reconcile(&mut r);
        assert_eq!(r, once);
    }
}
