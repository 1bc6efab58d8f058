//! Amount detection as an ordered chain of named detectors.
//!
//! Gross is read once as the largest monetary token in the text. The
//! detectors of an [`AmountPlan`] then run in order; each one only fills
//! net or VAT while they are still absent, and the chain stops as soon as
//! both are known.

use rust_decimal::Decimal;

use crate::models::Money;

use super::rules::amounts::{extract_gross, line_amounts};
use super::rules::patterns::{
    GROSS_KEYWORDS, NET_KEYWORDS, PERCENT, TOTALS_KEYWORDS, TOTALS_WORD, VAT_KEYWORDS,
    contains_any, count_keywords,
};
use super::rules::vat::{extract_vat_rate_hint, round_cents, split_gross};
use super::special::AmountStrategy;

/// Largest tolerated gap between `net + vat` and the line's gross.
pub const SUBTRACTION_TOLERANCE: Decimal = Decimal::from_parts(50, 0, 0, false, 2);

/// A named amount detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountDetector {
    /// Highest-scoring line by totals/tax vocabulary with two or more amounts.
    ContextScored,
    /// Text after a totals word: first two amounts are (net, VAT).
    TotalsLine,
    /// Last amount on the first net line and on the first VAT line.
    KeywordLines,
    /// Split the gross total using the VAT rate hint or the default rate.
    DeriveFromGross,
    /// First line with a percentage: first two amounts are (net, VAT).
    PercentLine,
}

impl AmountDetector {
    pub fn name(&self) -> &'static str {
        match self {
            AmountDetector::ContextScored => "context_scored",
            AmountDetector::TotalsLine => "totals_line",
            AmountDetector::KeywordLines => "keyword_lines",
            AmountDetector::DeriveFromGross => "derive_from_gross",
            AmountDetector::PercentLine => "percent_line",
        }
    }

    fn detect(&self, text: &str, known: &PartialAmounts, ctx: &AmountContext) -> PartialAmounts {
        match self {
            AmountDetector::ContextScored => context_scored(text),
            AmountDetector::TotalsLine => totals_line(text),
            AmountDetector::KeywordLines => keyword_lines(text),
            AmountDetector::DeriveFromGross => derive_from_gross(known, ctx),
            AmountDetector::PercentLine => percent_line(text),
        }
    }
}

/// Ordered detector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountPlan {
    detectors: Vec<AmountDetector>,
}

impl AmountPlan {
    pub fn new(detectors: Vec<AmountDetector>) -> Self {
        Self { detectors }
    }

    /// The general chain.
    pub fn general() -> Self {
        Self::new(vec![
            AmountDetector::ContextScored,
            AmountDetector::TotalsLine,
            AmountDetector::KeywordLines,
            AmountDetector::DeriveFromGross,
        ])
    }

    /// Supplier layout with (net, VAT) on the first percentage line.
    pub fn percent_line() -> Self {
        Self::new(vec![AmountDetector::PercentLine])
    }

    /// Plan for a special rule's amount strategy. Confirmations have none.
    pub fn for_strategy(strategy: &AmountStrategy) -> Option<Self> {
        match strategy {
            AmountStrategy::FallbackChain => Some(Self::general()),
            AmountStrategy::PercentLine => Some(Self::percent_line()),
            AmountStrategy::Confirmation => None,
        }
    }

    pub fn detectors(&self) -> &[AmountDetector] {
        &self.detectors
    }
}

impl Default for AmountPlan {
    fn default() -> Self {
        Self::general()
    }
}

/// Net and VAT as far as they are known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartialAmounts {
    pub net: Money,
    pub vat: Money,
}

impl PartialAmounts {
    fn pair(net: Decimal, vat: Decimal) -> Self {
        Self {
            net: Money::new(net),
            vat: Money::new(vat),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.net.is_present() && self.vat.is_present()
    }

    pub fn is_empty(&self) -> bool {
        self.net.is_absent() && self.vat.is_absent()
    }

    /// Fill absent slots from `other`; true if anything changed.
    fn merge(&mut self, other: PartialAmounts) -> bool {
        let net = self.net.fill_from(other.net);
        let vat = self.vat.fill_from(other.vat);
        net || vat
    }
}

/// Result of running a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmountOutcome {
    pub net: Money,
    pub vat: Money,
    pub gross: Money,
    /// Name of the first detector that contributed.
    pub source: Option<&'static str>,
}

struct AmountContext {
    gross: Option<Decimal>,
    rate: Decimal,
}

/// Runs amount plans over document text.
pub struct FallbackOrchestrator {
    default_vat_rate: Decimal,
}

impl FallbackOrchestrator {
    pub fn new(default_vat_rate: Decimal) -> Self {
        Self { default_vat_rate }
    }

    pub fn run(&self, text: &str, plan: &AmountPlan) -> AmountOutcome {
        let gross = extract_gross(text);
        let ctx = AmountContext {
            gross,
            rate: extract_vat_rate_hint(text).unwrap_or(self.default_vat_rate),
        };

        let mut amounts = PartialAmounts::default();
        let mut source = None;

        for detector in plan.detectors() {
            if amounts.is_complete() {
                break;
            }

            let found = detector.detect(text, &amounts, &ctx);
            if amounts.merge(found) {
                tracing::trace!("Amount detector {} contributed", detector.name());
                source.get_or_insert(detector.name());
            }
        }

        AmountOutcome {
            net: amounts.net,
            vat: amounts.vat,
            gross: Money::from(gross),
            source,
        }
    }
}

impl Default for FallbackOrchestrator {
    fn default() -> Self {
        Self::new(Decimal::new(23, 2))
    }
}

fn context_score(line: &str) -> usize {
    count_keywords(line, TOTALS_KEYWORDS)
        + count_keywords(line, NET_KEYWORDS)
        + count_keywords(line, VAT_KEYWORDS)
        + count_keywords(line, GROSS_KEYWORDS)
}

fn context_scored(text: &str) -> PartialAmounts {
    let mut best: Option<(usize, Vec<Decimal>)> = None;

    for line in text.lines() {
        let score = context_score(line);
        if score == 0 {
            continue;
        }
        let amounts = line_amounts(line);
        if amounts.len() < 2 {
            continue;
        }
        if best.as_ref().is_none_or(|(s, _)| score > *s) {
            best = Some((score, amounts));
        }
    }

    let Some((_, amounts)) = best else {
        return PartialAmounts::default();
    };

    match amounts.as_slice() {
        [net, vat, gross, ..] => {
            let Some(by_subtraction) = gross.checked_sub(*net) else {
                return PartialAmounts::default();
            };
            match net.checked_add(*vat).and_then(|sum| sum.checked_sub(*gross)) {
                Some(gap) if gap.abs() <= SUBTRACTION_TOLERANCE => PartialAmounts::pair(*net, *vat),
                _ => PartialAmounts::pair(*net, by_subtraction),
            }
        }
        [net, gross] if gross.abs() >= net.abs() => gross
            .checked_sub(*net)
            .map(|vat| PartialAmounts::pair(*net, vat))
            .unwrap_or_default(),
        _ => PartialAmounts::default(),
    }
}

fn totals_line(text: &str) -> PartialAmounts {
    text.lines()
        .filter_map(|line| TOTALS_WORD.find(line).map(|m| &line[m.end()..]))
        .map(line_amounts)
        .find(|amounts| amounts.len() >= 2)
        .map(|amounts| PartialAmounts::pair(amounts[0], amounts[1]))
        .unwrap_or_default()
}

fn last_amount_on_keyword_line(text: &str, keywords: &[&str]) -> Money {
    text.lines()
        .filter(|line| contains_any(line, keywords))
        .find_map(|line| line_amounts(line).last().copied())
        .into()
}

fn keyword_lines(text: &str) -> PartialAmounts {
    PartialAmounts {
        net: last_amount_on_keyword_line(text, NET_KEYWORDS),
        vat: last_amount_on_keyword_line(text, VAT_KEYWORDS),
    }
}

fn derive_from_gross(known: &PartialAmounts, ctx: &AmountContext) -> PartialAmounts {
    let Some(gross) = ctx.gross else {
        return PartialAmounts::default();
    };

    match (known.net.value(), known.vat.value()) {
        (Some(net), None) => gross
            .checked_sub(net)
            .map(|vat| PartialAmounts::pair(net, round_cents(vat))),
        (None, Some(vat)) => gross
            .checked_sub(vat)
            .map(|net| PartialAmounts::pair(round_cents(net), vat)),
        _ => split_gross(gross, ctx.rate).map(|(net, vat)| PartialAmounts::pair(net, vat)),
    }
    .unwrap_or_default()
}

fn percent_line(text: &str) -> PartialAmounts {
    text.lines()
        .filter(|line| PERCENT.is_match(line))
        .map(line_amounts)
        .find(|amounts| amounts.len() >= 2)
        .map(|amounts| PartialAmounts::pair(amounts[0], amounts[1]))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn money(s: &str) -> Money {
        Money::new(Decimal::from_str(s).unwrap())
    }

    fn run(text: &str) -> AmountOutcome {
        FallbackOrchestrator::default().run(text, &AmountPlan::general())
    }

    #[test]
    fn test_plan_order_is_inspectable() {
        let names: Vec<&str> = AmountPlan::general()
            .detectors()
            .iter()
            .map(|d| d.name())
            .collect();
        assert_eq!(
            names,
            vec!["context_scored", "totals_line", "keyword_lines", "derive_from_gross"]
        );
        assert_eq!(AmountPlan::for_strategy(&AmountStrategy::Confirmation), None);
    }

    #[test]
    fn test_context_line_with_three_amounts() {
        let text = "Pozycja 1 50,00\nRazem netto VAT brutto: 1 000,00 230,00 1 230,00\n";
        let outcome = run(text);
        assert_eq!(outcome.net, money("1000.00"));
        assert_eq!(outcome.vat, money("230.00"));
        assert_eq!(outcome.gross, money("1230.00"));
        assert_eq!(outcome.source, Some("context_scored"));
    }

    #[test]
    fn test_context_line_vat_overridden_by_subtraction() {
        // OCR dropped a digit from the VAT column.
        let text = "Razem netto VAT brutto 1 000,00 23,00 1 230,00";
        let outcome = run(text);
        assert_eq!(outcome.net, money("1000.00"));
        assert_eq!(outcome.vat, money("230.00"));
    }

    #[test]
    fn test_context_line_with_two_amounts() {
        let text = "Total net / gross 100,00 123,00";
        let outcome = run(text);
        assert_eq!(outcome.net, money("100.00"));
        assert_eq!(outcome.vat, money("23.00"));
    }

    #[test]
    fn test_razem_line_read_as_net_and_vat() {
        let text = "Faktura\nRAZEM 1 234,56 283,95\n";
        let outcome = run(text);
        assert_eq!(outcome.net, money("1234.56"));
        assert_eq!(outcome.vat, money("283.95"));
        assert_eq!(outcome.gross, money("1234.56"));
        assert_eq!(outcome.source, Some("totals_line"));
    }

    #[test]
    fn test_keyword_lines() {
        let text = "Wartość netto: 10 szt 500,00\nKwota VAT 115,00\nDo zapłaty 615,00";
        let outcome = run(text);
        assert_eq!(outcome.net, money("500.00"));
        assert_eq!(outcome.vat, money("115.00"));
        assert_eq!(outcome.source, Some("keyword_lines"));
    }

    #[test]
    fn test_derive_uses_rate_hint() {
        let text = "Stawka 8%\nDo zapłaty: 108,00";
        let outcome = run(text);
        assert_eq!(outcome.net, money("100.00"));
        assert_eq!(outcome.vat, money("8.00"));
        assert_eq!(outcome.source, Some("derive_from_gross"));
    }

    #[test]
    fn test_derive_uses_default_rate() {
        let outcome = run("Do zapłaty: 123,00");
        assert_eq!(outcome.net, money("100.00"));
        assert_eq!(outcome.vat, money("23.00"));
    }

    #[test]
    fn test_derive_keeps_known_net() {
        let text = "Netto 90,00\nDo zapłaty: 110,00";
        let outcome = run(text);
        assert_eq!(outcome.net, money("90.00"));
        assert_eq!(outcome.vat, money("20.00"));
        assert_eq!(outcome.source, Some("keyword_lines"));
    }

    #[test]
    fn test_no_amounts_stays_absent() {
        let outcome = run("Dziękujemy za zakupy");
        assert_eq!(outcome, AmountOutcome::default());
    }

    #[test]
    fn test_percent_line_plan() {
        let text = "Towar 1 szt\n23% 400,00 92,00 492,00\nRazem 492,00";
        let outcome = FallbackOrchestrator::default().run(text, &AmountPlan::percent_line());
        assert_eq!(outcome.net, money("400.00"));
        assert_eq!(outcome.vat, money("92.00"));
        assert_eq!(outcome.gross, money("492.00"));
        assert_eq!(outcome.source, Some("percent_line"));
    }

    #[test]
    fn test_amounts_at_decimal_limit_do_not_overflow() {
        let huge = "79228162514264337593543950335,00";
        let text = format!("Razem -{huge} {huge}");
        let outcome = run(&text);
        assert!(outcome.net.is_present());
        assert_eq!(outcome.source, Some("totals_line"));

        let text = format!("Razem netto VAT brutto {huge} {huge} -{huge}");
        let outcome = run(&text);
        assert!(outcome.net.is_present());

        let known = PartialAmounts { net: Money::new(-Decimal::MAX), vat: Money::Absent };
        let ctx = AmountContext { gross: Some(Decimal::MAX), rate: Decimal::new(23, 2) };
        assert_eq!(derive_from_gross(&known, &ctx), PartialAmounts::default());
    }

    #[test]
    fn test_deterministic() {
        let text = "Netto 1 000,00\nVAT 23% 230,00\nRazem do zapłaty 1 230,00 PLN";
        let first = run(text);
        for _ in 0..5 {
            assert_eq!(run(text), first);
        }
    }
}
