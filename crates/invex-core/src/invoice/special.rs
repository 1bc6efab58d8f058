//! Supplier-specific rules keyed on the invoice number.
//!
//! Each rule fixes the seller name and selects how the date and the
//! amounts are found for that supplier's documents. Rules are data: the
//! built-in table can be replaced or extended from the config file.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{InvexError, Result};

use super::rules::DateStrategy;

/// How net and VAT are found for documents matching a rule.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AmountStrategy {
    /// The general detector chain.
    #[default]
    FallbackChain,
    /// First line with a percentage: its first two amounts are (net, VAT).
    PercentLine,
    /// Not an invoice: zero VAT, net and gross absent.
    Confirmation,
}

/// Serializable rule definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialRuleSpec {
    /// Short identifier recorded in the record metadata.
    pub name: String,

    /// Regular expression matched against the decoded invoice number.
    pub pattern: String,

    /// Seller name assigned on match.
    pub seller: String,

    #[serde(default)]
    pub date_strategy: DateStrategy,

    #[serde(default)]
    pub amount_strategy: AmountStrategy,

    /// Currency used when the text names none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_currency: Option<String>,
}

/// Built-in rules in priority order.
pub fn builtin_rules() -> Vec<SpecialRuleSpec> {
    vec![
        SpecialRuleSpec {
            name: "confirmation".to_string(),
            pattern: r"^\(00\)".to_string(),
            seller: "POCZTA POLSKA".to_string(),
            date_strategy: DateStrategy::None,
            amount_strategy: AmountStrategy::Confirmation,
            default_currency: Some("PLN".to_string()),
        },
        SpecialRuleSpec {
            name: "wrov".to_string(),
            pattern: r"^WROV\d{7}$".to_string(),
            seller: "UNIUNEA NATIONALA A TRANSPORTATORILOR RUTIERI DIN ROMANIA".to_string(),
            date_strategy: DateStrategy::LabeledLine {
                label: "data:".to_string(),
            },
            amount_strategy: AmountStrategy::FallbackChain,
            default_currency: Some("RON".to_string()),
        },
        SpecialRuleSpec {
            name: "martex".to_string(),
            pattern: r"^[A-Za-z][A-Za-z0-9]?/[A-Za-z]{2,3}/202\d/\d{5}$".to_string(),
            seller: "MARTEX SP. Z O.O.".to_string(),
            date_strategy: DateStrategy::General,
            amount_strategy: AmountStrategy::PercentLine,
            default_currency: Some("PLN".to_string()),
        },
    ]
}

/// A rule with its pattern compiled.
#[derive(Debug, Clone)]
pub struct SpecialSellerRule {
    spec: SpecialRuleSpec,
    pattern: Regex,
}

impl SpecialSellerRule {
    pub fn compile(spec: SpecialRuleSpec) -> Result<Self> {
        let pattern = Regex::new(&spec.pattern).map_err(|e| {
            InvexError::Config(format!("special rule '{}': invalid pattern: {}", spec.name, e))
        })?;
        Ok(Self { spec, pattern })
    }

    pub fn matches(&self, invoice_number: &str) -> bool {
        self.pattern.is_match(invoice_number)
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn seller(&self) -> &str {
        &self.spec.seller
    }

    pub fn date_strategy(&self) -> &DateStrategy {
        &self.spec.date_strategy
    }

    pub fn amount_strategy(&self) -> &AmountStrategy {
        &self.spec.amount_strategy
    }

    pub fn default_currency(&self) -> Option<&str> {
        self.spec.default_currency.as_deref()
    }
}

/// Ordered table of compiled rules.
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    rules: Vec<SpecialSellerRule>,
}

impl RuleBook {
    /// Compile every rule; the first invalid pattern fails the whole table.
    pub fn compile(specs: &[SpecialRuleSpec]) -> Result<Self> {
        let rules = specs
            .iter()
            .cloned()
            .map(SpecialSellerRule::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// First rule matching the invoice number.
    pub fn find(&self, invoice_number: &str) -> Option<&SpecialSellerRule> {
        self.rules.iter().find(|rule| rule.matches(invoice_number))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
