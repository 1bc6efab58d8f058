//! Configuration structures for the extraction pipeline.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::invoice::special::{SpecialRuleSpec, builtin_rules};

/// Main configuration for the invex pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvexConfig {
    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// AI escalation configuration.
    pub escalation: EscalationConfig,

    /// Batch processing configuration.
    pub batch: BatchConfig,
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// VAT rate used to split gross when the text carries no rate hint.
    pub default_vat_rate: Decimal,

    /// Currency assigned to confirmation documents when none is detected.
    pub default_currency: String,

    /// Substrings that disqualify a line from being the seller name.
    pub seller_denylist: Vec<String>,

    /// Supplier-specific rules, checked in order before generic detection.
    pub special_rules: Vec<SpecialRuleSpec>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            default_vat_rate: Decimal::new(23, 2),
            default_currency: "PLN".to_string(),
            seller_denylist: vec![
                "RABEN".to_string(),
                "DHL EXPRESS".to_string(),
                "SPEDYCJA".to_string(),
            ],
            special_rules: builtin_rules(),
        }
    }
}

/// Escalation to the remote JSON extraction service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Enable escalation for records with missing fields.
    pub enabled: bool,

    /// Chat-completions endpoint.
    pub endpoint: String,

    /// Model identifier sent with each request.
    pub model: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Attempts per record, including the first one.
    pub max_attempts: usize,

    /// Maximum number of excerpt lines sent.
    pub max_excerpt_lines: usize,

    /// Maximum number of excerpt characters sent.
    pub max_excerpt_chars: usize,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4.1-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
            max_attempts: 2,
            max_excerpt_lines: 30,
            max_excerpt_chars: 8000,
        }
    }
}

/// Batch processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Worker threads (0 = one per CPU).
    pub jobs: usize,

    /// Descend into `scans/ocr_txt` when pointed at a scan base folder.
    pub resolve_ocr_subdir: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            jobs: 0,
            resolve_ocr_subdir: true,
        }
    }
}

impl InvexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
