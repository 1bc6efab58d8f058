//! Invoice field extraction from OCR text.

pub mod assembler;
pub mod escalation;
pub mod fallback;
pub mod reconcile;
pub mod rules;
pub mod special;

pub use assembler::{DecodedFilename, RecordAssembler, decode_filename};
pub use escalation::{Escalation, EscalationResponse, NullEscalation, PartialFields};
pub use fallback::{AmountDetector, AmountOutcome, AmountPlan, FallbackOrchestrator};
pub use reconcile::SanityReconciler;
pub use special::{AmountStrategy, RuleBook, SpecialRuleSpec, SpecialSellerRule, builtin_rules};
