//! # lce-aml — AML and Sanction Screening
//!
//! Screens customers against sanction and PEP reference lists with
//! normalised edit-distance matching, scores jurisdiction, transaction and
//! profile risk, and turns the result into an AML status with its own
//! transition table. High and Critical results open an escalation through
//! `lce-escalation`.
//!
//! The screening engine does not use the rule engine's logic vocabulary;
//! it computes its own composite score.

pub mod check;
pub mod config;
pub mod engine;
pub mod reference;
pub mod risk;
pub mod screening;
pub mod similarity;
pub mod status;

pub use check::{ActionType, AmlCheckResult, CheckType, RequiredAction, StatusChange};
pub use config::ScreeningConfig;
pub use engine::{overall_score, risk_level, AmlScreeningEngine};
pub use reference::{PepEntry, ReferenceLists, ReferenceStore, SanctionEntry};
pub use risk::{HistoricalRiskProvider, NoHistory, RiskCategory, RiskFactor};
pub use screening::{ScreenMatch, ScreenResult, Subject};
pub use similarity::{name_similarity, normalize_name};
pub use status::AmlStatus;
