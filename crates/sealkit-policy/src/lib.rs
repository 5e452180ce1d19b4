//! # Sealkit Policy
//!
//! Declarative access policy evaluation.
//!
//! A policy rule maps a (category, sensitivity, data subject)
//! classification tuple to an ordered list of user/group targets.
//! [`resolve_grants`] is a pure function from a document's classification
//! plus a rule set to the deduplicated, ordered recipient set used by the
//! document engine.
//!
//! Matching is most-specific-first: rules that pin all three
//! classification fields override rules that pin a subset, and only the
//! maximal matching specificity tier contributes targets. A rule that
//! names an unknown user or group is skipped with a warning; one bad rule
//! never blocks encryption of an otherwise valid document.

pub mod engine;
pub mod error;
pub mod rule;

pub use engine::{resolve_grants, RecipientCatalog};
pub use error::{PolicyError, Result};
pub use rule::{
    Category, Classification, DataSubject, PolicyGrant, PolicyRule, PolicyRuleSet, RuleTarget,
    Sensitivity,
};
