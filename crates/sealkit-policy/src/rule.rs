//! Policy rules and classification tuples.

use serde::{Deserialize, Serialize};
use std::fmt;

use sealkit_core::{validate_label, CoreError, UserId};

macro_rules! label_newtype {
    ($(#[$doc:meta])* $name:ident, $kind:literal) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Construct after validating the label.
            pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
                let s = s.into();
                validate_label($kind, &s)?;
                Ok(Self(s))
            }

            /// The label as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

label_newtype!(
    /// One dimension of a classification: what kind of data this is
    /// (e.g. "PII", "HEALTH").
    Category,
    "category"
);
label_newtype!(
    /// One dimension of a classification: how sensitive the data is
    /// (e.g. "RESTRICTED", "INTERNAL").
    Sensitivity,
    "sensitivity"
);
label_newtype!(
    /// One dimension of a classification: whose data it is
    /// (e.g. "PATIENT", "EMPLOYEE").
    DataSubject,
    "data subject"
);

/// The classification tuple a document is encrypted under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Category, if classified along that dimension.
    pub category: Option<Category>,
    /// Sensitivity, if classified along that dimension.
    pub sensitivity: Option<Sensitivity>,
    /// Data subject, if classified along that dimension.
    pub data_subject: Option<DataSubject>,
}

/// A policy-driven grant request attached to a document encrypt call.
#[derive(Debug, Clone, Default)]
pub struct PolicyGrant {
    /// The classification to match rules against.
    pub classification: Classification,
    /// Replaces `%USER%` in matched rule targets.
    pub substitute_user: Option<UserId>,
}

/// One target of a policy rule.
///
/// Target strings are raw: user targets may contain the `%USER%`
/// placeholder, substituted at resolution time. Validation happens after
/// substitution, so a rule set can be authored before its users exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleTarget {
    /// A user id string (possibly containing `%USER%`).
    User(String),
    /// A group id string.
    Group(String),
}

/// One policy rule: an optionally-pinned classification tuple mapped to an
/// ordered target list.
///
/// A `None` field matches any value of that dimension. Specificity is the
/// number of pinned fields; more specific rules override less specific
/// ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Pinned category, or any.
    pub category: Option<Category>,
    /// Pinned sensitivity, or any.
    pub sensitivity: Option<Sensitivity>,
    /// Pinned data subject, or any.
    pub data_subject: Option<DataSubject>,
    /// Targets granted by this rule, in declaration order.
    pub targets: Vec<RuleTarget>,
}

impl PolicyRule {
    /// Number of pinned classification fields (0..=3).
    pub fn specificity(&self) -> u8 {
        self.category.is_some() as u8
            + self.sensitivity.is_some() as u8
            + self.data_subject.is_some() as u8
    }

    /// Whether this rule matches the classification. Pinned fields must
    /// be present and equal; unpinned fields match anything.
    pub fn matches(&self, classification: &Classification) -> bool {
        fn dim<T: PartialEq>(rule: &Option<T>, given: &Option<T>) -> bool {
            match rule {
                None => true,
                Some(want) => given.as_ref() == Some(want),
            }
        }
        dim(&self.category, &classification.category)
            && dim(&self.sensitivity, &classification.sensitivity)
            && dim(&self.data_subject, &classification.data_subject)
    }
}

/// An ordered set of policy rules. Declaration order breaks specificity
/// ties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRuleSet {
    /// The rules, in declaration order.
    pub rules: Vec<PolicyRule>,
}

impl PolicyRuleSet {
    /// Create a rule set from rules in declaration order.
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self { rules }
    }

    /// Whether the set has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cls(cat: Option<&str>, sens: Option<&str>, subj: Option<&str>) -> Classification {
        Classification {
            category: cat.map(|s| Category::new(s).unwrap()),
            sensitivity: sens.map(|s| Sensitivity::new(s).unwrap()),
            data_subject: subj.map(|s| DataSubject::new(s).unwrap()),
        }
    }

    #[test]
    fn test_specificity_counts_pinned_fields() {
        let mut rule = PolicyRule::default();
        assert_eq!(rule.specificity(), 0);

        rule.category = Some(Category::new("PII").unwrap());
        rule.data_subject = Some(DataSubject::new("PATIENT").unwrap());
        assert_eq!(rule.specificity(), 2);
    }

    #[test]
    fn test_unpinned_rule_matches_everything() {
        let rule = PolicyRule::default();
        assert!(rule.matches(&cls(None, None, None)));
        assert!(rule.matches(&cls(Some("PII"), Some("HIGH"), Some("PATIENT"))));
    }

    #[test]
    fn test_pinned_field_must_match() {
        let rule = PolicyRule {
            category: Some(Category::new("PII").unwrap()),
            ..Default::default()
        };
        assert!(rule.matches(&cls(Some("PII"), None, None)));
        assert!(!rule.matches(&cls(Some("HEALTH"), None, None)));
        // Pinned field absent from the classification: no match.
        assert!(!rule.matches(&cls(None, Some("HIGH"), None)));
    }

    #[test]
    fn test_label_validation() {
        assert!(Category::new("PII").is_ok());
        assert!(Category::new("").is_err());
        assert!(Sensitivity::new("x".repeat(200)).is_err());
    }
}
