//! Grant resolution.

use std::collections::BTreeSet;

use tracing::warn;

use sealkit_core::{GroupId, Recipient, UserId};

use crate::error::{PolicyError, Result};
use crate::rule::{PolicyGrant, PolicyRuleSet, RuleTarget};

/// Placeholder in user targets replaced by the grant's substitute user.
const USER_PLACEHOLDER: &str = "%USER%";

/// The ids resolution may grant to. Targets outside the catalog are
/// skipped per rule, never a hard failure.
#[derive(Debug, Clone, Default)]
pub struct RecipientCatalog {
    /// Known user ids.
    pub users: BTreeSet<UserId>,
    /// Known group ids.
    pub groups: BTreeSet<GroupId>,
}

impl RecipientCatalog {
    /// Build a catalog from known ids.
    pub fn new(users: impl IntoIterator<Item = UserId>, groups: impl IntoIterator<Item = GroupId>) -> Self {
        Self {
            users: users.into_iter().collect(),
            groups: groups.into_iter().collect(),
        }
    }
}

/// Resolve the recipient set for a document.
///
/// Pure function: the output depends only on the arguments. Rules at the
/// maximal specificity among those matching `grant.classification`
/// contribute their targets in declaration order; explicit users and
/// groups are appended afterwards. The result is deduplicated, keeping
/// first occurrences.
///
/// Returns [`PolicyError::NoRecipients`] when the union is empty: a
/// document must have at least one access block.
pub fn resolve_grants(
    grant: &PolicyGrant,
    explicit_users: &[UserId],
    explicit_groups: &[GroupId],
    rules: &PolicyRuleSet,
    catalog: &RecipientCatalog,
) -> Result<Vec<Recipient>> {
    let mut out: Vec<Recipient> = Vec::new();
    let mut seen: BTreeSet<Recipient> = BTreeSet::new();
    let mut push = |recipient: Recipient, out: &mut Vec<Recipient>| {
        if seen.insert(recipient.clone()) {
            out.push(recipient);
        }
    };

    let max_specificity = rules
        .rules
        .iter()
        .filter(|r| r.matches(&grant.classification))
        .map(|r| r.specificity())
        .max();

    if let Some(max_specificity) = max_specificity {
        for (index, rule) in rules
            .rules
            .iter()
            .enumerate()
            .filter(|(_, r)| r.matches(&grant.classification) && r.specificity() == max_specificity)
        {
            for target in &rule.targets {
                match resolve_target(target, grant.substitute_user.as_ref(), catalog) {
                    Ok(recipient) => push(recipient, &mut out),
                    Err(reason) => {
                        warn!(rule = index, target = ?target, %reason, "skipping unresolvable policy target");
                    }
                }
            }
        }
    }

    for user in explicit_users {
        push(Recipient::User(user.clone()), &mut out);
    }
    for group in explicit_groups {
        push(Recipient::Group(group.clone()), &mut out);
    }

    if out.is_empty() {
        return Err(PolicyError::NoRecipients);
    }
    Ok(out)
}

fn resolve_target(
    target: &RuleTarget,
    substitute_user: Option<&UserId>,
    catalog: &RecipientCatalog,
) -> std::result::Result<Recipient, String> {
    match target {
        RuleTarget::User(raw) => {
            let resolved = if raw.contains(USER_PLACEHOLDER) {
                let substitute =
                    substitute_user.ok_or_else(|| "no substitute user supplied".to_string())?;
                raw.replace(USER_PLACEHOLDER, substitute.as_str())
            } else {
                raw.clone()
            };
            let id = UserId::new(resolved).map_err(|e| e.to_string())?;
            if catalog.users.contains(&id) {
                Ok(Recipient::User(id))
            } else {
                Err(format!("unknown user {id}"))
            }
        }
        RuleTarget::Group(raw) => {
            let id = GroupId::new(raw.clone()).map_err(|e| e.to_string())?;
            if catalog.groups.contains(&id) {
                Ok(Recipient::Group(id))
            } else {
                Err(format!("unknown group {id}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Category, Classification, DataSubject, PolicyRule, Sensitivity};

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn gid(s: &str) -> GroupId {
        GroupId::new(s).unwrap()
    }

    fn catalog() -> RecipientCatalog {
        RecipientCatalog::new(
            [uid("alice"), uid("bob"), uid("dpo.alice")],
            [gid("care-team"), gid("audit")],
        )
    }

    fn rule(
        cat: Option<&str>,
        sens: Option<&str>,
        subj: Option<&str>,
        targets: Vec<RuleTarget>,
    ) -> PolicyRule {
        PolicyRule {
            category: cat.map(|s| Category::new(s).unwrap()),
            sensitivity: sens.map(|s| Sensitivity::new(s).unwrap()),
            data_subject: subj.map(|s| DataSubject::new(s).unwrap()),
            targets,
        }
    }

    fn grant(cat: Option<&str>, sens: Option<&str>, subj: Option<&str>) -> PolicyGrant {
        PolicyGrant {
            classification: Classification {
                category: cat.map(|s| Category::new(s).unwrap()),
                sensitivity: sens.map(|s| Sensitivity::new(s).unwrap()),
                data_subject: subj.map(|s| DataSubject::new(s).unwrap()),
            },
            substitute_user: None,
        }
    }

    #[test]
    fn test_most_specific_rule_wins() {
        let rules = PolicyRuleSet::new(vec![
            rule(Some("PII"), None, None, vec![RuleTarget::Group("audit".into())]),
            rule(
                Some("PII"),
                Some("HIGH"),
                Some("PATIENT"),
                vec![RuleTarget::Group("care-team".into())],
            ),
        ]);

        let resolved = resolve_grants(
            &grant(Some("PII"), Some("HIGH"), Some("PATIENT")),
            &[],
            &[],
            &rules,
            &catalog(),
        )
        .unwrap();

        // The fully-pinned rule overrides the category-only rule.
        assert_eq!(resolved, vec![Recipient::Group(gid("care-team"))]);
    }

    #[test]
    fn test_tie_broken_by_declaration_order() {
        let rules = PolicyRuleSet::new(vec![
            rule(Some("PII"), None, None, vec![RuleTarget::User("bob".into())]),
            rule(
                None,
                Some("HIGH"),
                None,
                vec![RuleTarget::User("alice".into())],
            ),
        ]);

        let resolved = resolve_grants(
            &grant(Some("PII"), Some("HIGH"), None),
            &[],
            &[],
            &rules,
            &catalog(),
        )
        .unwrap();

        assert_eq!(
            resolved,
            vec![Recipient::User(uid("bob")), Recipient::User(uid("alice"))]
        );
    }

    #[test]
    fn test_unknown_target_skipped_not_fatal() {
        let rules = PolicyRuleSet::new(vec![rule(
            Some("PII"),
            None,
            None,
            vec![
                RuleTarget::User("ghost".into()),
                RuleTarget::Group("care-team".into()),
            ],
        )]);

        let resolved =
            resolve_grants(&grant(Some("PII"), None, None), &[], &[], &rules, &catalog()).unwrap();
        assert_eq!(resolved, vec![Recipient::Group(gid("care-team"))]);
    }

    #[test]
    fn test_user_placeholder_substitution() {
        let rules = PolicyRuleSet::new(vec![rule(
            None,
            None,
            Some("EMPLOYEE"),
            vec![RuleTarget::User("dpo.%USER%".into())],
        )]);

        let mut g = grant(None, None, Some("EMPLOYEE"));
        g.substitute_user = Some(uid("alice"));

        let resolved = resolve_grants(&g, &[], &[], &rules, &catalog()).unwrap();
        assert_eq!(resolved, vec![Recipient::User(uid("dpo.alice"))]);
    }

    #[test]
    fn test_placeholder_without_substitute_skipped() {
        let rules = PolicyRuleSet::new(vec![rule(
            None,
            None,
            None,
            vec![
                RuleTarget::User("%USER%".into()),
                RuleTarget::User("alice".into()),
            ],
        )]);

        let resolved = resolve_grants(&grant(None, None, None), &[], &[], &rules, &catalog()).unwrap();
        assert_eq!(resolved, vec![Recipient::User(uid("alice"))]);
    }

    #[test]
    fn test_explicit_recipients_appended_and_deduped() {
        let rules = PolicyRuleSet::new(vec![rule(
            Some("PII"),
            None,
            None,
            vec![RuleTarget::User("alice".into())],
        )]);

        let resolved = resolve_grants(
            &grant(Some("PII"), None, None),
            &[uid("alice"), uid("bob")],
            &[gid("audit")],
            &rules,
            &catalog(),
        )
        .unwrap();

        assert_eq!(
            resolved,
            vec![
                Recipient::User(uid("alice")),
                Recipient::User(uid("bob")),
                Recipient::Group(gid("audit")),
            ]
        );
    }

    #[test]
    fn test_empty_resolution_is_error() {
        let rules = PolicyRuleSet::default();
        let result = resolve_grants(&grant(Some("PII"), None, None), &[], &[], &rules, &catalog());
        assert!(matches!(result, Err(PolicyError::NoRecipients)));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn names() -> impl Strategy<Value = Vec<String>> {
            prop::collection::vec("[a-z]{1,8}", 1..6)
        }

        proptest! {
            #[test]
            fn prop_output_set_independent_of_explicit_order(users in names(), groups in names()) {
                let users: Vec<UserId> = users.into_iter().map(|s| UserId::new(s).unwrap()).collect();
                let groups: Vec<GroupId> = groups.into_iter().map(|s| GroupId::new(s).unwrap()).collect();
                let catalog = RecipientCatalog::new(users.clone(), groups.clone());
                let rules = PolicyRuleSet::default();
                let g = PolicyGrant::default();

                let forward = resolve_grants(&g, &users, &groups, &rules, &catalog).unwrap();

                let mut reversed_users = users.clone();
                reversed_users.reverse();
                let mut reversed_groups = groups.clone();
                reversed_groups.reverse();
                let backward =
                    resolve_grants(&g, &reversed_users, &reversed_groups, &rules, &catalog).unwrap();

                let f: BTreeSet<_> = forward.iter().cloned().collect();
                let b: BTreeSet<_> = backward.iter().cloned().collect();
                prop_assert_eq!(f, b);

                // Idempotent: a second resolution is identical.
                let again = resolve_grants(&g, &users, &groups, &rules, &catalog).unwrap();
                prop_assert_eq!(forward, again);
            }
        }
    }

    #[test]
    fn test_resolution_is_idempotent_and_input_order_independent() {
        let rules = PolicyRuleSet::new(vec![rule(
            Some("PII"),
            None,
            None,
            vec![
                RuleTarget::User("alice".into()),
                RuleTarget::User("bob".into()),
            ],
        )]);
        let g = grant(Some("PII"), None, None);

        let a = resolve_grants(&g, &[uid("bob")], &[], &rules, &catalog()).unwrap();
        let b = resolve_grants(&g, &[uid("bob")], &[], &rules, &catalog()).unwrap();
        assert_eq!(a, b);

        // Explicit duplicates of policy targets do not change the set.
        let c = resolve_grants(&g, &[], &[], &rules, &catalog()).unwrap();
        let as_set: BTreeSet<_> = a.into_iter().collect();
        let cs_set: BTreeSet<_> = c.into_iter().collect();
        assert_eq!(as_set, cs_set);
    }
}
