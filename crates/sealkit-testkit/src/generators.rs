//! Proptest generators for property-based testing.

use proptest::prelude::*;

use sealkit_core::{EncryptionKeyPair, GroupId, UserId};
use sealkit_policy::{
    Category, Classification, DataSubject, PolicyRule, PolicyRuleSet, RuleTarget, Sensitivity,
};

/// Generate a valid identifier string.
pub fn id_string() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_.-]{0,30}".prop_map(String::from)
}

/// Generate a random UserId.
pub fn user_id() -> impl Strategy<Value = UserId> {
    id_string().prop_map(|s| UserId::new(s).expect("generated ids are valid"))
}

/// Generate a random GroupId.
pub fn group_id() -> impl Strategy<Value = GroupId> {
    id_string().prop_map(|s| GroupId::new(s).expect("generated ids are valid"))
}

/// Generate an encryption key pair from a deterministic seed.
pub fn encryption_keypair() -> impl Strategy<Value = EncryptionKeyPair> {
    any::<[u8; 32]>().prop_map(|seed| {
        let secret = sealkit_core::EncryptionSecretKey::from_bytes(seed);
        let public = secret.public_key();
        EncryptionKeyPair { public, secret }
    })
}

/// Generate a classification label.
pub fn label() -> impl Strategy<Value = String> {
    "[A-Z][A-Z_]{0,15}".prop_map(String::from)
}

/// Generate an optional classification dimension.
fn maybe_label() -> impl Strategy<Value = Option<String>> {
    prop::option::of(label())
}

/// Generate a classification tuple.
pub fn classification() -> impl Strategy<Value = Classification> {
    (maybe_label(), maybe_label(), maybe_label()).prop_map(|(c, s, d)| Classification {
        category: c.map(|v| Category::new(v).expect("generated labels are valid")),
        sensitivity: s.map(|v| Sensitivity::new(v).expect("generated labels are valid")),
        data_subject: d.map(|v| DataSubject::new(v).expect("generated labels are valid")),
    })
}

/// Generate a rule target referencing generated ids.
pub fn rule_target() -> impl Strategy<Value = RuleTarget> {
    prop_oneof![
        id_string().prop_map(RuleTarget::User),
        id_string().prop_map(RuleTarget::Group),
    ]
}

/// Generate a policy rule.
pub fn policy_rule() -> impl Strategy<Value = PolicyRule> {
    (
        classification(),
        prop::collection::vec(rule_target(), 0..4),
    )
        .prop_map(|(c, targets)| PolicyRule {
            category: c.category,
            sensitivity: c.sensitivity,
            data_subject: c.data_subject,
            targets,
        })
}

/// Generate a rule set of up to 8 rules.
pub fn policy_rule_set() -> impl Strategy<Value = PolicyRuleSet> {
    prop::collection::vec(policy_rule(), 0..8).prop_map(PolicyRuleSet::new)
}

/// Generate document plaintext of up to `max_len` bytes.
pub fn plaintext(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a searchable field value (words of letters).
pub fn field_value() -> impl Strategy<Value = String> {
    prop::collection::vec("[A-Za-z]{1,12}", 1..5).prop_map(|words| words.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealkit_core::{SealedKey, SymmetricKey};
    use sealkit_search::{BlindIndexSearch, Tokenization};

    proptest! {
        #[test]
        fn test_seal_open_roundtrip(pair in encryption_keypair(), secret in any::<[u8; 32]>()) {
            let sealed = SealedKey::seal(&secret, &pair.public, b"ctx").unwrap();
            let opened = sealed.open(&pair.secret, b"ctx").unwrap();
            prop_assert_eq!(secret, opened);
        }

        #[test]
        fn test_symmetric_roundtrip(data in plaintext(2048)) {
            let key = SymmetricKey::generate().unwrap();
            let nonce = sealkit_core::Nonce::generate().unwrap();
            let ciphertext = key.encrypt(&data, &nonce).unwrap();
            prop_assert_eq!(key.decrypt(&ciphertext, &nonce).unwrap(), data);
        }

        #[test]
        fn test_query_tokens_subset_of_data_tokens(value in field_value(), salt in any::<[u8; 32]>()) {
            let search = BlindIndexSearch::from_salt(
                sealkit_search::BlindIndexSalt::from_bytes(salt),
                Tokenization::Exact,
            );
            let data = search.tokenize_data(&value, None);
            let query = search.tokenize_query(&value, None);
            prop_assert!(query.iter().all(|t| data.contains(t)));
        }

        #[test]
        fn test_generated_ids_validate(id in id_string()) {
            prop_assert!(UserId::new(id).is_ok());
        }
    }
}
