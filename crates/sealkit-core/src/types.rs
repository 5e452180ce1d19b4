//! Strong identifier types.
//!
//! All identifiers are validated newtypes over strings. Validation happens
//! at construction, before any I/O, so malformed ids can never reach the
//! rest of the system.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Maximum length of an identifier or label, in characters.
pub const MAX_ID_LEN: usize = 100;

fn validate_id(kind: &'static str, s: &str) -> Result<(), CoreError> {
    if s.is_empty() {
        return Err(CoreError::InvalidId {
            kind,
            reason: "must not be empty".into(),
        });
    }
    if s.len() > MAX_ID_LEN {
        return Err(CoreError::InvalidId {
            kind,
            reason: format!("must be at most {MAX_ID_LEN} characters, got {}", s.len()),
        });
    }
    if let Some(c) = s
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@' | '-')))
    {
        return Err(CoreError::InvalidId {
            kind,
            reason: format!("contains invalid character {c:?}"),
        });
    }
    Ok(())
}

/// Validate a human-readable label (names of devices, groups, documents).
///
/// Labels may contain spaces but are bounded to the same length as ids and
/// must contain at least one non-whitespace character.
pub fn validate_label(kind: &'static str, s: &str) -> Result<(), CoreError> {
    if s.trim().is_empty() {
        return Err(CoreError::InvalidId {
            kind,
            reason: "must not be empty".into(),
        });
    }
    if s.len() > MAX_ID_LEN {
        return Err(CoreError::InvalidId {
            kind,
            reason: format!("must be at most {MAX_ID_LEN} characters, got {}", s.len()),
        });
    }
    if s.chars().any(|c| c.is_control()) {
        return Err(CoreError::InvalidId {
            kind,
            reason: "contains control characters".into(),
        });
    }
    Ok(())
}

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident, $kind:literal) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Construct after validating the identifier string.
            pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
                let s = s.into();
                validate_id($kind, &s)?;
                Ok(Self(s))
            }

            /// The identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// The identifier bytes (used as domain-separation context).
            pub fn as_bytes(&self) -> &[u8] {
                self.0.as_bytes()
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

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = CoreError;

            fn try_from(s: &str) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }
    };
}

id_newtype!(
    /// Identifier of a user account.
    UserId,
    "user id"
);
id_newtype!(
    /// Identifier of a group.
    GroupId,
    "group id"
);
id_newtype!(
    /// Identifier of a device belonging to a user.
    DeviceId,
    "device id"
);
id_newtype!(
    /// Identifier of an encrypted document.
    DocumentId,
    "document id"
);

/// A recipient of an encrypted key: either a single user or a group.
///
/// Access-control state is always a flat keyed collection from `Recipient`
/// to encrypted key material, never a hierarchy of permission types.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Recipient {
    /// A single user, keyed by their master public key.
    User(UserId),
    /// A group; members decrypt via their copy of the group private key.
    Group(GroupId),
}

impl Recipient {
    /// Bytes identifying this recipient, for domain separation contexts.
    pub fn context_bytes(&self) -> &[u8] {
        match self {
            Recipient::User(id) => id.as_bytes(),
            Recipient::Group(id) => id.as_bytes(),
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::User(id) => write!(f, "user:{id}"),
            Recipient::Group(id) => write!(f, "group:{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ids() {
        assert!(UserId::new("alice").is_ok());
        assert!(UserId::new("alice@example.com").is_ok());
        assert!(GroupId::new("eng-team.2024").is_ok());
        assert!(DeviceId::new("laptop_1").is_ok());
    }

    #[test]
    fn test_empty_id_rejected() {
        let err = UserId::new("").unwrap_err();
        assert!(matches!(err, CoreError::InvalidId { kind: "user id", .. }));
    }

    #[test]
    fn test_bad_characters_rejected() {
        assert!(UserId::new("alice bob").is_err());
        assert!(DocumentId::new("doc/1").is_err());
        assert!(GroupId::new("团队").is_err());
    }

    #[test]
    fn test_too_long_rejected() {
        let long = "a".repeat(MAX_ID_LEN + 1);
        assert!(UserId::new(long).is_err());
        assert!(UserId::new("a".repeat(MAX_ID_LEN)).is_ok());
    }

    #[test]
    fn test_label_allows_spaces() {
        assert!(validate_label("name", "My Laptop (work)").is_ok());
        assert!(validate_label("name", "   ").is_err());
        assert!(validate_label("name", "a\u{0}b").is_err());
    }

    #[test]
    fn test_recipient_ordering_stable() {
        let u = Recipient::User(UserId::new("alice").unwrap());
        let g = Recipient::Group(GroupId::new("alpha").unwrap());
        // Users sort before groups; used for deterministic block ordering.
        assert!(u < g);
    }

    #[test]
    fn test_id_serde_transparent() {
        let id = DocumentId::new("doc-1").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"doc-1\"");
    }
}
