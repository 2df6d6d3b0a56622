//! The identity a cart is scoped to.
//!
//! Modeled as a sum type instead of a nullable user reference so every
//! operation pattern-matches on the session state rather than null-checking.

use serde::{Deserialize, Serialize};

use super::id::OwnerId;

/// The authenticated principal a cart is scoped to, or the lack of one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identity {
    /// No identity established; the cart is not persisted.
    #[default]
    Anonymous,
    /// Signed in; the cart lives under this owner's namespace.
    Authenticated(OwnerId),
}

impl Identity {
    /// The owner id, when signed in.
    #[must_use]
    pub const fn owner_id(&self) -> Option<&OwnerId> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(owner) => Some(owner),
        }
    }

    /// Whether an identity is established.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

impl From<OwnerId> for Identity {
    fn from(owner: OwnerId) -> Self {
        Self::Authenticated(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_id_only_when_authenticated() {
        assert_eq!(Identity::Anonymous.owner_id(), None);
        let identity = Identity::Authenticated(OwnerId::new("user-1"));
        assert_eq!(identity.owner_id(), Some(&OwnerId::new("user-1")));
        assert!(identity.is_authenticated());
        assert!(!Identity::Anonymous.is_authenticated());
    }
}
