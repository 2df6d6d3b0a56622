//! The identity provider boundary.
//!
//! Exposes the current identity as a value plus a change-notification
//! channel that fires once per sign-in and once per sign-out. The real
//! storefront feeds this from its auth session; tests drive it directly.

use tokio::sync::watch;
use tracing::info;

use padkos_core::{Identity, OwnerId};

/// Publishes identity changes to any number of subscribers.
///
/// The synchronizer holds a subscription for its whole lifetime; sign-in
/// and sign-out each fire exactly one notification.
#[derive(Debug)]
pub struct IdentityProvider {
    tx: watch::Sender<Identity>,
}

impl IdentityProvider {
    /// Create a provider with no identity established.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Identity::Anonymous);
        Self { tx }
    }

    /// Establish an identity.
    pub fn sign_in(&self, owner: OwnerId) {
        info!(%owner, "identity established");
        self.tx.send_replace(Identity::Authenticated(owner));
    }

    /// Drop the current identity. Remote cart data is left untouched;
    /// signing back in restores it.
    pub fn sign_out(&self) {
        info!("identity cleared");
        self.tx.send_replace(Identity::Anonymous);
    }

    /// The identity as of now.
    #[must_use]
    pub fn current(&self) -> Identity {
        self.tx.borrow().clone()
    }

    /// Subscribe to identity changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Identity> {
        self.tx.subscribe()
    }
}

impl Default for IdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_in_and_out_notify_subscribers() {
        let provider = IdentityProvider::new();
        let mut rx = provider.subscribe();
        assert_eq!(provider.current(), Identity::Anonymous);

        provider.sign_in(OwnerId::new("user-1"));
        rx.changed().await.unwrap();
        assert_eq!(
            *rx.borrow_and_update(),
            Identity::Authenticated(OwnerId::new("user-1"))
        );

        provider.sign_out();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Identity::Anonymous);
    }
}
