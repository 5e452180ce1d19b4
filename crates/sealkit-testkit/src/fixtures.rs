//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: one shared in-memory store,
//! one SDK session per user.

use std::sync::Arc;

use sealkit::{Result, Sdk, SdkConfig};
use sealkit_core::{DeviceId, UserId};
use sealkit_identity::{DeviceCreateOpts, UserCreateOpts};
use sealkit_policy::PolicyRuleSet;
use sealkit_store::MemoryStore;

/// Install a tracing subscriber writing to the test output (idempotent).
/// Call at the top of a test to see per-rule policy warnings and rotation
/// drop reports.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A test fixture with a shared in-memory store.
pub struct TestFixture {
    /// The store every session in this fixture shares.
    pub store: Arc<MemoryStore>,
    /// Policy rules applied to sessions created by this fixture.
    pub policy: PolicyRuleSet,
}

impl TestFixture {
    /// Create a new fixture with an empty store and no policy rules.
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            policy: PolicyRuleSet::default(),
        }
    }

    /// Create a fixture whose sessions use the given policy rules.
    pub fn with_policy(policy: PolicyRuleSet) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            policy,
        }
    }

    /// The conventional passphrase for a fixture user.
    pub fn passphrase(name: &str) -> String {
        format!("{name}-passphrase")
    }

    /// Create a user, provision one device, and return an SDK session
    /// for it.
    pub async fn user_with_device(&self, name: &str) -> Result<Sdk<MemoryStore>> {
        let user_id = UserId::new(name)?;
        Sdk::create_user(
            &*self.store,
            user_id.clone(),
            &Self::passphrase(name),
            &UserCreateOpts::default(),
        )
        .await?;
        self.device_session(name).await
    }

    /// Provision an additional device for an existing user and return a
    /// session for it.
    pub async fn device_session(&self, name: &str) -> Result<Sdk<MemoryStore>> {
        let user_id = UserId::new(name)?;
        let device_id = DeviceId::new(format!("{name}-device-{}", self.device_count(&user_id).await?))?;
        let (context, _) = Sdk::generate_device(
            &*self.store,
            &user_id,
            &Self::passphrase(name),
            device_id,
            &DeviceCreateOpts::default(),
        )
        .await?;

        Ok(Sdk::initialize(
            Arc::clone(&self.store),
            context,
            SdkConfig {
                operation_timeout: None,
                policy: self.policy.clone(),
            },
        ))
    }

    async fn device_count(&self, user_id: &UserId) -> Result<usize> {
        use sealkit_store::Store;
        Ok(self.store.list_devices(user_id).await?.len())
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
