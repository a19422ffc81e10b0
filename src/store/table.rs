//! Fixed-table store

use crate::auth::{Credential, PermissionSet};
use crate::config::Config;
use crate::store::{async_trait, PermissionStore, StoreError};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::debug;

struct UserRecord {
    credential: Credential,
    /// `None` means the user can log in but has no permissions on record
    permissions: Option<PermissionSet>,
}

/// In-memory user table, with optional artificial latency to stand in for a
/// remote service
pub struct StaticStore {
    users: HashMap<String, UserRecord>,
    fetch_delay: Duration,
}

impl StaticStore {
    pub fn new() -> Self {
        Self {
            users: HashMap::new(),
            fetch_delay: Duration::ZERO,
        }
    }

    /// Users from the `[users.*]` tables of a configuration
    pub fn from_config(config: &Config) -> Self {
        let brokers = config.broker_addresses();
        let mut store = Self::new();

        for (name, user) in &config.users {
            store = store.with_user(name, &user.token, Some(user.permissions(&brokers)));
        }

        store
    }

    /// The demo user table
    ///
    /// - `user1`: every broker, subscribe to topics 1-3, publish to 4-6
    /// - `user2`: may log in but not connect to any broker
    /// - `leto`, `demouser`: everything
    /// - `gollum`: brokers only
    /// - `lucky`: brokers, publish to 13 and 17
    /// - `patient0`: valid token, no permissions on record
    pub fn demo(brokers: &BTreeSet<String>) -> Self {
        let user1 = PermissionSet::builder()
            .with_brokers(brokers.iter().cloned())
            .with_subscribe("topics/topic_1")
            .with_subscribe("topics/topic_2")
            .with_subscribe("topics/topic_3")
            .with_publish("topics/topic_4")
            .with_publish("topics/topic_5")
            .with_publish("topics/topic_6")
            .build();

        let gollum = PermissionSet::builder()
            .with_brokers(brokers.iter().cloned())
            .build();

        let lucky = PermissionSet::builder()
            .with_brokers(brokers.iter().cloned())
            .with_publish("topics/topic_13")
            .with_publish("topics/topic_17")
            .build();

        Self::new()
            .with_user("demouser", "", Some(PermissionSet::allow_all()))
            .with_user("user1", "ikgdfigdfhihdsih", Some(user1))
            .with_user("user2", "slaoejkauekalkew", Some(PermissionSet::denied()))
            .with_user("patient0", "lookihaveanewtokenhere", None)
            .with_user("leto", "powerfultoken", Some(PermissionSet::allow_all()))
            .with_user("gollum", "toobadforyou", Some(gollum))
            .with_user("lucky", "srsly", Some(lucky))
    }

    pub fn with_user(
        mut self,
        user: &str,
        token: &str,
        permissions: Option<PermissionSet>,
    ) -> Self {
        self.users.insert(
            user.to_string(),
            UserRecord {
                credential: Credential::new(token),
                permissions,
            },
        );
        self
    }

    /// Delay every permission fetch
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// Known user names, sorted
    pub fn users(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.users.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for StaticStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PermissionStore for StaticStore {
    async fn fetch_permissions(&self, user: &str) -> Result<PermissionSet, StoreError> {
        if !self.fetch_delay.is_zero() {
            debug!(user = %user, delay = ?self.fetch_delay, "Simulating slow permission lookup");
            tokio::time::sleep(self.fetch_delay).await;
        }

        self.users
            .get(user)
            .and_then(|record| record.permissions.clone())
            .ok_or_else(|| StoreError::UnknownUser(user.to_string()))
    }

    async fn validate_credential(&self, user: &str, credential: &str) -> Result<bool, StoreError> {
        Ok(self
            .users
            .get(user)
            .map(|record| record.credential.matches(credential))
            .unwrap_or(false))
    }
}
