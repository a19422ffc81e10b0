//! Session host integration
//!
//! The MQTT bridge calls these at session open, broker connect, publish,
//! subscribe and close. Any `Err` must fail the operation that triggered it.

use crate::auth::{Denial, ResourceKind};
use crate::cache::{AuthorizationCacheManager, CacheStats, ConnectionId};
use crate::config::Config;
use crate::store::PermissionStore;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Authorization hook backed by the per-user cache
#[derive(Clone)]
pub struct AuthHook {
    manager: Arc<AuthorizationCacheManager>,
    store: Arc<dyn PermissionStore>,
}

impl AuthHook {
    pub fn new(config: &Config, store: Arc<dyn PermissionStore>) -> Self {
        let manager = Arc::new(AuthorizationCacheManager::new(
            &config.cache,
            config.catalog(),
            store.clone(),
        ));
        Self { manager, store }
    }

    /// Get a reference to the underlying cache manager
    pub fn manager(&self) -> &Arc<AuthorizationCacheManager> {
        &self.manager
    }

    pub fn stats(&self) -> CacheStats {
        self.manager.stats()
    }

    /// Validate the session token and start caching the user's permissions.
    ///
    /// The token check is awaited inline; permissions are fetched in the
    /// background.
    pub async fn can_open_session(
        &self,
        connection_id: &ConnectionId,
        user: &str,
        credential: &str,
    ) -> Result<(), Denial> {
        match self.store.validate_credential(user, credential).await {
            Ok(true) => {}
            Ok(false) => {
                info!(user = %user, connection_id = %connection_id, "Invalid token");
                return Err(Denial::InvalidCredential {
                    user: user.to_string(),
                });
            }
            Err(e) => {
                warn!(user = %user, error = %e, "Credential check failed");
                return Err(Denial::Unavailable {
                    user: user.to_string(),
                });
            }
        }

        self.manager
            .on_connection_open(connection_id.clone(), user)
            .map_err(|e| {
                error!(user = %user, error = %e, "Session open rejected");
                Denial::ProtocolViolation(e.to_string())
            })?;

        info!(user = %user, connection_id = %connection_id, "Session opened");
        Ok(())
    }

    pub async fn can_connect(
        &self,
        connection_id: &ConnectionId,
        broker_address: &str,
    ) -> Result<(), Denial> {
        self.check(connection_id, ResourceKind::Broker, broker_address)
            .await
    }

    pub async fn can_publish(&self, connection_id: &ConnectionId, topic: &str) -> Result<(), Denial> {
        self.check(connection_id, ResourceKind::Publish, topic).await
    }

    pub async fn can_subscribe(
        &self,
        connection_id: &ConnectionId,
        topic_filter: &str,
    ) -> Result<(), Denial> {
        self.check(connection_id, ResourceKind::Subscribe, topic_filter)
            .await
    }

    pub fn on_connection_close(&self, connection_id: &ConnectionId) {
        if let Some(user) = self.manager.on_connection_close(connection_id) {
            info!(user = %user, connection_id = %connection_id, "Session closed");
        }
    }

    /// Same as [`on_connection_close`](Self::on_connection_close), for hosts
    /// that report session rather than connection termination
    pub fn on_session_close(&self, connection_id: &ConnectionId) {
        self.on_connection_close(connection_id);
    }

    async fn check(
        &self,
        connection_id: &ConnectionId,
        kind: ResourceKind,
        resource: &str,
    ) -> Result<(), Denial> {
        let result = self.manager.query(connection_id, kind, resource).await;
        match &result {
            Ok(()) => {
                debug!(connection_id = %connection_id, kind = %kind, resource = %resource, "Authorized")
            }
            Err(denial) if !denial.is_internal() => {
                info!(connection_id = %connection_id, kind = %kind, resource = %resource, code = denial.code(), "Denied")
            }
            // Already logged by the manager
            Err(_) => {}
        }
        result
    }
}
