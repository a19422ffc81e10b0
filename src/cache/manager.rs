//! Authorization cache manager
//!
//! Owns the connection registry and the per-user entries. Entry creation
//! and removal happen under the DashMap shard lock for the user's key, so
//! "is this the first connection? create the entry, start the fetch" and
//! "was this the last connection? drop the entry" are each a single atomic
//! step per user, and different users don't wait on each other.

use crate::auth::{AuthorizationTable, Denial, PermissionSet, ResourceCatalog, ResourceKind};
use crate::cache::entry::UserAuthorizationCache;
use crate::cache::registry::{ConnectionId, ConnectionRegistry, RegistryError};
use crate::config::CacheConfig;
use crate::store::PermissionStore;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

#[derive(Default)]
struct FetchCounters {
    dispatched: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
}

/// Snapshot of the manager's state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub connections: usize,
    pub cached_users: usize,
    pub fetches_dispatched: u64,
    pub fetches_failed: u64,
    pub results_discarded: u64,
}

pub struct AuthorizationCacheManager {
    connections: ConnectionRegistry,
    entries: DashMap<String, Arc<UserAuthorizationCache>>,
    store: Arc<dyn PermissionStore>,
    catalog: ResourceCatalog,
    fetch_permits: Arc<Semaphore>,
    query_timeout: Duration,
    counters: Arc<FetchCounters>,
}

impl AuthorizationCacheManager {
    pub fn new(
        settings: &CacheConfig,
        catalog: ResourceCatalog,
        store: Arc<dyn PermissionStore>,
    ) -> Self {
        Self {
            connections: ConnectionRegistry::new(),
            entries: DashMap::new(),
            store,
            catalog,
            fetch_permits: Arc::new(Semaphore::new(settings.fetch_workers.max(1))),
            query_timeout: settings.query_timeout(),
            counters: Arc::new(FetchCounters::default()),
        }
    }

    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Register a connection and make sure its user's permissions are cached
    /// or on their way.
    ///
    /// Must be called from within a Tokio runtime: the first connection of a
    /// user spawns the permission fetch.
    pub fn on_connection_open(
        &self,
        connection_id: ConnectionId,
        user: &str,
    ) -> Result<(), RegistryError> {
        self.connections.bind(connection_id.clone(), user)?;

        match self.entries.entry(user.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().add_ref() {
                    // Stale entry that drained without being removed
                    let entry = Arc::new(UserAuthorizationCache::new());
                    occupied.insert(entry.clone());
                    self.dispatch_fetch(user, entry);
                } else {
                    debug!(user = %user, connection_id = %connection_id, "Reusing cached authorizations");
                }
            }
            Entry::Vacant(vacant) => {
                let entry = Arc::new(UserAuthorizationCache::new());
                vacant.insert(entry.clone());
                self.dispatch_fetch(user, entry);
            }
        }

        Ok(())
    }

    /// Forget a connection. Closing an unknown or already closed connection
    /// does nothing. Returns the owner if the connection was open.
    pub fn on_connection_close(&self, connection_id: &ConnectionId) -> Option<String> {
        let Some(user) = self.connections.unbind(connection_id) else {
            debug!(connection_id = %connection_id, "Close for unknown connection ignored");
            return None;
        };

        match self.entries.entry(user.clone()) {
            Entry::Occupied(occupied) => {
                if occupied.get().release() {
                    occupied.remove();
                    debug!(user = %user, "Last connection closed, authorizations dropped");
                }
            }
            Entry::Vacant(_) => {
                warn!(user = %user, connection_id = %connection_id, "No authorization entry for closing connection");
            }
        }

        Some(user)
    }

    /// Decide whether a connection may use a resource, waiting at most the
    /// configured query timeout for the user's permissions
    pub async fn query(
        &self,
        connection_id: &ConnectionId,
        kind: ResourceKind,
        resource: &str,
    ) -> Result<(), Denial> {
        self.query_with_timeout(connection_id, kind, resource, self.query_timeout)
            .await
    }

    /// Like [`query`](Self::query) with a caller-chosen wait bound
    pub async fn query_with_timeout(
        &self,
        connection_id: &ConnectionId,
        kind: ResourceKind,
        resource: &str,
        timeout: Duration,
    ) -> Result<(), Denial> {
        let (user, permissions) = self.permissions_for(connection_id, timeout).await?;
        self.catalog.authorize(&user, &permissions, kind, resource)
    }

    /// Decision table for every known resource, for display by clients
    pub async fn authorization_table(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<AuthorizationTable, Denial> {
        let (user, permissions) = self
            .permissions_for(connection_id, self.query_timeout)
            .await?;
        Ok(self.catalog.table(&user, &permissions))
    }

    /// The live entry of a user, if any of their connections is open
    pub fn entry(&self, user: &str) -> Option<Arc<UserAuthorizationCache>> {
        self.entries.get(user).map(|r| r.value().clone())
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            connections: self.connections.len(),
            cached_users: self.entries.len(),
            fetches_dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            fetches_failed: self.counters.failed.load(Ordering::Relaxed),
            results_discarded: self.counters.discarded.load(Ordering::Relaxed),
        }
    }

    async fn permissions_for(
        &self,
        connection_id: &ConnectionId,
        timeout: Duration,
    ) -> Result<(String, Arc<PermissionSet>), Denial> {
        let user = self.connections.lookup(connection_id).map_err(|e| {
            error!(connection_id = %connection_id, error = %e, "Authorization check on unbound connection");
            Denial::ProtocolViolation(e.to_string())
        })?;

        let entry = self.entry(&user).ok_or_else(|| {
            error!(user = %user, connection_id = %connection_id, "Connection has no authorization entry");
            Denial::ProtocolViolation(format!("no authorization entry for user '{}'", user))
        })?;

        match entry.query(timeout).await {
            Ok(permissions) => Ok((user, permissions)),
            Err(e) => {
                warn!(user = %user, error = %e, "Authorizations not ready, denying");
                Err(Denial::Unavailable { user })
            }
        }
    }

    fn dispatch_fetch(&self, user: &str, entry: Arc<UserAuthorizationCache>) {
        entry.mark_populating();
        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);

        let user = user.to_string();
        let store = self.store.clone();
        let permits = self.fetch_permits.clone();
        let counters = self.counters.clone();

        debug!(user = %user, "Dispatching permission fetch");

        tokio::spawn(async move {
            let permissions = match permits.acquire_owned().await {
                Ok(_permit) => {
                    // Run the store call in its own task so a panic there
                    // still resolves the entry
                    let fetch_user = user.clone();
                    let fetched =
                        tokio::spawn(async move { store.fetch_permissions(&fetch_user).await })
                            .await;

                    match fetched {
                        Ok(Ok(permissions)) => permissions,
                        Ok(Err(e)) => {
                            counters.failed.fetch_add(1, Ordering::Relaxed);
                            warn!(user = %user, error = %e, "Permission fetch failed, denying everything");
                            PermissionSet::denied()
                        }
                        Err(e) => {
                            counters.failed.fetch_add(1, Ordering::Relaxed);
                            error!(user = %user, error = %e, "Permission fetch task aborted, denying everything");
                            PermissionSet::denied()
                        }
                    }
                }
                Err(_) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    error!(user = %user, "Fetch pool closed, denying everything");
                    PermissionSet::denied()
                }
            };

            match entry.fulfill(permissions) {
                Ok(true) => info!(user = %user, "Authorizations cached"),
                Ok(false) => {
                    counters.discarded.fetch_add(1, Ordering::Relaxed);
                    debug!(user = %user, "User gone before fetch completed, result discarded");
                }
                Err(e) => error!(user = %user, error = %e, "Failed to cache authorizations"),
            }
        });
    }
}
