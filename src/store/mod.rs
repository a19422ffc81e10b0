//! Credential and permission stores
//!
//! The cache only talks to the [`PermissionStore`] trait. Real deployments
//! back it with a web service, a DB or memcached; [`StaticStore`] is a fixed
//! table loaded from configuration.

mod table;

pub use table::StaticStore;

pub use async_trait::async_trait;
use crate::auth::PermissionSet;
use thiserror::Error;

/// Store errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("no permissions defined for user '{0}'")]
    UnknownUser(String),
}

/// Source of truth for credentials and permissions
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Resolve everything a user may do. May be slow.
    async fn fetch_permissions(&self, user: &str) -> Result<PermissionSet, StoreError>;

    /// Check the token a client presented when opening a session
    async fn validate_credential(&self, user: &str, credential: &str) -> Result<bool, StoreError>;
}
