//! brokerauth - per-user authorization cache for MQTT bridge session hooks
//!
//! Maps live connections to users, fetches each user's permissions once in
//! the background when their first connection opens, and answers broker,
//! publish and subscribe checks from that cache until their last connection
//! closes.

pub mod auth;
pub mod cache;
pub mod config;
pub mod hook;
pub mod store;

pub use auth::{Denial, PermissionSet, ResourceCatalog, ResourceKind};
pub use cache::{AuthorizationCacheManager, ConnectionId};
pub use config::Config;
pub use hook::AuthHook;
pub use store::{PermissionStore, StaticStore, StoreError};
