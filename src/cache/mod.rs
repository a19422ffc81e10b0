//! Per-user authorization cache
//!
//! A user's permissions are fetched once, in the background, when their
//! first connection opens, and dropped when their last connection closes.
//! Checks that arrive before the fetch finishes wait for it, up to the
//! configured query timeout.

mod entry;
mod manager;
mod registry;

pub use entry::{CacheError, EntryPhase, UserAuthorizationCache};
pub use manager::{AuthorizationCacheManager, CacheStats};
pub use registry::{ConnectionId, ConnectionRegistry, RegistryError};
