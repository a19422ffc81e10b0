//! Per-user cache entry
//!
//! Lifecycle:
//!
//! ```text
//! Empty -> Populating -> Ready -> Draining -> (removed)
//!            \_____________________/^
//! ```
//!
//! An entry is created with one reference by the first connection of a user.
//! The manager starts the permission fetch (`Populating`); its result is
//! written exactly once (`Ready`). When the last reference goes away the
//! entry is `Draining`: it is never revived, and a fetch result that arrives
//! afterwards is dropped.

use crate::auth::PermissionSet;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPhase {
    Empty,
    Populating,
    Ready,
    Draining,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("permissions already cached for this entry")]
    AlreadyFulfilled,

    #[error("permissions not available after {0:?}")]
    Unavailable(Duration),
}

struct EntryState {
    refs: usize,
    phase: EntryPhase,
}

/// Cached permissions of one user, shared by all of the user's connections
pub struct UserAuthorizationCache {
    state: Mutex<EntryState>,
    slot: watch::Sender<Option<Arc<PermissionSet>>>,
}

impl UserAuthorizationCache {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            state: Mutex::new(EntryState {
                refs: 1,
                phase: EntryPhase::Empty,
            }),
            slot,
        }
    }

    pub fn phase(&self) -> EntryPhase {
        self.state.lock().phase
    }

    pub fn ref_count(&self) -> usize {
        self.state.lock().refs
    }

    pub fn is_ready(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Record that the fetch has been dispatched. Returns false if the entry
    /// was not `Empty`.
    pub fn mark_populating(&self) -> bool {
        let mut state = self.state.lock();
        if state.phase == EntryPhase::Empty {
            state.phase = EntryPhase::Populating;
            true
        } else {
            false
        }
    }

    /// Count one more connection.
    ///
    /// Returns true if the count was already zero: the entry is draining and
    /// the caller must replace it with a new one. A drained entry is left
    /// untouched.
    pub fn add_ref(&self) -> bool {
        let mut state = self.state.lock();
        if state.refs == 0 {
            return true;
        }
        state.refs += 1;
        false
    }

    /// Count one connection less. Returns true when that was the last one.
    pub fn release(&self) -> bool {
        let mut state = self.state.lock();
        if state.refs == 0 {
            return false;
        }
        state.refs -= 1;
        if state.refs == 0 {
            state.phase = EntryPhase::Draining;
            true
        } else {
            false
        }
    }

    /// Publish the user's permissions and wake every waiting query.
    ///
    /// Returns `Ok(false)` when the entry is already draining and the result
    /// was dropped.
    pub fn fulfill(&self, permissions: PermissionSet) -> Result<bool, CacheError> {
        let mut state = self.state.lock();

        if self.slot.borrow().is_some() {
            return Err(CacheError::AlreadyFulfilled);
        }
        if state.phase == EntryPhase::Draining {
            return Ok(false);
        }

        state.phase = EntryPhase::Ready;
        self.slot.send_replace(Some(Arc::new(permissions)));
        Ok(true)
    }

    /// Get the cached permissions, waiting at most `timeout` for them to
    /// arrive.
    pub async fn query(&self, timeout: Duration) -> Result<Arc<PermissionSet>, CacheError> {
        let mut rx = self.slot.subscribe();

        let current = rx.borrow_and_update().clone();
        if let Some(permissions) = current {
            return Ok(permissions);
        }

        let waited = tokio::time::timeout(timeout, rx.wait_for(Option::is_some)).await;
        let permissions = match waited {
            Ok(Ok(slot)) => slot.clone(),
            // Sender gone or deadline hit
            Ok(Err(_)) | Err(_) => None,
        };

        permissions.ok_or(CacheError::Unavailable(timeout))
    }
}

impl Default for UserAuthorizationCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user1() -> PermissionSet {
        PermissionSet::builder()
            .with_subscribe("topics/topic_1")
            .with_publish("topics/topic_4")
            .build()
    }

    #[test]
    fn test_new_entry() {
        let entry = UserAuthorizationCache::new();
        assert_eq!(entry.phase(), EntryPhase::Empty);
        assert_eq!(entry.ref_count(), 1);
        assert!(!entry.is_ready());
    }

    #[test]
    fn test_lifecycle() {
        let entry = UserAuthorizationCache::new();

        assert!(entry.mark_populating());
        assert!(!entry.mark_populating());
        assert_eq!(entry.phase(), EntryPhase::Populating);

        assert!(!entry.add_ref());
        assert_eq!(entry.ref_count(), 2);

        assert_eq!(entry.fulfill(user1()), Ok(true));
        assert_eq!(entry.phase(), EntryPhase::Ready);

        assert!(!entry.release());
        assert!(entry.release());
        assert_eq!(entry.phase(), EntryPhase::Draining);
        assert_eq!(entry.ref_count(), 0);
    }

    #[test]
    fn test_release_never_underflows() {
        let entry = UserAuthorizationCache::new();
        assert!(entry.release());
        assert!(!entry.release());
        assert_eq!(entry.ref_count(), 0);
    }

    #[test]
    fn test_drained_entry_not_revived() {
        let entry = UserAuthorizationCache::new();
        entry.release();

        assert!(entry.add_ref());
        assert_eq!(entry.ref_count(), 0);
        assert_eq!(entry.phase(), EntryPhase::Draining);
    }

    #[test]
    fn test_fulfill_twice() {
        let entry = UserAuthorizationCache::new();
        entry.mark_populating();

        entry.fulfill(user1()).unwrap();
        assert_eq!(
            entry.fulfill(PermissionSet::allow_all()),
            Err(CacheError::AlreadyFulfilled)
        );
    }

    #[test]
    fn test_fulfill_after_drain_discarded() {
        let entry = UserAuthorizationCache::new();
        entry.mark_populating();
        entry.release();

        assert_eq!(entry.fulfill(user1()), Ok(false));
        assert!(!entry.is_ready());
        assert_eq!(entry.phase(), EntryPhase::Draining);
    }

    #[tokio::test]
    async fn test_query_ready() {
        let entry = UserAuthorizationCache::new();
        entry.fulfill(user1()).unwrap();

        let perms = entry.query(Duration::from_millis(1)).await.unwrap();
        assert!(perms.can_subscribe("topics/topic_1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_waits_for_late_fulfill() {
        let entry = Arc::new(UserAuthorizationCache::new());
        entry.mark_populating();

        let writer = entry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            writer.fulfill(user1()).unwrap();
        });

        let start = tokio::time::Instant::now();
        let perms = entry.query(Duration::from_secs(3)).await.unwrap();

        assert!(perms.can_publish("topics/topic_4"));
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_times_out() {
        let entry = UserAuthorizationCache::new();
        entry.mark_populating();

        let start = tokio::time::Instant::now();
        let result = entry.query(Duration::from_secs(3)).await;

        assert_eq!(result, Err(CacheError::Unavailable(Duration::from_secs(3))));
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_waiters_all_released() {
        let entry = Arc::new(UserAuthorizationCache::new());
        entry.mark_populating();

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let entry = entry.clone();
                tokio::spawn(async move { entry.query(Duration::from_secs(5)).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        entry.fulfill(user1()).unwrap();

        for waiter in waiters {
            let perms = waiter.await.unwrap().unwrap();
            assert!(perms.can_publish("topics/topic_4"));
        }
    }
}
