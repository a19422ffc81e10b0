//! Connection ownership

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Opaque connection identifier handed out by the session host
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("connection '{0}' is already bound")]
    DuplicateConnection(ConnectionId),

    #[error("connection '{0}' is not bound to any user")]
    UnknownConnection(ConnectionId),
}

/// Maps every open connection to the user that owns it
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, String>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a new connection
    pub fn bind(&self, id: ConnectionId, user: &str) -> Result<(), RegistryError> {
        match self.connections.entry(id) {
            Entry::Occupied(occupied) => {
                Err(RegistryError::DuplicateConnection(occupied.key().clone()))
            }
            Entry::Vacant(vacant) => {
                vacant.insert(user.to_string());
                Ok(())
            }
        }
    }

    /// Get the owner of a connection
    pub fn lookup(&self, id: &ConnectionId) -> Result<String, RegistryError> {
        self.connections
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| RegistryError::UnknownConnection(id.clone()))
    }

    /// Remove a connection, returning its owner. Unknown ids are ignored.
    pub fn unbind(&self, id: &ConnectionId) -> Option<String> {
        self.connections.remove(id).map(|(_, user)| user)
    }

    /// All open connections of one user
    pub fn connections_of(&self, user: &str) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|entry| entry.value() == user)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_lookup_unbind() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::from("conn-1");

        registry.bind(id.clone(), "user1").unwrap();
        assert_eq!(registry.lookup(&id).unwrap(), "user1");
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.unbind(&id), Some("user1".to_string()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_bind() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::from("conn-1");

        registry.bind(id.clone(), "user1").unwrap();
        let result = registry.bind(id.clone(), "user2");

        assert_eq!(result, Err(RegistryError::DuplicateConnection(id.clone())));
        // First owner is kept
        assert_eq!(registry.lookup(&id).unwrap(), "user1");
    }

    #[test]
    fn test_unknown_lookup() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::from("never-opened");

        assert_eq!(
            registry.lookup(&id),
            Err(RegistryError::UnknownConnection(id))
        );
    }

    #[test]
    fn test_unbind_idempotent() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::generate();

        registry.bind(id.clone(), "leto").unwrap();
        assert!(registry.unbind(&id).is_some());
        assert!(registry.unbind(&id).is_none());
    }

    #[test]
    fn test_connections_of() {
        let registry = ConnectionRegistry::new();
        registry.bind("a".into(), "leto").unwrap();
        registry.bind("b".into(), "leto").unwrap();
        registry.bind("c".into(), "user1").unwrap();

        let mut ids = registry.connections_of("leto");
        ids.sort();
        assert_eq!(ids, vec![ConnectionId::from("a"), ConnectionId::from("b")]);
    }

    #[test]
    fn test_generated_ids_unique() {
        assert_ne!(ConnectionId::generate(), ConnectionId::generate());
    }
}
