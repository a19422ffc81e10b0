//! Known resources and the unknown-resource policy
//!
//! Brokers and topics listed in the configuration are "known". A request for
//! a known resource is decided by the user's permission set. A request for an
//! unknown one is allowed when the policy for its kind says so: topic names
//! may be transient or generated on the fly, so they are allowed by default.

use crate::auth::denial::{Denial, OK_CODE};
use crate::auth::permissions::{PermissionSet, ResourceKind};
use std::collections::{BTreeMap, BTreeSet};

/// Decision table: kind -> resource -> result code (0 means authorized)
pub type AuthorizationTable = BTreeMap<ResourceKind, BTreeMap<String, u8>>;

#[derive(Debug, Clone)]
pub struct ResourceCatalog {
    brokers: BTreeSet<String>,
    topics: BTreeSet<String>,
    allow_unknown_brokers: bool,
    allow_unknown_topics: bool,
}

impl ResourceCatalog {
    pub fn new(brokers: BTreeSet<String>, topics: BTreeSet<String>) -> Self {
        Self {
            brokers,
            topics,
            allow_unknown_brokers: false,
            allow_unknown_topics: true,
        }
    }

    pub fn with_unknown_policy(mut self, allow_brokers: bool, allow_topics: bool) -> Self {
        self.allow_unknown_brokers = allow_brokers;
        self.allow_unknown_topics = allow_topics;
        self
    }

    pub fn brokers(&self) -> &BTreeSet<String> {
        &self.brokers
    }

    pub fn topics(&self) -> &BTreeSet<String> {
        &self.topics
    }

    pub fn is_known(&self, kind: ResourceKind, resource: &str) -> bool {
        match kind {
            ResourceKind::Broker => self.brokers.contains(resource),
            ResourceKind::Publish | ResourceKind::Subscribe => self.topics.contains(resource),
        }
    }

    fn unknown_allowed(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::Broker => self.allow_unknown_brokers,
            ResourceKind::Publish | ResourceKind::Subscribe => self.allow_unknown_topics,
        }
    }

    /// Decide a single request against a user's permissions
    pub fn authorize(
        &self,
        user: &str,
        permissions: &PermissionSet,
        kind: ResourceKind,
        resource: &str,
    ) -> Result<(), Denial> {
        if permissions.allows(kind, resource) {
            return Ok(());
        }

        if !self.is_known(kind, resource) && self.unknown_allowed(kind) {
            return Ok(());
        }

        Err(Denial::not_allowed(kind, user, resource))
    }

    /// Precompute results for every known resource
    pub fn table(&self, user: &str, permissions: &PermissionSet) -> AuthorizationTable {
        let mut table = AuthorizationTable::new();

        for kind in ResourceKind::ALL {
            let known = match kind {
                ResourceKind::Broker => &self.brokers,
                ResourceKind::Publish | ResourceKind::Subscribe => &self.topics,
            };

            let results = known
                .iter()
                .map(|resource| {
                    let code = match self.authorize(user, permissions, kind, resource) {
                        Ok(()) => OK_CODE,
                        Err(denial) => denial.code(),
                    };
                    (resource.clone(), code)
                })
                .collect();

            table.insert(kind, results);
        }

        table
    }
}
