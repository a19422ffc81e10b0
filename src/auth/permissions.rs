//! Permission sets

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Kinds of resources a connection can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Connect to an MQTT broker address
    Broker,
    /// Publish to a topic
    Publish,
    /// Subscribe to a topic filter
    Subscribe,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Broker,
        ResourceKind::Publish,
        ResourceKind::Subscribe,
    ];

    /// Parse from string
    pub fn parse(s: &str) -> Option<ResourceKind> {
        match s.to_lowercase().as_str() {
            "broker" | "connect" => Some(ResourceKind::Broker),
            "publish" => Some(ResourceKind::Publish),
            "subscribe" => Some(ResourceKind::Subscribe),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Broker => write!(f, "broker"),
            ResourceKind::Publish => write!(f, "publish"),
            ResourceKind::Subscribe => write!(f, "subscribe"),
        }
    }
}

/// Immutable set of everything a user may do.
///
/// Anything not listed is denied, unless the set was built with
/// [`PermissionSet::allow_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    #[serde(default)]
    allow_all: bool,
    #[serde(default)]
    brokers: BTreeSet<String>,
    #[serde(default)]
    publish: BTreeSet<String>,
    #[serde(default)]
    subscribe: BTreeSet<String>,
}

impl PermissionSet {
    /// A set that authorizes every request
    pub fn allow_all() -> Self {
        Self {
            allow_all: true,
            ..Self::default()
        }
    }

    /// A set that authorizes nothing
    pub fn denied() -> Self {
        Self::default()
    }

    pub fn builder() -> PermissionSetBuilder {
        PermissionSetBuilder::default()
    }

    pub fn is_allow_all(&self) -> bool {
        self.allow_all
    }

    /// True when the set grants nothing at all
    pub fn is_empty(&self) -> bool {
        !self.allow_all
            && self.brokers.is_empty()
            && self.publish.is_empty()
            && self.subscribe.is_empty()
    }

    /// Check if the given operation is allowed on the given resource
    pub fn allows(&self, kind: ResourceKind, resource: &str) -> bool {
        self.allow_all || self.resources(kind).contains(resource)
    }

    pub fn can_connect(&self, broker: &str) -> bool {
        self.allows(ResourceKind::Broker, broker)
    }

    pub fn can_publish(&self, topic: &str) -> bool {
        self.allows(ResourceKind::Publish, topic)
    }

    pub fn can_subscribe(&self, filter: &str) -> bool {
        self.allows(ResourceKind::Subscribe, filter)
    }

    /// Explicitly granted resources of one kind (empty for allow-all sets)
    pub fn resources(&self, kind: ResourceKind) -> &BTreeSet<String> {
        match kind {
            ResourceKind::Broker => &self.brokers,
            ResourceKind::Publish => &self.publish,
            ResourceKind::Subscribe => &self.subscribe,
        }
    }
}

/// Collects grants for a [`PermissionSet`]
#[derive(Debug, Clone, Default)]
pub struct PermissionSetBuilder {
    brokers: BTreeSet<String>,
    publish: BTreeSet<String>,
    subscribe: BTreeSet<String>,
}

impl PermissionSetBuilder {
    /// Allow connecting to a broker address
    pub fn with_broker(mut self, broker: impl Into<String>) -> Self {
        self.brokers.insert(broker.into());
        self
    }

    /// Allow connecting to every given broker address
    pub fn with_brokers<I, S>(mut self, brokers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.brokers.extend(brokers.into_iter().map(Into::into));
        self
    }

    /// Allow publishing to a topic
    pub fn with_publish(mut self, topic: impl Into<String>) -> Self {
        self.publish.insert(topic.into());
        self
    }

    /// Allow subscribing to a topic filter
    pub fn with_subscribe(mut self, filter: impl Into<String>) -> Self {
        self.subscribe.insert(filter.into());
        self
    }

    pub fn build(self) -> PermissionSet {
        PermissionSet {
            allow_all: false,
            brokers: self.brokers,
            publish: self.publish,
            subscribe: self.subscribe,
        }
    }
}
