//! Configuration file
//!
//! Everything is optional; an empty file yields the demo defaults (3 s query
//! timeout, topics `topics/topic_0` to `topics/topic_29`, no brokers).
//!
//! ```toml
//! [cache]
//! query_timeout_ms = 3000
//! fetch_workers = 8
//!
//! [brokers.local]
//! server_address = "tcp://localhost:1883"
//!
//! [users.user1]
//! token = "ikgdfigdfhihdsih"
//! all_brokers = true
//! subscribe = ["topics/topic_1"]
//! ```

use crate::auth::{PermissionSet, ResourceCatalog};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub policy: PolicyConfig,
    /// Broker definitions keyed by an arbitrary name
    pub brokers: BTreeMap<String, BrokerConfig>,
    pub topics: TopicsConfig,
    /// Users for the fixed-table store
    pub users: BTreeMap<String, UserConfig>,
}

/// Authorization cache tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a check waits for a user's permissions to arrive
    pub query_timeout_ms: u64,
    /// Maximum number of permission fetches running at once
    pub fetch_workers: usize,
}

impl CacheConfig {
    /// Never shorter than one millisecond
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms.max(1))
    }

    /// Set the query timeout, rounded up to whole milliseconds. Zero becomes
    /// one millisecond.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_nanos().div_ceil(1_000_000);
        self.query_timeout_ms = u64::try_from(millis).unwrap_or(u64::MAX).max(1);
        self
    }

    pub fn with_fetch_workers(mut self, workers: usize) -> Self {
        self.fetch_workers = workers;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: 3000,
            fetch_workers: 8,
        }
    }
}

/// What to do with resources the configuration doesn't mention
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub allow_unknown_topics: bool,
    pub allow_unknown_brokers: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allow_unknown_topics: true,
            allow_unknown_brokers: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    pub server_address: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    /// Explicit topic names
    pub known: Vec<String>,
    /// Generate `{prefix}0` .. `{prefix}{count - 1}`
    pub prefix: Option<String>,
    pub count: usize,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            known: Vec::new(),
            prefix: Some("topics/topic_".to_string()),
            count: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub token: String,
    pub allow_all: bool,
    /// Grant every configured broker
    pub all_brokers: bool,
    pub brokers: Vec<String>,
    pub publish: Vec<String>,
    pub subscribe: Vec<String>,
}

impl UserConfig {
    pub fn permissions(&self, configured_brokers: &BTreeSet<String>) -> PermissionSet {
        if self.allow_all {
            return PermissionSet::allow_all();
        }

        let mut builder = PermissionSet::builder().with_brokers(self.brokers.iter().cloned());
        if self.all_brokers {
            builder = builder.with_brokers(configured_brokers.iter().cloned());
        }
        for topic in &self.publish {
            builder = builder.with_publish(topic.clone());
        }
        for filter in &self.subscribe {
            builder = builder.with_subscribe(filter.clone());
        }
        builder.build()
    }
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.query_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "cache.query_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.cache.fetch_workers == 0 {
            return Err(ConfigError::Invalid(
                "cache.fetch_workers must be greater than zero".to_string(),
            ));
        }
        for (name, broker) in &self.brokers {
            if broker.server_address.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "brokers.{}.server_address is empty",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Every configured broker address
    pub fn broker_addresses(&self) -> BTreeSet<String> {
        self.brokers
            .values()
            .map(|b| b.server_address.trim().to_string())
            .collect()
    }

    pub fn known_topics(&self) -> BTreeSet<String> {
        let mut topics: BTreeSet<String> = self.topics.known.iter().cloned().collect();
        if let Some(prefix) = &self.topics.prefix {
            topics.extend((0..self.topics.count).map(|i| format!("{}{}", prefix, i)));
        }
        topics
    }

    pub fn catalog(&self) -> ResourceCatalog {
        ResourceCatalog::new(self.broker_addresses(), self.known_topics()).with_unknown_policy(
            self.policy.allow_unknown_brokers,
            self.policy.allow_unknown_topics,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ResourceKind;
    use std::io::Write;

    #[test]
    fn test_empty_config_defaults() {
        let config = Config::from_toml_str("").unwrap();

        assert_eq!(config.cache.query_timeout(), Duration::from_secs(3));
        assert_eq!(config.cache.fetch_workers, 8);
        assert!(config.policy.allow_unknown_topics);
        assert!(!config.policy.allow_unknown_brokers);
        assert!(config.broker_addresses().is_empty());
        assert_eq!(config.known_topics().len(), 30);
        assert!(config.known_topics().contains("topics/topic_29"));
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml_str(
            r#"
            [cache]
            query_timeout_ms = 500
            fetch_workers = 2

            [policy]
            allow_unknown_topics = false

            [brokers.local]
            server_address = "tcp://localhost:1883"

            [brokers.remote]
            server_address = "tcp://broker.example.com:1883"

            [topics]
            known = ["sensors/temp"]
            count = 0

            [users.user1]
            token = "ikgdfigdfhihdsih"
            all_brokers = true
            subscribe = ["topics/topic_1"]
            publish = ["topics/topic_4"]

            [users.leto]
            token = "powerfultoken"
            allow_all = true
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.query_timeout(), Duration::from_millis(500));
        assert_eq!(config.cache.fetch_workers, 2);
        assert!(!config.policy.allow_unknown_topics);
        assert_eq!(config.broker_addresses().len(), 2);
        assert_eq!(
            config.known_topics().into_iter().collect::<Vec<_>>(),
            vec!["sensors/temp".to_string()]
        );

        let brokers = config.broker_addresses();
        let user1 = config.users["user1"].permissions(&brokers);
        assert!(user1.can_connect("tcp://broker.example.com:1883"));
        assert!(user1.can_subscribe("topics/topic_1"));
        assert!(user1.can_publish("topics/topic_4"));

        assert!(config.users["leto"].permissions(&brokers).is_allow_all());

        let catalog = config.catalog();
        assert!(catalog.is_known(ResourceKind::Broker, "tcp://localhost:1883"));
        assert!(catalog
            .authorize("user1", &user1, ResourceKind::Publish, "unknown/topic")
            .is_err());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_toml_str("[cache]\nfetch_workers = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[cache]\nquery_timeout_ms = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[brokers.a]\nserver_address = \" \""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[cache]\nfetch_workers = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_query_timeout_rounds_up() {
        let sub_milli = CacheConfig::default().with_query_timeout(Duration::from_micros(900));
        assert_eq!(sub_milli.query_timeout_ms, 1);
        assert_eq!(sub_milli.query_timeout(), Duration::from_millis(1));

        let fractional = CacheConfig::default().with_query_timeout(Duration::from_micros(1500));
        assert_eq!(fractional.query_timeout_ms, 2);

        let zero = CacheConfig::default().with_query_timeout(Duration::ZERO);
        assert_eq!(zero.query_timeout_ms, 1);

        let huge = CacheConfig::default().with_query_timeout(Duration::MAX);
        assert_eq!(huge.query_timeout_ms, u64::MAX);

        // Zero written straight into the field still waits
        let raw = CacheConfig {
            query_timeout_ms: 0,
            fetch_workers: 1,
        };
        assert_eq!(raw.query_timeout(), Duration::from_millis(1));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[brokers.local]\nserver_address = \"tcp://localhost:1883\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(config.broker_addresses().contains("tcp://localhost:1883"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/brokerauth.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
