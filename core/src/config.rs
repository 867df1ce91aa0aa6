use std::env;
use std::sync::Arc;
use std::time::Duration;

use cluster_hashring::{
    CachingRepartitionResolver, ClusterManager, NoopRepartitionResolver, RepartitionResolver,
    RingConfig,
};

use crate::error::{Error, Result};

/// Default budget for one get-logs query, retries included.
pub const DEFAULT_GET_LOGS_TIMEOUT: Duration = Duration::from_secs(60);

/// Gateway settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Full node URLs (`FULLNODE_URLS`, comma separated).
    pub node_urls: Vec<String>,
    /// Deadline for a get-logs query (`GET_LOGS_TIMEOUT_MS`).
    pub get_logs_timeout: Duration,
    /// Sticky key-to-node routing (`HASH_RING_REPARTITION`).
    pub repartition: bool,
    pub ring: RingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            node_urls: Vec::new(),
            get_logs_timeout: DEFAULT_GET_LOGS_TIMEOUT,
            repartition: false,
            ring: RingConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::from_lookup(|key| env::var(key).ok())?;
        config.ring = RingConfig::from_env();
        Ok(config)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup("FULLNODE_URLS") {
            config.node_urls = parse_url_list(&raw);
        }

        if let Some(raw) = lookup("GET_LOGS_TIMEOUT_MS") {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                Error::config(format!("GET_LOGS_TIMEOUT_MS must be milliseconds, got {:?}", raw))
            })?;
            config.get_logs_timeout = Duration::from_millis(millis);
        }

        if let Some(raw) = lookup("HASH_RING_REPARTITION") {
            config.repartition = parse_flag(&raw).ok_or_else(|| {
                Error::config(format!("HASH_RING_REPARTITION must be true/false, got {:?}", raw))
            })?;
        }

        Ok(config)
    }

    /// Build the cluster manager these settings describe.
    pub fn cluster_manager(&self) -> ClusterManager {
        let resolver: Arc<dyn RepartitionResolver> = if self.repartition {
            Arc::new(CachingRepartitionResolver::new())
        } else {
            Arc::new(NoopRepartitionResolver)
        };

        ClusterManager::with_repartition(&self.node_urls, resolver, self.ring)
    }
}

fn parse_url_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = GatewayConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, GatewayConfig::default());
        assert_eq!(config.get_logs_timeout, Duration::from_secs(60));
        assert!(!config.repartition);
    }

    #[test]
    fn test_config_parses_url_list() {
        let config = GatewayConfig::from_lookup(lookup(&[(
            "FULLNODE_URLS",
            " http://a:8545, ,http://b:8545 ,",
        )]))
        .unwrap();
        assert_eq!(config.node_urls, vec!["http://a:8545", "http://b:8545"]);
    }

    #[test]
    fn test_config_parses_timeout_and_flag() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("GET_LOGS_TIMEOUT_MS", "1500"),
            ("HASH_RING_REPARTITION", "TRUE"),
        ]))
        .unwrap();
        assert_eq!(config.get_logs_timeout, Duration::from_millis(1500));
        assert!(config.repartition);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let err = GatewayConfig::from_lookup(lookup(&[("GET_LOGS_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = GatewayConfig::from_lookup(lookup(&[("HASH_RING_REPARTITION", "maybe")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_config_builds_cluster_manager() {
        let config = GatewayConfig {
            node_urls: vec!["http://a:8545".into(), "http://b:8545".into()],
            repartition: true,
            ..GatewayConfig::default()
        };

        let manager = config.cluster_manager();
        assert_eq!(manager.len(), 2);
        assert!(manager.distribute(b"key").is_some());
    }
}
