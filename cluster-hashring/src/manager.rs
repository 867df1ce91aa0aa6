use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::node::{node_name, Node};
use crate::resolver::{hash_key, NoopRepartitionResolver, RepartitionResolver};
use crate::ring::HashRing;
use crate::RingConfig;

/// Picks a backend URL for a request key.
///
/// Returns an empty string when no backend is available.
pub trait Router: Send + Sync {
    fn route(&self, key: &[u8]) -> String;
}

struct Inner {
    nodes: HashMap<String, Arc<Node>>,
    ring: HashRing<Node>,
    epochs: HashMap<String, u64>,
    mid_epoch: u64,
}

impl Inner {
    fn recompute_mid_epoch(&mut self) {
        let mut epochs: Vec<u64> = self.epochs.values().copied().collect();
        epochs.sort_unstable();
        self.mid_epoch = epochs.get(epochs.len() / 2).copied().unwrap_or(0);
    }
}

/// Manages the full node cluster and routes requests across it by
/// consistent hashing.
///
/// The node map and the hash ring are always updated together under one
/// write lock, so a key never resolves to a name missing from the map.
/// The resolver synchronizes itself and is written under the read lock.
pub struct ClusterManager {
    inner: RwLock<Inner>,
    resolver: Arc<dyn RepartitionResolver>,
}

impl ClusterManager {
    /// Create a manager without repartition overrides.
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_repartition(
            urls,
            Arc::new(NoopRepartitionResolver),
            RingConfig::default(),
        )
    }

    pub fn with_repartition<I, S>(
        urls: I,
        resolver: Arc<dyn RepartitionResolver>,
        ring_config: RingConfig,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut nodes = HashMap::new();
        let mut ring = HashRing::new(ring_config.virtual_nodes);

        for url in urls {
            let name = node_name(url.as_ref());
            if nodes.contains_key(&name) {
                continue;
            }
            let node = Arc::new(Node::new(url.as_ref()));
            ring.add(node.clone());
            nodes.insert(name, node);
        }

        tracing::info!(
            nodes = nodes.len(),
            virtual_nodes = ring_config.virtual_nodes,
            "ClusterManager initialized"
        );

        Self {
            inner: RwLock::new(Inner {
                nodes,
                ring,
                epochs: HashMap::new(),
                mid_epoch: 0,
            }),
            resolver,
        }
    }

    /// Add a node. No-op if a node with the same name is already managed.
    pub fn add(&self, url: &str) {
        let name = node_name(url);
        let mut inner = self.inner.write();

        if inner.nodes.contains_key(&name) {
            return;
        }

        let node = Arc::new(Node::new(url));
        inner.ring.add(node.clone());
        inner.nodes.insert(name.clone(), node);

        tracing::info!(node = %name, total = inner.nodes.len(), "Node added to cluster");
    }

    /// Remove a node and release its resources. No-op if absent.
    pub fn remove(&self, url: &str) {
        let name = node_name(url);
        let mut inner = self.inner.write();

        let Some(node) = inner.nodes.remove(&name) else {
            return;
        };

        node.close();
        inner.ring.remove(&name);
        if inner.epochs.remove(&name).is_some() {
            inner.recompute_mid_epoch();
        }

        tracing::info!(node = %name, total = inner.nodes.len(), "Node removed from cluster");
    }

    pub fn get(&self, url: &str) -> Option<Arc<Node>> {
        let name = node_name(url);
        self.inner.read().nodes.get(&name).cloned()
    }

    /// Snapshot of the managed nodes, in no particular order.
    pub fn list(&self) -> Vec<Arc<Node>> {
        self.inner.read().nodes.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().nodes.is_empty()
    }

    /// Pick the node responsible for `key`.
    ///
    /// A resolver mapping for the key's hash wins over the ring. It may name a
    /// node that has since been removed, in which case `None` is returned.
    pub fn distribute(&self, key: &[u8]) -> Option<Arc<Node>> {
        let hash = hash_key(key);
        let inner = self.inner.read();

        if let Some(name) = self.resolver.get(hash) {
            tracing::trace!(hash, node = %name, "Routed by repartition resolver");
            return inner.nodes.get(&name).cloned();
        }

        let node = inner.ring.locate_key(key)?.clone();
        self.resolver.put(hash, node.name().to_string());

        tracing::trace!(hash, node = %node.name(), "Routed by hash ring");
        Some(node)
    }

    /// Record the latest epoch observed on a node. Ignored for unknown nodes.
    pub fn report_epoch(&self, url: &str, epoch: u64) {
        let name = node_name(url);
        let mut inner = self.inner.write();

        if !inner.nodes.contains_key(&name) {
            tracing::debug!(node = %name, epoch, "Epoch reported for unmanaged node");
            return;
        }

        inner.epochs.insert(name, epoch);
        inner.recompute_mid_epoch();
    }

    pub fn node_epoch(&self, url: &str) -> Option<u64> {
        let name = node_name(url);
        self.inner.read().epochs.get(&name).copied()
    }

    /// Median epoch across nodes that have reported one, or 0 if none have.
    pub fn mid_epoch(&self) -> u64 {
        self.inner.read().mid_epoch
    }
}

impl Router for ClusterManager {
    fn route(&self, key: &[u8]) -> String {
        self.distribute(key)
            .map(|node| node.url().to_string())
            .unwrap_or_default()
    }
}

impl fmt::Display for ClusterManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        let names: Vec<&str> = inner.nodes.keys().map(String::as_str).collect();
        write!(f, "{}", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CachingRepartitionResolver;
    use std::collections::HashSet;

    fn names(manager: &ClusterManager) -> HashSet<String> {
        manager.list().iter().map(|n| n.name().to_string()).collect()
    }

    #[test]
    fn test_manager_new_deduplicates_urls() {
        let manager = ClusterManager::new(["http://a:1", "HTTP://A:1/", "http://b:1"]);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_manager_add_is_idempotent() {
        let manager = ClusterManager::new(Vec::<String>::new());
        manager.add("http://a:1");
        let first = manager.get("http://a:1").unwrap();

        manager.add("http://a:1");

        assert_eq!(manager.len(), 1);
        assert!(Arc::ptr_eq(&first, &manager.get("http://a:1").unwrap()));
    }

    #[test]
    fn test_manager_remove_is_idempotent() {
        let manager = ClusterManager::new(["http://a:1"]);
        manager.remove("http://b:1");
        assert_eq!(manager.len(), 1);

        manager.remove("http://a:1");
        manager.remove("http://a:1");
        assert!(manager.is_empty());
    }

    #[test]
    fn test_manager_remove_closes_node() {
        let manager = ClusterManager::new(["http://a:1"]);
        let node = manager.get("http://a:1").unwrap();

        manager.remove("http://a:1");

        assert!(node.is_closed());
        assert!(manager.get("http://a:1").is_none());
    }

    #[test]
    fn test_manager_add_then_remove_restores_list() {
        let manager = ClusterManager::new(["http://a:1", "http://b:1"]);
        let before = names(&manager);

        manager.add("http://c:1");
        manager.remove("http://c:1");

        assert_eq!(names(&manager), before);
    }

    #[test]
    fn test_manager_empty_cluster_routes_nowhere() {
        let manager = ClusterManager::new(Vec::<String>::new());
        assert!(manager.distribute(b"key").is_none());
        assert_eq!(manager.route(b"key"), "");
    }

    #[test]
    fn test_manager_distribute_is_deterministic() {
        let manager = ClusterManager::new(["http://a:1", "http://b:1", "http://c:1"]);

        for i in 0..100 {
            let key = format!("key-{}", i);
            let first = manager.distribute(key.as_bytes()).unwrap();
            for _ in 0..5 {
                let again = manager.distribute(key.as_bytes()).unwrap();
                assert_eq!(again.name(), first.name());
            }
        }
    }

    #[test]
    fn test_manager_route_returns_node_url() {
        let manager = ClusterManager::new(["http://solo:8545"]);
        assert_eq!(manager.route(b"anything"), "http://solo:8545");
    }

    #[test]
    fn test_manager_resolver_mapping_wins_over_ring() {
        let resolver = Arc::new(CachingRepartitionResolver::new());
        let manager = ClusterManager::with_repartition(
            ["http://a:1", "http://b:1"],
            resolver.clone(),
            RingConfig::default(),
        );

        let key = b"pinned-key";
        let ring_choice = manager.distribute(key).unwrap();
        let other = if ring_choice.name() == "http://a:1" {
            "http://b:1"
        } else {
            "http://a:1"
        };

        resolver.pin(hash_key(key), other);

        assert_eq!(manager.distribute(key).unwrap().name(), other);
    }

    #[test]
    fn test_manager_cached_mapping_survives_ring_change() {
        let resolver = Arc::new(CachingRepartitionResolver::new());
        let manager = ClusterManager::with_repartition(
            ["http://a:1"],
            resolver.clone(),
            RingConfig::default(),
        );

        let keys: Vec<String> = (0..200).map(|i| format!("key-{}", i)).collect();
        for key in &keys {
            assert_eq!(manager.route(key.as_bytes()), "http://a:1");
        }

        manager.add("http://b:1");
        manager.add("http://c:1");

        for key in &keys {
            assert_eq!(manager.route(key.as_bytes()), "http://a:1");
        }
        assert_eq!(resolver.len(), keys.len());
    }

    #[test]
    fn test_manager_cached_mapping_to_removed_node_yields_none() {
        let resolver = Arc::new(CachingRepartitionResolver::new());
        let manager = ClusterManager::with_repartition(
            ["http://a:1", "http://b:1"],
            resolver,
            RingConfig::default(),
        );

        let owner = manager.distribute(b"key").unwrap();
        manager.remove(owner.url());

        assert!(manager.distribute(b"key").is_none());
        assert_eq!(manager.route(b"key"), "");
    }

    #[test]
    fn test_manager_mid_epoch_is_median() {
        let manager = ClusterManager::new(["http://a:1", "http://b:1", "http://c:1"]);
        assert_eq!(manager.mid_epoch(), 0);

        manager.report_epoch("http://a:1", 100);
        manager.report_epoch("http://b:1", 300);
        manager.report_epoch("http://c:1", 200);
        assert_eq!(manager.mid_epoch(), 200);

        manager.remove("http://c:1");
        assert_eq!(manager.node_epoch("http://c:1"), None);
        assert_eq!(manager.mid_epoch(), 300);
    }

    #[test]
    fn test_manager_report_epoch_ignores_unknown_node() {
        let manager = ClusterManager::new(["http://a:1"]);
        manager.report_epoch("http://zzz:1", 42);
        assert_eq!(manager.node_epoch("http://zzz:1"), None);
        assert_eq!(manager.mid_epoch(), 0);
    }

    #[test]
    fn test_manager_display_lists_names() {
        let manager = ClusterManager::new(["http://a:1", "http://b:1"]);
        let dump = manager.to_string();
        assert!(dump.contains("http://a:1"));
        assert!(dump.contains("http://b:1"));
        assert!(ClusterManager::new(Vec::<String>::new()).to_string().is_empty());
    }
}
