use dashmap::DashMap;

/// Hash a routing key the same way the manager and the ring do.
///
/// Operators use this to compute the key passed to
/// [`CachingRepartitionResolver::pin`].
#[inline]
pub fn hash_key(key: &[u8]) -> u64 {
    xxhash_rust::xxh3::xxh3_64(key)
}

/// Override that maps a hashed request key to a fixed node name.
///
/// Implementations must be safe for concurrent reads and writes on their own:
/// the manager calls `put` while only holding its shared lock.
pub trait RepartitionResolver: Send + Sync {
    /// Node name previously bound to `key`, if any.
    fn get(&self, key: u64) -> Option<String>;

    /// Bind `key` to `node_name`. Last write wins.
    fn put(&self, key: u64, node_name: String);
}

/// Resolver that never overrides the ring.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRepartitionResolver;

impl RepartitionResolver for NoopRepartitionResolver {
    fn get(&self, _key: u64) -> Option<String> {
        None
    }

    fn put(&self, _key: u64, _node_name: String) {}
}

/// Sticky resolver: once a key hash resolves to a node it stays there until
/// invalidated, regardless of later ring changes.
///
/// Entries are never evicted automatically.
#[derive(Debug, Default)]
pub struct CachingRepartitionResolver {
    entries: DashMap<u64, String>,
}

impl CachingRepartitionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force `key` onto `node_name`, replacing any cached resolution.
    pub fn pin(&self, key: u64, node_name: impl Into<String>) {
        let node_name = node_name.into();
        tracing::info!(key, node = %node_name, "Pinned routing key");
        self.entries.insert(key, node_name);
    }

    /// Drop the mapping for `key`; the next lookup goes back to the ring.
    pub fn invalidate(&self, key: u64) -> Option<String> {
        self.entries.remove(&key).map(|(_, name)| name)
    }

    /// Drop every mapping pointing at `node_name`. Returns how many were removed.
    pub fn invalidate_node(&self, node_name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, name| name != node_name);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RepartitionResolver for CachingRepartitionResolver {
    fn get(&self, key: u64) -> Option<String> {
        self.entries.get(&key).map(|name| name.value().clone())
    }

    fn put(&self, key: u64, node_name: String) {
        self.entries.insert(key, node_name);
    }
}
