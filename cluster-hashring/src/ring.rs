use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::resolver::hash_key;

/// Anything that can live on the ring. The name must be stable for the
/// lifetime of the member; it is the identity used for removal.
pub trait Member: Send + Sync {
    fn name(&self) -> &str;
}

/// Consistent hash ring with virtual nodes.
///
/// Each member is placed on the ring at `virtual_nodes` points. A key belongs
/// to the first point at or after its hash, wrapping around. Adding or
/// removing a member only moves keys owned by that member's points.
pub struct HashRing<M> {
    points: BTreeMap<u64, Arc<M>>,
    /// Members whose point collided with a smaller-named owner.
    shadowed: HashMap<u64, Vec<Arc<M>>>,
    members: HashMap<String, Arc<M>>,
    virtual_nodes: usize,
}

impl<M: Member> HashRing<M> {
    pub fn new(virtual_nodes: usize) -> Self {
        Self {
            points: BTreeMap::new(),
            shadowed: HashMap::new(),
            members: HashMap::new(),
            virtual_nodes: virtual_nodes.max(1),
        }
    }

    /// Build a ring from an initial member set. Duplicate names keep the first.
    pub fn with_members(members: impl IntoIterator<Item = Arc<M>>, virtual_nodes: usize) -> Self {
        let mut ring = Self::new(virtual_nodes);
        for member in members {
            ring.add(member);
        }
        ring
    }

    /// Add a member. Returns `false` if a member with the same name exists.
    pub fn add(&mut self, member: Arc<M>) -> bool {
        let name = member.name().to_string();
        if self.members.contains_key(&name) {
            return false;
        }

        for i in 0..self.virtual_nodes {
            self.place(Self::point_hash(&name, i), member.clone());
        }

        self.members.insert(name, member);
        true
    }

    /// Remove a member by name. Returns `false` if it was not present.
    pub fn remove(&mut self, name: &str) -> bool {
        if self.members.remove(name).is_none() {
            return false;
        }

        for i in 0..self.virtual_nodes {
            self.unplace(Self::point_hash(name, i), name);
        }
        true
    }

    /// Claim `point` for `member`. On a collision the smaller name owns the
    /// point and the other waits in `shadowed`, so the result never depends
    /// on insertion order.
    fn place(&mut self, point: u64, member: Arc<M>) {
        let existing_wins = self
            .points
            .get(&point)
            .map(|owner| owner.name() <= member.name());
        let loser = match existing_wins {
            Some(true) => member,
            _ => match self.points.insert(point, member) {
                Some(previous) => previous,
                None => return,
            },
        };
        self.shadowed.entry(point).or_default().push(loser);
    }

    /// Release `name`'s claim on `point`, handing it to the smallest
    /// shadowed member if there is one.
    fn unplace(&mut self, point: u64, name: &str) {
        let owns = self.points.get(&point).is_some_and(|owner| owner.name() == name);
        if !owns {
            if let Some(waiting) = self.shadowed.get_mut(&point) {
                waiting.retain(|m| m.name() != name);
                if waiting.is_empty() {
                    self.shadowed.remove(&point);
                }
            }
            return;
        }

        self.points.remove(&point);
        let Some(mut waiting) = self.shadowed.remove(&point) else {
            return;
        };
        waiting.sort_by(|a, b| a.name().cmp(b.name()));
        let next = waiting.remove(0);
        self.points.insert(point, next);
        if !waiting.is_empty() {
            self.shadowed.insert(point, waiting);
        }
    }

    /// Find the member owning `key`, or `None` when the ring is empty.
    pub fn locate_key(&self, key: &[u8]) -> Option<&Arc<M>> {
        let hash = hash_key(key);
        self.points
            .range(hash..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, member)| member)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<M>> {
        self.members.get(name)
    }

    /// Number of members in the ring.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> impl Iterator<Item = &Arc<M>> {
        self.members.values()
    }

    pub fn virtual_nodes(&self) -> usize {
        self.virtual_nodes
    }

    #[inline]
    fn point_hash(name: &str, replica: usize) -> u64 {
        hash_key(format!("{}#{}", name, replica).as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestMember(String);

    impl Member for TestMember {
        fn name(&self) -> &str {
            &self.0
        }
    }

    fn member(name: &str) -> Arc<TestMember> {
        Arc::new(TestMember(name.to_string()))
    }

    fn owner(ring: &HashRing<TestMember>, key: &str) -> Option<String> {
        ring.locate_key(key.as_bytes()).map(|m| m.name().to_string())
    }

    #[test]
    fn test_hashring_empty_ring_locates_nothing() {
        let ring: HashRing<TestMember> = HashRing::new(16);
        assert!(ring.locate_key(b"any-key").is_none());
        assert!(ring.is_empty());
    }

    #[test]
    fn test_hashring_solo_member_owns_all() {
        let ring = HashRing::with_members([member("node-1")], 16);
        for i in 0..100 {
            assert_eq!(owner(&ring, &format!("key-{}", i)).as_deref(), Some("node-1"));
        }
    }

    #[test]
    fn test_hashring_add_duplicate_is_rejected() {
        let mut ring = HashRing::new(16);
        assert!(ring.add(member("node-1")));
        assert!(!ring.add(member("node-1")));
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn test_hashring_remove_unknown_is_noop() {
        let mut ring = HashRing::with_members([member("node-1")], 16);
        assert!(!ring.remove("node-2"));
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn test_hashring_remove_last_member_empties_ring() {
        let mut ring = HashRing::with_members([member("node-1")], 16);
        assert!(ring.remove("node-1"));
        assert!(ring.locate_key(b"key").is_none());
    }

    #[test]
    fn test_hashring_incremental_equals_full_rebuild() {
        let mut ring1 = HashRing::with_members([member("node-1"), member("node-2")], 64);
        ring1.add(member("node-3"));
        ring1.remove("node-2");

        let ring2 = HashRing::with_members([member("node-3"), member("node-1")], 64);

        for i in 0..1000 {
            let key = format!("key-{}", i);
            assert_eq!(
                owner(&ring1, &key),
                owner(&ring2, &key),
                "Key {} should have same owner in both rings",
                key
            );
        }
    }

    #[test]
    fn test_hashring_two_members_split_work() {
        let ring = HashRing::with_members([member("node-1"), member("node-2")], 160);

        let mut handled_by_1 = 0;
        for i in 0..1000 {
            if owner(&ring, &format!("key-{}", i)).as_deref() == Some("node-1") {
                handled_by_1 += 1;
            }
        }

        assert!(
            handled_by_1 > 350 && handled_by_1 < 650,
            "node-1 should own ~50% of keys, got {}",
            handled_by_1
        );
    }

    #[test]
    fn test_hashring_consistent_assignment() {
        let ring = HashRing::with_members(
            [member("node-1"), member("node-2"), member("node-3")],
            64,
        );

        let first = owner(&ring, "test-key-abc");
        for _ in 0..10 {
            assert_eq!(owner(&ring, "test-key-abc"), first);
        }
    }

    #[test]
    fn test_hashring_remove_only_moves_removed_members_keys() {
        let mut ring = HashRing::with_members(
            [
                member("node-1"),
                member("node-2"),
                member("node-3"),
                member("node-4"),
            ],
            64,
        );

        let before: Vec<_> = (0..1000)
            .map(|i| owner(&ring, &format!("key-{}", i)))
            .collect();

        ring.remove("node-3");

        for (i, prev) in before.iter().enumerate() {
            let now = owner(&ring, &format!("key-{}", i));
            if prev.as_deref() != Some("node-3") {
                assert_eq!(&now, prev, "key-{} moved although its owner stayed", i);
            } else {
                assert_ne!(now.as_deref(), Some("node-3"));
            }
        }
    }

    fn point_owner(ring: &HashRing<TestMember>, point: u64) -> Option<&str> {
        ring.points.get(&point).map(|m| m.name())
    }

    #[test]
    fn test_hashring_collision_goes_to_smaller_name() {
        let mut ring = HashRing::new(1);
        ring.place(42, member("node-b"));
        ring.place(42, member("node-a"));
        assert_eq!(point_owner(&ring, 42), Some("node-a"));

        let mut ring = HashRing::new(1);
        ring.place(42, member("node-a"));
        ring.place(42, member("node-b"));
        assert_eq!(point_owner(&ring, 42), Some("node-a"));
    }

    #[test]
    fn test_hashring_collision_survivor_keeps_point_after_removal() {
        let mut ring = HashRing::new(1);
        ring.place(42, member("node-b"));
        ring.place(42, member("node-a"));
        ring.place(42, member("node-c"));

        ring.unplace(42, "node-a");
        assert_eq!(point_owner(&ring, 42), Some("node-b"));

        ring.unplace(42, "node-c");
        assert_eq!(point_owner(&ring, 42), Some("node-b"));
        assert!(ring.shadowed.is_empty());

        ring.unplace(42, "node-b");
        assert_eq!(point_owner(&ring, 42), None);
    }
}
