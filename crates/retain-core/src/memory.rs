use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::scoring::eviction_score;
use crate::stats::{MemoryStats, memory_stats};
use crate::time::{SharedClock, system_clock};

/// A learned behavioral pattern with reinforcement-based scoring.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub pattern: String,
    pub frequency: u32,
    pub importance: f64,
    /// Unix milliseconds of the last reinforcement.
    pub last_accessed: u64,
    /// Related record ids. Nothing links memories yet; kept so the shape is stable.
    pub connections: Vec<Uuid>,
}

impl Memory {
    pub fn new(pattern: String, importance: f64, now: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            pattern,
            frequency: 1,
            importance,
            last_accessed: now,
            connections: Vec::new(),
        }
    }

    /// One more observation: bump frequency and refresh the access time.
    pub fn reinforce(&mut self, now: u64) {
        self.frequency = self.frequency.saturating_add(1);
        self.last_accessed = now;
    }

    pub fn eviction_score(&self) -> f64 {
        eviction_score(self.importance, self.frequency)
    }
}

/// Capacity-bounded memory collection.
///
/// Records live in a vec in insertion order, which is the tie-breaker for
/// every ordering the store produces. `index` maps ids to vec positions and
/// is rebuilt after any removal.
#[derive(Debug)]
pub struct MemoryStore {
    records: Vec<Memory>,
    index: HashMap<Uuid, usize>,
    config: EngineConfig,
    clock: SharedClock,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(EngineConfig::default(), system_clock())
    }
}

impl MemoryStore {
    pub fn new(config: EngineConfig, clock: SharedClock) -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> u64 {
        self.clock.now_millis()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Memory> {
        self.index.get(&id).map(|&pos| &self.records[pos])
    }

    pub(crate) fn get_mut(&mut self, id: Uuid) -> Option<&mut Memory> {
        self.index.get(&id).map(|&pos| &mut self.records[pos])
    }

    /// All memories in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Memory> {
        self.records.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Memory> {
        self.records.iter_mut()
    }

    /// Ids in insertion order. Consolidation iterates this frozen list.
    pub fn ids(&self) -> Vec<Uuid> {
        self.records.iter().map(|m| m.id).collect()
    }

    /// Store a new pattern and enforce capacity before returning.
    ///
    /// If the new record is itself the lowest scorer in an over-full store it
    /// is evicted immediately, so the returned id may already be gone.
    pub fn insert(&mut self, pattern: &str, importance: f64) -> Uuid {
        let mut memory = Memory::new(pattern.to_string(), importance, self.now());
        while self.index.contains_key(&memory.id) {
            memory.id = Uuid::new_v4();
        }

        let id = memory.id;
        self.index.insert(id, self.records.len());
        self.records.push(memory);

        let evicted = self.enforce_capacity();
        if evicted > 0 {
            tracing::debug!(evicted, capacity = self.config.capacity, "memory capacity enforced");
        }
        id
    }

    /// Insert with the configured default importance.
    pub fn insert_default(&mut self, pattern: &str) -> Uuid {
        let importance = self.config.default_importance;
        self.insert(pattern, importance)
    }

    /// Drop the lowest-scoring memories until the store fits its capacity.
    /// Equal scores evict the oldest insertion first. Returns the number evicted.
    pub fn enforce_capacity(&mut self) -> usize {
        let capacity = self.config.capacity;
        if self.records.len() <= capacity {
            return 0;
        }

        let excess = self.records.len() - capacity;
        let mut order: Vec<usize> = (0..self.records.len()).collect();
        order.sort_by(|&a, &b| {
            self.records[a]
                .eviction_score()
                .total_cmp(&self.records[b].eviction_score())
        });

        let doomed: Vec<Uuid> = order[..excess]
            .iter()
            .map(|&pos| self.records[pos].id)
            .collect();
        self.remove_many(&doomed)
    }

    /// Matching memories, best first, without touching them.
    pub fn peek_relevant(&self, needle: &str) -> Vec<Memory> {
        self.ranked_positions(needle)
            .into_iter()
            .map(|pos| self.records[pos].clone())
            .collect()
    }

    /// Matching memories, best first, reinforcing each one returned.
    ///
    /// This is a write: every returned memory gains one frequency and has its
    /// access time refreshed. Returned copies reflect the reinforced state.
    pub fn retrieve_relevant(&mut self, needle: &str) -> Vec<Memory> {
        let now = self.now();
        self.ranked_positions(needle)
            .into_iter()
            .map(|pos| {
                let memory = &mut self.records[pos];
                memory.reinforce(now);
                memory.clone()
            })
            .collect()
    }

    fn ranked_positions(&self, needle: &str) -> Vec<usize> {
        let mut positions: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, m)| m.pattern.contains(needle))
            .map(|(pos, _)| pos)
            .collect();

        // Stable sort keeps insertion order between equal scores.
        positions.sort_by(|&a, &b| {
            self.records[b]
                .eviction_score()
                .total_cmp(&self.records[a].eviction_score())
        });
        positions.truncate(self.config.retrieve_limit);
        positions
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Memory> {
        let pos = self.index.get(&id).copied()?;
        let memory = self.records.remove(pos);
        self.rebuild_index();
        Some(memory)
    }

    pub(crate) fn remove_many(&mut self, ids: &[Uuid]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let doomed: std::collections::HashSet<Uuid> = ids.iter().copied().collect();
        let before = self.records.len();
        self.records.retain(|m| !doomed.contains(&m.id));
        self.rebuild_index();
        before - self.records.len()
    }

    /// Remove every memory matching `predicate`. Returns the number removed.
    pub(crate) fn remove_where(&mut self, mut predicate: impl FnMut(&Memory) -> bool) -> usize {
        let before = self.records.len();
        self.records.retain(|m| !predicate(m));
        if self.records.len() != before {
            self.rebuild_index();
        }
        before - self.records.len()
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (pos, memory) in self.records.iter().enumerate() {
            self.index.insert(memory.id, pos);
        }
    }

    pub fn stats(&self) -> MemoryStats {
        memory_stats(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;
    use std::sync::Arc;
    use std::time::Duration;

    fn store_with_capacity(capacity: usize) -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let config = EngineConfig {
            capacity,
            ..Default::default()
        };
        (MemoryStore::new(config, clock.clone()), clock)
    }

    #[test]
    fn test_insert_defaults() {
        let (mut store, _) = store_with_capacity(10);
        let id = store.insert_default("timeout on connect");
        let m = store.get(id).unwrap();
        assert_eq!(m.pattern, "timeout on connect");
        assert_eq!(m.frequency, 1);
        assert_eq!(m.importance, 0.5);
        assert_eq!(m.last_accessed, 1_000);
        assert!(m.connections.is_empty());
    }

    #[test]
    fn test_insert_ids_unique() {
        let (mut store, _) = store_with_capacity(500);
        let ids: std::collections::HashSet<Uuid> =
            (0..200).map(|i| store.insert(&format!("p{i}"), 0.5)).collect();
        assert_eq!(ids.len(), 200);
        assert_eq!(store.len(), 200);
    }

    #[test]
    fn test_capacity_evicts_lowest_score() {
        let (mut store, _) = store_with_capacity(3);
        let low = store.insert("low", 0.1);
        let mid = store.insert("mid", 0.5);
        let high = store.insert("high", 0.9);
        let top = store.insert("top", 0.7);

        assert_eq!(store.len(), 3);
        assert!(!store.contains(low));
        assert!(store.contains(mid));
        assert!(store.contains(high));
        assert!(store.contains(top));
    }

    #[test]
    fn test_capacity_tie_evicts_oldest() {
        let (mut store, _) = store_with_capacity(2);
        let first = store.insert("a", 0.5);
        let second = store.insert("b", 0.5);
        let third = store.insert("c", 0.5);

        assert!(!store.contains(first));
        assert!(store.contains(second));
        assert!(store.contains(third));
    }

    #[test]
    fn test_insert_can_evict_itself() {
        let (mut store, _) = store_with_capacity(1);
        let keeper = store.insert("keeper", 0.9);
        let newcomer = store.insert("newcomer", 0.1);
        assert!(store.contains(keeper));
        assert!(!store.contains(newcomer));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_retrieve_orders_and_reinforces() {
        let (mut store, clock) = store_with_capacity(10);
        let a = store.insert("db error timeout", 0.2);
        let b = store.insert("db error refused", 0.9);
        let _c = store.insert("cache miss", 0.9);

        clock.advance(Duration::from_secs(60));
        let found = store.retrieve_relevant("error");

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, b);
        assert_eq!(found[1].id, a);
        assert_eq!(found[0].frequency, 2);
        assert_eq!(store.get(a).unwrap().frequency, 2);
        assert_eq!(store.get(a).unwrap().last_accessed, 61_000);
    }

    #[test]
    fn test_retrieve_ties_keep_insertion_order() {
        let (mut store, _) = store_with_capacity(10);
        let first = store.insert("err one", 0.5);
        let second = store.insert("err two", 0.5);
        let found = store.peek_relevant("err");
        assert_eq!(found[0].id, first);
        assert_eq!(found[1].id, second);
    }

    #[test]
    fn test_retrieve_limit() {
        let (mut store, _) = store_with_capacity(100);
        for i in 0..25 {
            store.insert(&format!("warn {i}"), 0.5);
        }
        let found = store.retrieve_relevant("warn");
        assert_eq!(found.len(), 10);

        let reinforced = store.iter().filter(|m| m.frequency == 2).count();
        assert_eq!(reinforced, 10);
    }

    #[test]
    fn test_peek_does_not_mutate() {
        let (mut store, clock) = store_with_capacity(10);
        let id = store.insert("panic in handler", 0.5);
        clock.advance(Duration::from_secs(5));

        let found = store.peek_relevant("panic");
        assert_eq!(found.len(), 1);
        let m = store.get(id).unwrap();
        assert_eq!(m.frequency, 1);
        assert_eq!(m.last_accessed, 1_000);
    }

    #[test]
    fn test_retrieve_no_match() {
        let (mut store, _) = store_with_capacity(10);
        store.insert("alpha", 0.5);
        assert!(store.retrieve_relevant("omega").is_empty());
    }

    #[test]
    fn test_remove_keeps_index_consistent() {
        let (mut store, _) = store_with_capacity(10);
        let a = store.insert("a", 0.5);
        let b = store.insert("b", 0.5);
        let c = store.insert("c", 0.5);

        assert_eq!(store.remove(a).unwrap().pattern, "a");
        assert!(store.remove(a).is_none());
        assert_eq!(store.get(b).unwrap().pattern, "b");
        assert_eq!(store.get(c).unwrap().pattern, "c");
        assert_eq!(store.ids(), vec![b, c]);
    }
}
