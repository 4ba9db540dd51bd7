//! Maintenance passes: stale pruning, near-duplicate merging, importance
//! growth for memories, and confidence-driven pruning for knowledge.
//!
//! Memory consolidation always runs prune → merge → grow, in that order.
//! Each pass works off a frozen id list taken before it starts and skips ids
//! that an earlier step in the same pass already removed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::knowledge::KnowledgeGraph;
use crate::memory::MemoryStore;
use crate::scoring::{grown_importance, is_stale};
use crate::similarity::similarity;

/// What a memory consolidation pass did.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryConsolidation {
    /// Whether utilization was high enough to run stale pruning.
    pub pruning_triggered: bool,
    pub pruned: usize,
    pub merged: usize,
    pub rescored: usize,
    pub remaining: usize,
}

/// What a knowledge consolidation pass did.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeConsolidation {
    /// Low-confidence nodes whose related concepts were inspected.
    pub examined: usize,
    /// Number of global prunes triggered.
    pub prune_passes: usize,
    pub pruned: usize,
    pub remaining: usize,
}

pub fn consolidate_memory(store: &mut MemoryStore) -> MemoryConsolidation {
    let utilization = store.stats().utilization_rate;
    let pruning_triggered = utilization > store.config().utilization_trigger;

    let pruned = if pruning_triggered {
        prune_stale(store)
    } else {
        0
    };
    let merged = merge_similar(store);
    let rescored = grow_importance(store);

    let report = MemoryConsolidation {
        pruning_triggered,
        pruned,
        merged,
        rescored,
        remaining: store.len(),
    };
    tracing::debug!(
        utilization,
        pruned = report.pruned,
        merged = report.merged,
        remaining = report.remaining,
        "memory consolidation complete"
    );
    report
}

/// Remove unimportant memories that are old or rarely reinforced.
pub fn prune_stale(store: &mut MemoryStore) -> usize {
    let now = store.now();
    let config = store.config().clone();
    store.remove_where(|m| is_stale(m, now, &config))
}

/// Fuse every pair of memories whose patterns are more similar than the
/// merge threshold. The earlier-inserted memory absorbs the later one:
/// frequencies add, importance takes the max, access time is refreshed.
///
/// Returns the number of memories absorbed.
pub fn merge_similar(store: &mut MemoryStore) -> usize {
    let threshold = store.config().merge_threshold;
    let now = store.now();
    let snapshot = store.ids();
    let mut absorbed: Vec<Uuid> = Vec::new();

    for (i, &keep_id) in snapshot.iter().enumerate() {
        if absorbed.contains(&keep_id) {
            continue;
        }
        for &other_id in &snapshot[i + 1..] {
            if absorbed.contains(&other_id) {
                continue;
            }
            let (Some(keep), Some(other)) = (store.get(keep_id), store.get(other_id)) else {
                continue;
            };
            if similarity(&keep.pattern, &other.pattern) <= threshold {
                continue;
            }

            let (other_frequency, other_importance) = (other.frequency, other.importance);
            if let Some(keep) = store.get_mut(keep_id) {
                keep.frequency = keep.frequency.saturating_add(other_frequency);
                keep.importance = keep.importance.max(other_importance);
                keep.last_accessed = now;
            }
            absorbed.push(other_id);
            tracing::debug!(%keep_id, %other_id, "merged similar memories");
        }
    }

    store.remove_many(&absorbed)
}

/// Apply importance growth to every memory. Returns the number rescored.
pub fn grow_importance(store: &mut MemoryStore) -> usize {
    let mut rescored = 0;
    for memory in store.iter_mut() {
        memory.importance = grown_importance(memory.importance, memory.frequency);
        rescored += 1;
    }
    rescored
}

/// Review low-confidence nodes, most recently updated first. When any of a
/// reviewed node's related concepts is trusted, prune the whole graph at the
/// knowledge prune threshold.
///
/// The prune is graph-wide, not scoped to the reviewed node, and can run once
/// per reviewed node.
pub fn consolidate_knowledge(graph: &mut KnowledgeGraph) -> KnowledgeConsolidation {
    let config = graph.config().clone();
    let candidates = graph.low_confidence_ids(config.knowledge_review_threshold);

    let mut report = KnowledgeConsolidation::default();
    for id in candidates {
        let Some(node) = graph.get(id) else {
            continue;
        };
        report.examined += 1;

        let concept = node.concept.clone();
        let trusted_neighbor = graph
            .find_related_concepts(&concept)
            .iter()
            .any(|n| n.confidence > config.knowledge_trusted_threshold);

        if trusted_neighbor {
            report.prune_passes += 1;
            report.pruned += graph.prune_nodes(config.knowledge_prune_threshold);
        }
    }

    report.remaining = graph.len();
    tracing::debug!(
        examined = report.examined,
        pruned = report.pruned,
        remaining = report.remaining,
        "knowledge consolidation complete"
    );
    report
}
