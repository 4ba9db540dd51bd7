//! Aggregate utilization metrics derived from the stores.

use serde::{Deserialize, Serialize};

use crate::knowledge::KnowledgeGraph;
use crate::memory::MemoryStore;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_memories: usize,
    /// Memories with importance above the active threshold.
    pub active_memories: usize,
    /// Mean importance; 0 for an empty store.
    pub utilization_rate: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeStats {
    pub total_nodes: usize,
    /// Nodes above the trusted threshold.
    pub trusted_nodes: usize,
    /// Nodes below the review threshold (consolidation candidates).
    pub low_confidence_nodes: usize,
    /// Mean confidence; 0 for an empty graph.
    pub mean_confidence: f64,
    pub domains: usize,
}

pub fn memory_stats(store: &MemoryStore) -> MemoryStats {
    let active_threshold = store.config().active_importance;
    let total = store.len();
    let active = store
        .iter()
        .filter(|m| m.importance > active_threshold)
        .count();
    let importance_sum: f64 = store.iter().map(|m| m.importance).sum();

    MemoryStats {
        total_memories: total,
        active_memories: active,
        utilization_rate: mean(importance_sum, total),
    }
}

pub fn knowledge_stats(graph: &KnowledgeGraph) -> KnowledgeStats {
    let config = graph.config();
    let total = graph.len();
    let confidence_sum: f64 = graph.iter().map(|n| n.confidence).sum();

    KnowledgeStats {
        total_nodes: total,
        trusted_nodes: graph
            .iter()
            .filter(|n| n.confidence > config.knowledge_trusted_threshold)
            .count(),
        low_confidence_nodes: graph
            .iter()
            .filter(|n| n.confidence < config.knowledge_review_threshold)
            .count(),
        mean_confidence: mean(confidence_sum, total),
        domains: graph.domains().len(),
    }
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    sum / count as f64
}
