//! Adaptive memory engine.
//!
//! Keeps a bounded store of learned patterns ([`Memory`]) and a graph of
//! learned concepts ([`KnowledgeNode`]). Memories are reinforced when
//! retrieved, fused when near-duplicate, grown in importance by
//! consolidation, and evicted by score once the store is full. Concepts carry
//! a clamped confidence that callers nudge with success/failure signals.
//!
//! Zero I/O: in-memory data structures with no opinions about transport or
//! persistence.

pub mod config;
pub mod consolidate;
pub mod constants;
pub mod engine;
pub mod knowledge;
pub mod memory;
pub mod scoring;
pub mod similarity;
pub mod stats;
pub mod time;

pub use config::{ConfigError, EngineConfig};
pub use consolidate::{
    KnowledgeConsolidation, MemoryConsolidation, consolidate_knowledge, consolidate_memory,
};
pub use constants::{CAPACITY, MERGE_THRESHOLD, PRUNE_THRESHOLD, RETRIEVE_LIMIT};
pub use engine::Engine;
pub use knowledge::{KnowledgeGraph, KnowledgeNode, NodeUpdate, Relationships};
pub use memory::{Memory, MemoryStore};
pub use similarity::{edit_distance, similarity};
pub use stats::{KnowledgeStats, MemoryStats};
pub use time::{Clock, ManualClock, SharedClock, SystemClock, unix_millis_to_iso8601};
