use crate::config::{EngineConfig, Result};
use crate::consolidate::{
    KnowledgeConsolidation, MemoryConsolidation, consolidate_knowledge, consolidate_memory,
};
use crate::knowledge::KnowledgeGraph;
use crate::memory::MemoryStore;
use crate::time::{SharedClock, system_clock};

/// Owns one memory store and one knowledge graph sharing a config and clock.
///
/// Every mutating call takes `&mut self`; callers that share an engine across
/// tasks put it behind a single lock.
#[derive(Debug, Default)]
pub struct Engine {
    pub memories: MemoryStore,
    pub knowledge: KnowledgeGraph,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: EngineConfig, clock: SharedClock) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            memories: MemoryStore::new(config.clone(), clock.clone()),
            knowledge: KnowledgeGraph::new(config, clock),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        self.memories.config()
    }

    pub fn consolidate_memory(&mut self) -> MemoryConsolidation {
        consolidate_memory(&mut self.memories)
    }

    pub fn consolidate_knowledge(&mut self) -> KnowledgeConsolidation {
        consolidate_knowledge(&mut self.knowledge)
    }

    /// Memory pass followed by knowledge pass.
    pub fn consolidate_all(&mut self) -> (MemoryConsolidation, KnowledgeConsolidation) {
        (self.consolidate_memory(), self.consolidate_knowledge())
    }
}
