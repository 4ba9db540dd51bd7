use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::scoring::{clamp_confidence, stepped_confidence};
use crate::stats::{KnowledgeStats, knowledge_stats};
use crate::time::{SharedClock, system_clock};

/// Named attributes attached to a concept, e.g. `domain`.
pub type Relationships = BTreeMap<String, serde_json::Value>;

/// A learned concept with a bounded confidence weight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub id: Uuid,
    pub concept: String,
    pub relationships: Relationships,
    /// Always within [0, 1].
    pub confidence: f64,
    /// Unix milliseconds of the last write.
    pub last_updated: u64,
}

impl KnowledgeNode {
    pub fn new(concept: String, relationships: Relationships, confidence: f64, now: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            concept,
            relationships,
            confidence: clamp_confidence(confidence),
            last_updated: now,
        }
    }

    /// The `domain` relationship, when it is a string.
    pub fn domain(&self) -> Option<&str> {
        self.relationships.get("domain").and_then(|v| v.as_str())
    }

    /// Relationships rendered as JSON, the text that related-concept lookups search.
    pub fn relationships_json(&self) -> String {
        serde_json::to_string(&self.relationships).unwrap_or_default()
    }
}

/// Partial update for a knowledge node. `None` fields are left alone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeUpdate {
    pub concept: Option<String>,
    pub relationships: Option<Relationships>,
    pub confidence: Option<f64>,
}

/// Concept collection with confidence scoring.
///
/// Same layout as [`crate::MemoryStore`]: insertion-ordered vec plus an id
/// index rebuilt on removal.
#[derive(Debug)]
pub struct KnowledgeGraph {
    nodes: Vec<KnowledgeNode>,
    index: HashMap<Uuid, usize>,
    config: EngineConfig,
    clock: SharedClock,
}

impl Default for KnowledgeGraph {
    fn default() -> Self {
        Self::new(EngineConfig::default(), system_clock())
    }
}

impl KnowledgeGraph {
    pub fn new(config: EngineConfig, clock: SharedClock) -> Self {
        Self {
            nodes: Vec::new(),
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
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<&KnowledgeNode> {
        self.index.get(&id).map(|&pos| &self.nodes[pos])
    }

    fn get_mut(&mut self, id: Uuid) -> Option<&mut KnowledgeNode> {
        self.index.get(&id).map(|&pos| &mut self.nodes[pos])
    }

    /// All nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &KnowledgeNode> {
        self.nodes.iter()
    }

    pub fn add_node(&mut self, concept: &str, relationships: Relationships) -> Uuid {
        let mut node = KnowledgeNode::new(
            concept.to_string(),
            relationships,
            self.config.initial_confidence,
            self.now(),
        );
        while self.index.contains_key(&node.id) {
            node.id = Uuid::new_v4();
        }

        let id = node.id;
        self.index.insert(id, self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Apply a partial update. Unknown ids are ignored; returns whether a node was touched.
    pub fn update_node(&mut self, id: Uuid, update: NodeUpdate) -> bool {
        let now = self.now();
        let Some(node) = self.get_mut(id) else {
            return false;
        };

        if let Some(concept) = update.concept {
            node.concept = concept;
        }
        if let Some(relationships) = update.relationships {
            node.relationships = relationships;
        }
        if let Some(confidence) = update.confidence {
            node.confidence = clamp_confidence(confidence);
        }
        node.last_updated = now;
        true
    }

    /// Nudge confidence up on success, down on failure. Unknown ids are ignored.
    pub fn update_confidence(&mut self, id: Uuid, success: bool) -> bool {
        let now = self.now();
        let step = self.config.confidence_step;
        let Some(node) = self.get_mut(id) else {
            return false;
        };

        node.confidence = stepped_confidence(node.confidence, step, success);
        node.last_updated = now;
        true
    }

    /// Nodes whose `domain` relationship equals `domain`, most confident first.
    pub fn query_knowledge(&self, domain: &str) -> Vec<KnowledgeNode> {
        let matches = self.nodes.iter().filter(|n| n.domain() == Some(domain));
        by_confidence(matches, usize::MAX)
    }

    /// Nodes whose serialized relationships mention `concept`, most confident first.
    pub fn find_related_concepts(&self, concept: &str) -> Vec<KnowledgeNode> {
        let matches = self
            .nodes
            .iter()
            .filter(|n| n.relationships_json().contains(concept));
        by_confidence(matches, self.config.related_limit)
    }

    /// Remove every node with confidence strictly below `threshold`.
    pub fn prune_nodes(&mut self, threshold: f64) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.confidence >= threshold);
        let removed = before - self.nodes.len();
        if removed > 0 {
            self.rebuild_index();
            tracing::debug!(removed, threshold, "pruned knowledge nodes");
        }
        removed
    }

    /// Prune with the configured default threshold.
    pub fn prune_nodes_default(&mut self) -> usize {
        let threshold = self.config.prune_threshold;
        self.prune_nodes(threshold)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<KnowledgeNode> {
        let pos = self.index.get(&id).copied()?;
        let node = self.nodes.remove(pos);
        self.rebuild_index();
        Some(node)
    }

    /// Ids of nodes below `threshold`, most recently updated first.
    /// Equal timestamps keep insertion order.
    pub(crate) fn low_confidence_ids(&self, threshold: f64) -> Vec<Uuid> {
        let mut low: Vec<&KnowledgeNode> = self
            .nodes
            .iter()
            .filter(|n| n.confidence < threshold)
            .collect();
        low.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        low.into_iter().map(|n| n.id).collect()
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (pos, node) in self.nodes.iter().enumerate() {
            self.index.insert(node.id, pos);
        }
    }

    pub fn stats(&self) -> KnowledgeStats {
        knowledge_stats(self)
    }

    /// Distinct string-valued domains, sorted.
    pub fn domains(&self) -> Vec<String> {
        let set: HashSet<&str> = self.nodes.iter().filter_map(|n| n.domain()).collect();
        let mut domains: Vec<String> = set.into_iter().map(str::to_string).collect();
        domains.sort();
        domains
    }
}

fn by_confidence<'a>(
    nodes: impl Iterator<Item = &'a KnowledgeNode>,
    limit: usize,
) -> Vec<KnowledgeNode> {
    let mut ranked: Vec<&KnowledgeNode> = nodes.collect();
    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    ranked.into_iter().take(limit).cloned().collect()
}
