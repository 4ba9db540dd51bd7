use std::sync::Arc;
use std::time::Duration;

use retain_core::{
    Engine, KnowledgeNode, Memory, NodeUpdate, Relationships, unix_millis_to_iso8601,
};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// MCP front end for one engine instance.
///
/// Mutating tools (including retrieval, which reinforces) take the write
/// lock; pure reads share the read lock.
#[derive(Clone)]
pub struct RetainServer {
    engine: Arc<RwLock<Engine>>,
    tool_router: ToolRouter<Self>,
}

impl RetainServer {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(RwLock::new(engine)),
            tool_router: Self::tool_router(),
        }
    }

    /// Run both consolidation passes once under the write lock.
    pub async fn consolidate_now(&self) -> serde_json::Value {
        let mut engine = self.engine.write().await;
        let (memory, knowledge) = engine.consolidate_all();
        tracing::info!(
            memories = memory.remaining,
            merged = memory.merged,
            pruned = memory.pruned,
            nodes = knowledge.remaining,
            nodes_pruned = knowledge.pruned,
            "scheduled consolidation"
        );
        serde_json::json!({
            "memory": memory,
            "knowledge": knowledge,
        })
    }

    /// Consolidate on a fixed period until the returned handle is aborted.
    pub fn spawn_consolidation(&self, every: Duration) -> JoinHandle<()> {
        let server = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                server.consolidate_now().await;
            }
        })
    }

    fn memory_stats_json(engine: &Engine) -> serde_json::Value {
        serde_json::to_value(engine.memories.stats()).unwrap_or_default()
    }

    fn knowledge_stats_json(engine: &Engine) -> serde_json::Value {
        serde_json::to_value(engine.knowledge.stats()).unwrap_or_default()
    }
}

fn memory_json(memory: &Memory) -> serde_json::Value {
    serde_json::json!({
        "id": memory.id.to_string(),
        "pattern": memory.pattern,
        "frequency": memory.frequency,
        "importance": memory.importance,
        "last_accessed": unix_millis_to_iso8601(memory.last_accessed),
        "connections": memory.connections,
    })
}

fn node_json(node: &KnowledgeNode) -> serde_json::Value {
    serde_json::json!({
        "id": node.id.to_string(),
        "concept": node.concept,
        "relationships": node.relationships,
        "confidence": node.confidence,
        "last_updated": unix_millis_to_iso8601(node.last_updated),
    })
}

fn success(value: serde_json::Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&value).unwrap_or_default(),
    )]))
}

fn parse_id(raw: &str) -> Result<Uuid, McpError> {
    Uuid::parse_str(raw.trim())
        .map_err(|e| McpError::invalid_params(format!("invalid id '{raw}': {e}"), None))
}

fn require_text(field: &str, value: &str) -> Result<(), McpError> {
    if value.trim().is_empty() {
        return Err(McpError::invalid_params(
            format!("{field} must not be empty"),
            None,
        ));
    }
    Ok(())
}

fn require_finite(field: &str, value: f64) -> Result<(), McpError> {
    if !value.is_finite() {
        return Err(McpError::invalid_params(
            format!("{field} must be a finite number, got {value}"),
            None,
        ));
    }
    Ok(())
}

// --- Tool parameter types ---

#[derive(Debug, Deserialize, JsonSchema)]
struct StoreRequest {
    /// Text signature of the observed behavior
    pattern: String,
    /// Initial importance (defaults to 0.5). Must not be negative.
    importance: Option<f64>,
    /// Run memory consolidation right after storing
    #[serde(default)]
    consolidate: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RetrieveRequest {
    /// Substring to look for in stored patterns (case-sensitive)
    query: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AddNodeRequest {
    /// Concept label
    concept: String,
    /// Named attributes, e.g. {"domain": "rust"}
    #[serde(default)]
    relationships: Relationships,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UpdateNodeRequest {
    /// Node id returned by knowledge_add
    id: String,
    /// New concept label
    concept: Option<String>,
    /// Replacement relationships
    relationships: Option<Relationships>,
    /// New confidence, clamped to [0, 1]
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct DomainRequest {
    /// Value of the `domain` relationship to match exactly
    domain: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RelatedRequest {
    /// Concept text to search for inside node relationships
    concept: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ConfidenceRequest {
    /// Node id returned by knowledge_add
    id: String,
    /// true if the knowledge proved right, false if it proved wrong
    success: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct PruneRequest {
    /// Remove nodes with confidence strictly below this (defaults to 0.2)
    threshold: Option<f64>,
}

#[tool_router]
impl RetainServer {
    #[tool(
        description = "Store an observed behavior pattern as a memory. Returns the new id. The store is bounded: when full, the lowest-scoring memories (importance x frequency) are evicted immediately, which can include the one just stored."
    )]
    async fn memory_store(
        &self,
        Parameters(req): Parameters<StoreRequest>,
    ) -> Result<CallToolResult, McpError> {
        require_text("pattern", &req.pattern)?;
        if let Some(importance) = req.importance {
            require_finite("importance", importance)?;
            if importance < 0.0 {
                return Err(McpError::invalid_params(
                    format!("importance must not be negative, got {importance}"),
                    None,
                ));
            }
        }

        let mut engine = self.engine.write().await;
        let id = match req.importance {
            Some(importance) => engine.memories.insert(&req.pattern, importance),
            None => engine.memories.insert_default(&req.pattern),
        };
        let retained = engine.memories.contains(id);
        let consolidation = req
            .consolidate
            .then(|| serde_json::to_value(engine.consolidate_memory()).unwrap_or_default());

        success(serde_json::json!({
            "id": id.to_string(),
            "retained": retained,
            "consolidation": consolidation,
            "stats": Self::memory_stats_json(&engine),
        }))
    }

    #[tool(
        description = "Retrieve up to 10 memories whose pattern contains the query, best first. Retrieval reinforces: every returned memory gains one frequency and has its access time refreshed. Use memory_peek to look without reinforcing."
    )]
    async fn memory_retrieve(
        &self,
        Parameters(req): Parameters<RetrieveRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut engine = self.engine.write().await;
        let memories = engine.memories.retrieve_relevant(&req.query);
        let items: Vec<_> = memories.iter().map(memory_json).collect();

        success(serde_json::json!({
            "count": items.len(),
            "memories": items,
        }))
    }

    #[tool(
        description = "Same selection and ordering as memory_retrieve, without reinforcing anything."
    )]
    async fn memory_peek(
        &self,
        Parameters(req): Parameters<RetrieveRequest>,
    ) -> Result<CallToolResult, McpError> {
        let engine = self.engine.read().await;
        let memories = engine.memories.peek_relevant(&req.query);
        let items: Vec<_> = memories.iter().map(memory_json).collect();

        success(serde_json::json!({
            "count": items.len(),
            "memories": items,
        }))
    }

    #[tool(
        description = "Run memory maintenance: prune stale low-importance memories when utilization is high, merge near-duplicate patterns, then grow importance by frequency."
    )]
    async fn memory_consolidate(&self) -> Result<CallToolResult, McpError> {
        let mut engine = self.engine.write().await;
        let report = engine.consolidate_memory();

        success(serde_json::json!({
            "report": report,
            "stats": Self::memory_stats_json(&engine),
        }))
    }

    #[tool(
        description = "Memory statistics: total memories, active memories (importance above 0.5), and utilization rate (mean importance)."
    )]
    async fn memory_stats(&self) -> Result<CallToolResult, McpError> {
        let engine = self.engine.read().await;
        success(Self::memory_stats_json(&engine))
    }

    #[tool(
        description = "Add a concept to the knowledge graph with optional relationships such as {\"domain\": \"rust\"}. Starts at confidence 0.5."
    )]
    async fn knowledge_add(
        &self,
        Parameters(req): Parameters<AddNodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        require_text("concept", &req.concept)?;

        let mut engine = self.engine.write().await;
        let id = engine.knowledge.add_node(&req.concept, req.relationships);

        success(serde_json::json!({
            "id": id.to_string(),
            "stats": Self::knowledge_stats_json(&engine),
        }))
    }

    #[tool(
        description = "Partially update a knowledge node. Omitted fields are kept. Unknown ids are ignored (updated=false)."
    )]
    async fn knowledge_update(
        &self,
        Parameters(req): Parameters<UpdateNodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let id = parse_id(&req.id)?;
        if let Some(confidence) = req.confidence {
            require_finite("confidence", confidence)?;
        }

        let mut engine = self.engine.write().await;
        let updated = engine.knowledge.update_node(
            id,
            NodeUpdate {
                concept: req.concept,
                relationships: req.relationships,
                confidence: req.confidence,
            },
        );
        let node = engine.knowledge.get(id).map(node_json);

        success(serde_json::json!({
            "updated": updated,
            "node": node,
        }))
    }

    #[tool(description = "List knowledge nodes in a domain, most confident first.")]
    async fn knowledge_query(
        &self,
        Parameters(req): Parameters<DomainRequest>,
    ) -> Result<CallToolResult, McpError> {
        let engine = self.engine.read().await;
        let nodes: Vec<_> = engine
            .knowledge
            .query_knowledge(&req.domain)
            .iter()
            .map(node_json)
            .collect();

        success(serde_json::json!({
            "count": nodes.len(),
            "nodes": nodes,
        }))
    }

    #[tool(
        description = "Find up to 10 knowledge nodes whose relationships mention a concept, most confident first."
    )]
    async fn knowledge_related(
        &self,
        Parameters(req): Parameters<RelatedRequest>,
    ) -> Result<CallToolResult, McpError> {
        let engine = self.engine.read().await;
        let nodes: Vec<_> = engine
            .knowledge
            .find_related_concepts(&req.concept)
            .iter()
            .map(node_json)
            .collect();

        success(serde_json::json!({
            "count": nodes.len(),
            "nodes": nodes,
        }))
    }

    #[tool(
        description = "Report whether a piece of knowledge proved right (success=true, +0.1) or wrong (success=false, -0.1). Confidence stays within [0, 1]. Unknown ids are ignored."
    )]
    async fn knowledge_confidence(
        &self,
        Parameters(req): Parameters<ConfidenceRequest>,
    ) -> Result<CallToolResult, McpError> {
        let id = parse_id(&req.id)?;

        let mut engine = self.engine.write().await;
        let updated = engine.knowledge.update_confidence(id, req.success);
        let confidence = engine.knowledge.get(id).map(|n| n.confidence);

        success(serde_json::json!({
            "updated": updated,
            "confidence": confidence,
        }))
    }

    #[tool(
        description = "Remove every knowledge node with confidence below the threshold (default 0.2). Returns how many were removed."
    )]
    async fn knowledge_prune(
        &self,
        Parameters(req): Parameters<PruneRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Some(threshold) = req.threshold {
            require_finite("threshold", threshold)?;
        }

        let mut engine = self.engine.write().await;
        let pruned = match req.threshold {
            Some(threshold) => engine.knowledge.prune_nodes(threshold),
            None => engine.knowledge.prune_nodes_default(),
        };

        success(serde_json::json!({
            "pruned": pruned,
            "stats": Self::knowledge_stats_json(&engine),
        }))
    }

    #[tool(
        description = "Run knowledge maintenance: for each low-confidence node (below 0.5), if a related node is highly trusted (above 0.8), prune every node below 0.5 across the whole graph."
    )]
    async fn knowledge_consolidate(&self) -> Result<CallToolResult, McpError> {
        let mut engine = self.engine.write().await;
        let report = engine.consolidate_knowledge();

        success(serde_json::json!({
            "report": report,
            "stats": Self::knowledge_stats_json(&engine),
        }))
    }

    #[tool(
        description = "Knowledge statistics: node count, trusted and low-confidence counts, mean confidence, and number of domains."
    )]
    async fn knowledge_stats(&self) -> Result<CallToolResult, McpError> {
        let engine = self.engine.read().await;
        success(Self::knowledge_stats_json(&engine))
    }
}

#[tool_handler]
impl ServerHandler for RetainServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "You have an adaptive memory for learned behavior patterns and a knowledge graph of concepts.\n\n\
                 MEMORIES:\n\
                 - memory_store records a pattern you observed (an error signature, a recurring user habit).\n\
                 - memory_retrieve finds patterns by substring. Retrieval reinforces what it returns, so only \
                   retrieve when you intend to use the result; use memory_peek to browse.\n\
                 - memory_consolidate merges near-duplicates and reweights by use. It may run on a schedule.\n\n\
                 KNOWLEDGE:\n\
                 - knowledge_add stores a concept with relationships such as {\"domain\": \"rust\"}.\n\
                 - knowledge_confidence reports whether a concept held up; confidence stays in [0, 1].\n\
                 - knowledge_query lists a domain; knowledge_related finds nodes mentioning a concept.\n\
                 - knowledge_prune and knowledge_consolidate drop low-confidence nodes.\n\n\
                 Unknown ids are ignored rather than reported as errors."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
