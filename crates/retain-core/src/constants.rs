/// Maximum number of memories held by a store before eviction kicks in.
pub const CAPACITY: usize = 1000;

/// Maximum number of records returned by a relevance lookup.
pub const RETRIEVE_LIMIT: usize = 10;

/// Maximum number of nodes returned by a related-concept lookup.
pub const RELATED_LIMIT: usize = 10;

/// Importance assigned when the caller does not supply one.
pub const DEFAULT_IMPORTANCE: f64 = 0.5;

/// A memory counts as active when its importance is strictly above this.
pub const ACTIVE_IMPORTANCE: f64 = 0.5;

/// Pattern similarity above which two memories are fused.
pub const MERGE_THRESHOLD: f64 = 0.8;

/// Mean importance above which consolidation prunes stale memories.
pub const UTILIZATION_TRIGGER: f64 = 0.8;

/// Stale pruning: importance must be below this to be considered.
pub const STALE_IMPORTANCE: f64 = 0.3;

/// Stale pruning: memories untouched for longer than this are stale.
pub const STALE_AGE_DAYS: u64 = 30;

/// Stale pruning: memories reinforced fewer times than this are stale.
pub const STALE_MIN_FREQUENCY: u32 = 3;

/// Confidence of a freshly added knowledge node.
pub const INITIAL_CONFIDENCE: f64 = 0.5;

/// Confidence change applied per success/failure signal.
pub const CONFIDENCE_STEP: f64 = 0.1;

/// Default threshold for explicit node pruning.
pub const PRUNE_THRESHOLD: f64 = 0.2;

/// Knowledge consolidation: nodes below this confidence are reviewed.
pub const KNOWLEDGE_REVIEW_THRESHOLD: f64 = 0.5;

/// Knowledge consolidation: a related node above this confidence triggers a prune.
pub const KNOWLEDGE_TRUSTED_THRESHOLD: f64 = 0.8;

/// Knowledge consolidation: threshold used by the triggered prune.
pub const KNOWLEDGE_PRUNE_THRESHOLD: f64 = 0.5;

/// Milliseconds in one day.
pub const MILLIS_PER_DAY: u64 = 24 * 60 * 60 * 1000;
