//! Policy knobs for the stores and the consolidation passes.
//!
//! Every field has a default matching the constants in [`crate::constants`],
//! so a partial TOML/JSON document deserializes into a complete config.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::*;

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "invalid config value for `{field}`: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub capacity: usize,
    pub retrieve_limit: usize,
    pub related_limit: usize,
    pub default_importance: f64,
    pub active_importance: f64,
    pub merge_threshold: f64,
    pub utilization_trigger: f64,
    pub stale_importance: f64,
    pub stale_age_days: u64,
    pub stale_min_frequency: u32,
    pub initial_confidence: f64,
    pub confidence_step: f64,
    pub prune_threshold: f64,
    pub knowledge_review_threshold: f64,
    pub knowledge_trusted_threshold: f64,
    pub knowledge_prune_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: CAPACITY,
            retrieve_limit: RETRIEVE_LIMIT,
            related_limit: RELATED_LIMIT,
            default_importance: DEFAULT_IMPORTANCE,
            active_importance: ACTIVE_IMPORTANCE,
            merge_threshold: MERGE_THRESHOLD,
            utilization_trigger: UTILIZATION_TRIGGER,
            stale_importance: STALE_IMPORTANCE,
            stale_age_days: STALE_AGE_DAYS,
            stale_min_frequency: STALE_MIN_FREQUENCY,
            initial_confidence: INITIAL_CONFIDENCE,
            confidence_step: CONFIDENCE_STEP,
            prune_threshold: PRUNE_THRESHOLD,
            knowledge_review_threshold: KNOWLEDGE_REVIEW_THRESHOLD,
            knowledge_trusted_threshold: KNOWLEDGE_TRUSTED_THRESHOLD,
            knowledge_prune_threshold: KNOWLEDGE_PRUNE_THRESHOLD,
        }
    }
}

impl EngineConfig {
    /// Staleness window in milliseconds.
    pub fn stale_age_millis(&self) -> u64 {
        self.stale_age_days.saturating_mul(MILLIS_PER_DAY)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(invalid("capacity", "must be at least 1"));
        }
        if self.retrieve_limit == 0 {
            return Err(invalid("retrieve_limit", "must be at least 1"));
        }
        if self.related_limit == 0 {
            return Err(invalid("related_limit", "must be at least 1"));
        }

        non_negative("default_importance", self.default_importance)?;
        non_negative("active_importance", self.active_importance)?;
        non_negative("stale_importance", self.stale_importance)?;
        non_negative("utilization_trigger", self.utilization_trigger)?;

        unit_interval("merge_threshold", self.merge_threshold)?;
        unit_interval("initial_confidence", self.initial_confidence)?;
        unit_interval("confidence_step", self.confidence_step)?;
        unit_interval("prune_threshold", self.prune_threshold)?;
        unit_interval("knowledge_review_threshold", self.knowledge_review_threshold)?;
        unit_interval("knowledge_trusted_threshold", self.knowledge_trusted_threshold)?;
        unit_interval("knowledge_prune_threshold", self.knowledge_prune_threshold)?;

        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(field, format!("expected a finite value >= 0, got {value}")));
    }
    Ok(())
}

fn unit_interval(field: &'static str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(field, format!("expected a value in [0, 1], got {value}")));
    }
    Ok(())
}
