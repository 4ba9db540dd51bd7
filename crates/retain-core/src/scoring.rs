//! Pure scoring rules shared by the stores and the consolidation passes.

use crate::config::EngineConfig;
use crate::memory::Memory;

/// Capacity eviction priority: `importance * frequency`. Lower goes first.
pub fn eviction_score(importance: f64, frequency: u32) -> f64 {
    importance * frequency as f64
}

/// Consolidation growth: `importance * (1 + frequency / 100)`.
///
/// Compounds on every pass with no ceiling, so frequently reinforced memories
/// keep gaining weight relative to the rest.
pub fn grown_importance(importance: f64, frequency: u32) -> f64 {
    importance * (1.0 + frequency as f64 / 100.0)
}

/// Clamp a confidence into [0, 1]. NaN collapses to 0.
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        return 0.0;
    }
    confidence.clamp(0.0, 1.0)
}

/// Move a confidence one step up on success or down on failure, clamped.
pub fn stepped_confidence(confidence: f64, step: f64, success: bool) -> f64 {
    let delta = if success { step } else { -step };
    clamp_confidence(confidence + delta)
}

/// A memory is stale when it is unimportant and either old or rarely reinforced.
pub fn is_stale(memory: &Memory, now: u64, config: &EngineConfig) -> bool {
    if memory.importance >= config.stale_importance {
        return false;
    }
    let age = now.saturating_sub(memory.last_accessed);
    age > config.stale_age_millis() || memory.frequency < config.stale_min_frequency
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MILLIS_PER_DAY;
    use approx::assert_relative_eq;

    fn memory(importance: f64, frequency: u32, last_accessed: u64) -> Memory {
        let mut m = Memory::new("pattern".to_string(), importance, last_accessed);
        m.frequency = frequency;
        m
    }

    #[test]
    fn test_eviction_score() {
        assert_relative_eq!(eviction_score(0.5, 4), 2.0);
        assert_relative_eq!(eviction_score(0.0, 9), 0.0);
    }

    #[test]
    fn test_grown_importance() {
        assert_relative_eq!(grown_importance(0.6, 2), 0.612);
        assert_relative_eq!(grown_importance(1.0, 100), 2.0);
    }

    #[test]
    fn test_growth_never_shrinks() {
        for freq in [1, 3, 50, 1000] {
            let g = grown_importance(0.25, freq);
            assert!(g > 0.25, "growth shrank at frequency {freq}: {g}");
        }
        assert_eq!(grown_importance(0.0, 10), 0.0);
    }

    #[test]
    fn test_stepped_confidence_clamps() {
        assert_relative_eq!(stepped_confidence(0.95, 0.1, true), 1.0);
        assert_relative_eq!(stepped_confidence(0.05, 0.1, false), 0.0);
        assert_relative_eq!(stepped_confidence(0.5, 0.1, true), 0.6);
        assert_relative_eq!(stepped_confidence(0.5, 0.1, false), 0.4);
    }

    #[test]
    fn test_clamp_confidence_nan() {
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
        assert_eq!(clamp_confidence(7.0), 1.0);
        assert_eq!(clamp_confidence(-3.0), 0.0);
    }

    #[test]
    fn test_is_stale() {
        let cfg = EngineConfig::default();
        let now = 100 * MILLIS_PER_DAY;

        // Important memories are never stale.
        assert!(!is_stale(&memory(0.3, 1, 0), now, &cfg));
        // Unimportant and rarely reinforced.
        assert!(is_stale(&memory(0.1, 2, now), now, &cfg));
        // Unimportant, frequent, but old.
        assert!(is_stale(&memory(0.1, 5, now - 31 * MILLIS_PER_DAY), now, &cfg));
        // Unimportant, frequent, recent.
        assert!(!is_stale(&memory(0.1, 5, now - 29 * MILLIS_PER_DAY), now, &cfg));
        // Exactly 30 days old is not older than 30 days.
        assert!(!is_stale(&memory(0.1, 3, now - 30 * MILLIS_PER_DAY), now, &cfg));
    }
}
