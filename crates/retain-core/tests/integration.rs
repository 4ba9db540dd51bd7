//! Integration tests exercising the engine end to end:
//! insert → retrieve → consolidate → stats, across modules.

use std::sync::Arc;
use std::time::Duration;

use approx::assert_relative_eq;
use proptest::prelude::*;
use retain_core::{
    Engine, EngineConfig, ManualClock, MemoryStats, NodeUpdate, Relationships, edit_distance,
    similarity,
};
use serde_json::json;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn engine() -> (Engine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let engine = Engine::with_clock(EngineConfig::default(), clock.clone()).unwrap();
    (engine, clock)
}

fn small_engine(capacity: usize) -> Engine {
    let config = EngineConfig {
        capacity,
        ..Default::default()
    };
    Engine::new(config).unwrap()
}

fn domain(name: &str) -> Relationships {
    let mut rels = Relationships::new();
    rels.insert("domain".to_string(), json!(name));
    rels
}

/// The canonical merge scenario: two near-identical patterns fuse, then grow.
#[test]
fn near_duplicates_merge_then_grow() {
    let (mut engine, _) = engine();
    engine.memories.insert("errorA", 0.4);
    engine.memories.insert("errorA1", 0.6);

    let report = engine.consolidate_memory();
    assert_eq!(report.merged, 1);
    assert_eq!(engine.memories.len(), 1);

    let survivor = engine.memories.iter().next().unwrap();
    assert_eq!(survivor.pattern, "errorA");
    assert_eq!(survivor.frequency, 2);
    assert_relative_eq!(survivor.importance, 0.6 * (1.0 + 2.0 / 100.0), epsilon = 1e-12);
}

#[test]
fn empty_store_stats_are_zero() {
    let (engine, _) = engine();
    assert_eq!(
        engine.memories.stats(),
        MemoryStats {
            total_memories: 0,
            active_memories: 0,
            utilization_rate: 0.0,
        }
    );
}

#[test]
fn confidence_success_clamps_at_one() {
    let (mut engine, _) = engine();
    let id = engine.knowledge.add_node("ownership", domain("rust"));
    engine.knowledge.update_node(
        id,
        NodeUpdate {
            confidence: Some(0.95),
            ..Default::default()
        },
    );
    engine.knowledge.update_confidence(id, true);
    assert_eq!(engine.knowledge.get(id).unwrap().confidence, 1.0);
}

#[test]
fn kitten_sitting() {
    assert_eq!(edit_distance("kitten", "sitting"), 3);
    assert_eq!(similarity("kitten", "sitting"), similarity("sitting", "kitten"));
}

#[test]
fn store_never_exceeds_capacity() {
    let mut engine = small_engine(1000);
    for i in 0..1200 {
        engine
            .memories
            .insert(&format!("pattern-{i}"), (i % 7) as f64 / 7.0);
        assert!(engine.memories.len() <= 1000);
    }
    assert_eq!(engine.memories.len(), 1000);

    // 172 zero-importance memories were inserted; all of them go first.
    let min_survivor = engine
        .memories
        .iter()
        .map(|m| m.eviction_score())
        .fold(f64::INFINITY, f64::min);
    assert!(min_survivor > 0.0, "zero-importance memories should be evicted");
}

#[test]
fn retrieval_reinforcement_protects_from_eviction() {
    let mut engine = small_engine(3);
    let reused = engine.memories.insert("reused pattern", 0.5);
    engine.memories.insert("other a", 0.5);
    engine.memories.insert("other b", 0.5);

    engine.memories.retrieve_relevant("reused");
    engine.memories.insert("newcomer", 0.5);

    assert!(engine.memories.contains(reused));
    assert_eq!(engine.memories.len(), 3);
}

#[test]
fn stale_memories_pruned_under_pressure() {
    let (mut engine, clock) = engine();
    let heavy = engine.memories.insert("heavily used path", 3.0);
    let old = engine.memories.insert("forgotten quirk", 0.1);
    for _ in 0..5 {
        engine.memories.retrieve_relevant("forgotten");
    }

    clock.advance(DAY * 31);
    let report = engine.consolidate_memory();

    assert!(report.pruning_triggered);
    assert_eq!(report.pruned, 1);
    assert!(engine.memories.contains(heavy));
    assert!(!engine.memories.contains(old));
}

#[test]
fn knowledge_lifecycle() {
    let (mut engine, clock) = engine();
    let kg = &mut engine.knowledge;

    let tokio = kg.add_node("tokio", domain("rust"));
    let serde = kg.add_node("serde", domain("rust"));
    let flask = kg.add_node("flask", domain("python"));

    for _ in 0..4 {
        kg.update_confidence(tokio, true);
    }
    for _ in 0..4 {
        kg.update_confidence(flask, false);
    }

    let rust: Vec<_> = kg.query_knowledge("rust").iter().map(|n| n.id).collect();
    assert_eq!(rust, vec![tokio, serde]);

    assert_eq!(kg.prune_nodes(0.2), 1);
    assert!(!kg.contains(flask));
    assert_eq!(kg.prune_nodes(0.2), 0);

    // A weak node whose concept is referenced by a trusted node triggers a
    // graph-wide prune at 0.5.
    clock.advance(Duration::from_secs(10));
    let mut rels = domain("rust");
    rels.insert("runtime_for".to_string(), json!("async io"));
    kg.update_node(
        tokio,
        NodeUpdate {
            relationships: Some(rels),
            ..Default::default()
        },
    );
    let weak = kg.add_node("async io", Relationships::new());
    kg.update_confidence(weak, false);

    let report = engine.consolidate_knowledge();
    assert_eq!(report.prune_passes, 1);
    assert!(!engine.knowledge.contains(weak));
    assert!(engine.knowledge.contains(tokio));
    assert!(engine.knowledge.contains(serde));
}

#[test]
fn unknown_ids_are_silent_noops() {
    let (mut engine, _) = engine();
    let ghost = uuid::Uuid::new_v4();
    assert!(!engine.knowledge.update_confidence(ghost, true));
    assert!(!engine.knowledge.update_node(ghost, NodeUpdate::default()));
    assert!(engine.memories.remove(ghost).is_none());
}

proptest! {
    #[test]
    fn prop_confidence_stays_in_unit_interval(
        start in -2.0f64..3.0,
        signals in proptest::collection::vec(any::<bool>(), 0..40),
    ) {
        let (mut engine, _) = engine();
        let id = engine.knowledge.add_node("c", Relationships::new());
        engine.knowledge.update_node(id, NodeUpdate { confidence: Some(start), ..Default::default() });
        for success in signals {
            engine.knowledge.update_confidence(id, success);
            let c = engine.knowledge.get(id).unwrap().confidence;
            prop_assert!((0.0..=1.0).contains(&c));
        }
    }

    #[test]
    fn prop_capacity_bound_holds(
        capacity in 1usize..20,
        importances in proptest::collection::vec(0.0f64..2.0, 0..60),
    ) {
        let mut engine = small_engine(capacity);
        for (i, importance) in importances.iter().enumerate() {
            engine.memories.insert(&format!("p{i}"), *importance);
            prop_assert!(engine.memories.len() <= capacity);
        }
    }

    #[test]
    fn prop_merge_preserves_total_frequency(
        patterns in proptest::collection::vec("[ab]{3,6}", 1..12),
    ) {
        let (mut engine, _) = engine();
        for p in &patterns {
            engine.memories.insert(p, 0.5);
        }
        let before: u32 = engine.memories.iter().map(|m| m.frequency).sum();
        let merged = retain_core::consolidate::merge_similar(&mut engine.memories);
        let after: u32 = engine.memories.iter().map(|m| m.frequency).sum();

        prop_assert_eq!(before, after);
        prop_assert_eq!(engine.memories.len(), patterns.len() - merged);
    }
}
