// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::persistence::InMemoryAdapter;
use stepwise_core::{FakeClock, Message, MessageKind, SequentialIdGen, Step, StepId, StepStatus, StepType};

fn sequential_steps(clock: &FakeClock, id_gen: &SequentialIdGen, n: usize) -> Vec<Step> {
    (0..n)
        .map(|i| {
            let first = Message::new(MessageKind::Assistant, "s1", format!("step {i}"));
            let mut step = Step::start(StepId::new(id_gen.next()), StepType::Analysis, first, clock.now());
            step.complete(StepStatus::Completed, clock.now());
            clock.advance(chrono::Duration::seconds(1));
            step
        })
        .collect()
}

async fn fresh_history(config: HistoryConfig) -> (History<InMemoryAdapter, FakeClock, SequentialIdGen>, FakeClock, SequentialIdGen) {
    let clock = FakeClock::default();
    let id_gen = SequentialIdGen::new("cp");
    let history = History::load_with(InMemoryAdapter::new(), "conv-1", config, clock.clone(), id_gen.clone())
        .await
        .unwrap();
    (history, clock, id_gen)
}

#[tokio::test]
async fn save_step_appends_and_persists() {
    let (mut history, clock, id_gen) = fresh_history(HistoryConfig { auto_checkpoint_interval: 0, ..HistoryConfig::default() }).await;
    for step in sequential_steps(&clock, &id_gen, 3) {
        history.save_step(step).await.unwrap();
    }
    assert_eq!(history.get_history().len(), 3);
    assert_eq!(history.stats().total_steps, 3);
}

#[tokio::test]
async fn auto_checkpoint_fires_every_configured_interval_and_resets_counter() {
    let (mut history, clock, id_gen) =
        fresh_history(HistoryConfig { auto_checkpoint_interval: 2, ..HistoryConfig::default() }).await;
    for step in sequential_steps(&clock, &id_gen, 4) {
        history.save_step(step).await.unwrap();
    }
    assert_eq!(history.get_checkpoints().len(), 2);
    assert_eq!(history.stats().steps_since_checkpoint, 0);
}

#[tokio::test]
async fn manual_checkpoint_resets_the_auto_checkpoint_counter() {
    let (mut history, clock, id_gen) =
        fresh_history(HistoryConfig { auto_checkpoint_interval: 10, ..HistoryConfig::default() }).await;
    for step in sequential_steps(&clock, &id_gen, 3) {
        history.save_step(step).await.unwrap();
    }
    assert_eq!(history.stats().steps_since_checkpoint, 3);
    history.create_checkpoint("manual").await.unwrap();
    assert_eq!(history.stats().steps_since_checkpoint, 0);
    assert_eq!(history.get_checkpoints().len(), 1);
}

#[tokio::test]
async fn restore_checkpoint_replaces_history_without_deleting_other_checkpoints() {
    let (mut history, clock, id_gen) =
        fresh_history(HistoryConfig { auto_checkpoint_interval: 0, ..HistoryConfig::default() }).await;
    for step in sequential_steps(&clock, &id_gen, 2) {
        history.save_step(step).await.unwrap();
    }
    let cp1 = history.create_checkpoint("first").await.unwrap();
    for step in sequential_steps(&clock, &id_gen, 3) {
        history.save_step(step).await.unwrap();
    }
    assert_eq!(history.get_history().len(), 5);

    history.restore_checkpoint(&cp1).await.unwrap();
    assert_eq!(history.get_history().len(), 2);
    assert_eq!(history.get_checkpoints().len(), 1);
    assert_eq!(history.stats().steps_since_checkpoint, 0);
}

#[tokio::test]
async fn restore_unknown_checkpoint_errors() {
    let (mut history, _clock, _id_gen) = fresh_history(HistoryConfig::default()).await;
    let result = history.restore_checkpoint(&CheckpointId::new("nope")).await;
    assert!(matches!(result, Err(HistoryError::CheckpointNotFound(_))));
}

/// S7 — prune preserves checkpointed Steps and keeps chronological order.
#[tokio::test]
async fn prune_preserves_checkpointed_steps_in_chronological_order() {
    let (mut history, clock, id_gen) =
        fresh_history(HistoryConfig { auto_checkpoint_interval: 0, max_step_history: 5, preserve_checkpoints: true, ..HistoryConfig::default() })
            .await;

    for step in sequential_steps(&clock, &id_gen, 3) {
        history.save_step(step).await.unwrap();
    }
    history.create_checkpoint("safe").await.unwrap();
    for step in sequential_steps(&clock, &id_gen, 5) {
        history.save_step(step).await.unwrap();
    }
    assert_eq!(history.get_history().len(), 8);

    let result = history.prune(PruneOptions::default()).await.unwrap();
    assert_eq!(result.pruned, 3);

    let remaining = history.get_history();
    assert_eq!(remaining.len(), 5);
    // the 3 checkpointed steps (oldest) must still be present
    for i in 0..3 {
        assert!(remaining.iter().any(|s| s.description == format!("step {i}")));
    }
    // chronological order preserved
    for pair in remaining.windows(2) {
        assert!(pair[0].started_at <= pair[1].started_at);
    }
}

#[tokio::test]
async fn prune_below_bound_is_a_noop() {
    let (mut history, clock, id_gen) = fresh_history(HistoryConfig { max_step_history: 10, ..HistoryConfig::default() }).await;
    for step in sequential_steps(&clock, &id_gen, 2) {
        history.save_step(step).await.unwrap();
    }
    let result = history.prune(PruneOptions::default()).await.unwrap();
    assert_eq!(result.pruned, 0);
    assert_eq!(history.get_history().len(), 2);
}

#[tokio::test]
async fn prune_without_preserve_drops_oldest_unconditionally() {
    let (mut history, clock, id_gen) =
        fresh_history(HistoryConfig { auto_checkpoint_interval: 0, max_step_history: 2, ..HistoryConfig::default() }).await;
    for step in sequential_steps(&clock, &id_gen, 4) {
        history.save_step(step).await.unwrap();
    }
    history.create_checkpoint("irrelevant").await.unwrap();
    let result = history
        .prune(PruneOptions { max_step_history: None, preserve_checkpoints: Some(false) })
        .await
        .unwrap();
    assert_eq!(result.pruned, 2);
    assert_eq!(history.get_history().len(), 2);
}

#[tokio::test]
async fn clear_drops_steps_and_checkpoints() {
    let (mut history, clock, id_gen) = fresh_history(HistoryConfig::default()).await;
    for step in sequential_steps(&clock, &id_gen, 2) {
        history.save_step(step).await.unwrap();
    }
    history.create_checkpoint("cp").await.unwrap();
    history.clear().await.unwrap();
    assert!(history.get_history().is_empty());
    assert!(history.get_checkpoints().is_empty());
}

#[tokio::test]
async fn replay_beginning_to_end_returns_full_steps_in_order() {
    let (mut history, clock, id_gen) = fresh_history(HistoryConfig::default()).await;
    for step in sequential_steps(&clock, &id_gen, 3) {
        history.save_step(step).await.unwrap();
    }
    let items = history.replay(ReplayOptions::default()).unwrap();
    assert_eq!(items.len(), 3);
    assert!(matches!(items[0], ReplayItem::Full(_)));
}

#[tokio::test]
async fn replay_from_checkpoint_starts_after_the_snapshot() {
    let (mut history, clock, id_gen) = fresh_history(HistoryConfig { auto_checkpoint_interval: 0, ..HistoryConfig::default() }).await;
    for step in sequential_steps(&clock, &id_gen, 2) {
        history.save_step(step).await.unwrap();
    }
    let cp = history.create_checkpoint("mid").await.unwrap();
    for step in sequential_steps(&clock, &id_gen, 2) {
        history.save_step(step).await.unwrap();
    }

    let items = history
        .replay(ReplayOptions { from: ReplayFrom::FromCheckpoint(cp), to: ReplayTo::End, summary: true })
        .unwrap();
    assert_eq!(items.len(), 2);
    match &items[0] {
        ReplayItem::Summary(s) => assert_eq!(s.description, "step 0"),
        ReplayItem::Full(_) => panic!("expected summary"),
    }
}

#[tokio::test]
async fn replay_to_step_is_inclusive() {
    let (mut history, clock, id_gen) = fresh_history(HistoryConfig::default()).await;
    let steps = sequential_steps(&clock, &id_gen, 4);
    let target_id = steps[1].id.clone();
    for step in steps {
        history.save_step(step).await.unwrap();
    }

    let items = history
        .replay(ReplayOptions { from: ReplayFrom::Beginning, to: ReplayTo::ToStep(target_id), summary: true })
        .unwrap();
    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn round_trip_create_checkpoint_then_restore_yields_same_history() {
    let (mut history, clock, id_gen) = fresh_history(HistoryConfig { auto_checkpoint_interval: 0, ..HistoryConfig::default() }).await;
    for step in sequential_steps(&clock, &id_gen, 3) {
        history.save_step(step).await.unwrap();
    }
    let before: Vec<StepId> = history.get_history().iter().map(|s| s.id.clone()).collect();
    let cp = history.create_checkpoint("snap").await.unwrap();
    history.restore_checkpoint(&cp).await.unwrap();
    let after: Vec<StepId> = history.get_history().iter().map(|s| s.id.clone()).collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn load_with_corrupt_data_and_recovery_enabled_starts_empty() {
    let adapter = InMemoryAdapter::new();
    adapter.fail_loads(true);
    let history = History::load_with(
        adapter,
        "conv-1",
        HistoryConfig { enable_recovery: true, ..HistoryConfig::default() },
        FakeClock::default(),
        SequentialIdGen::new("cp"),
    )
    .await
    .unwrap();
    assert!(history.get_history().is_empty());
}

#[tokio::test]
async fn load_failure_without_recovery_is_fatal() {
    let adapter = InMemoryAdapter::new();
    adapter.fail_loads(true);
    let result = History::load_with(
        adapter,
        "conv-1",
        HistoryConfig { enable_recovery: false, ..HistoryConfig::default() },
        FakeClock::default(),
        SequentialIdGen::new("cp"),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn save_step_failure_surfaces_to_caller_and_increments_error_counter() {
    let adapter = InMemoryAdapter::new();
    let clock = FakeClock::default();
    let id_gen = SequentialIdGen::new("cp");
    let mut history = History::load_with(adapter.clone(), "conv-1", HistoryConfig::default(), clock.clone(), id_gen.clone())
        .await
        .unwrap();
    adapter.fail_next_save();
    let step = sequential_steps(&clock, &id_gen, 1).remove(0);
    let result = history.save_step(step).await;
    assert!(matches!(result, Err(HistoryError::Persistence(_))));
    assert_eq!(history.stats().errors, 1);
}
