use super::*;
use std::collections::HashSet;

fn registry() -> UploadRegistry {
    UploadRegistry::default()
}

// --- create() ---

#[test]
fn create_inserts_pending_record() {
    let registry = registry();
    let id = registry.create("a.txt", 1000);

    let record = registry.get(&id).unwrap();
    assert_eq!(record.file_name, "a.txt");
    assert_eq!(record.file_size, 1000);
    assert_eq!(record.progress, 0);
    assert_eq!(record.status, UploadStatus::Pending);
    assert_eq!(record.error_message, None);
}

#[test]
fn snapshot_lists_newest_first() {
    let registry = registry();
    let first = registry.create("first.bin", 1);
    let second = registry.create("second.bin", 2);
    let third = registry.create("third.bin", 3);

    let ids: Vec<_> = registry.snapshot().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![third, second, first]);
}

#[test]
fn create_never_repeats_ids_under_concurrency() {
    let registry = registry();
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                (0..250)
                    .map(|i| registry.create(format!("{t}-{i}.bin"), 1))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(ids.insert(id), "duplicate id handed out");
        }
    }
    assert_eq!(ids.len(), 2000);
    assert_eq!(registry.len(), 2000);
}

// --- update_progress() ---

#[test]
fn progress_moves_pending_to_uploading() {
    let registry = registry();
    let id = registry.create("a.txt", 1000);

    registry.update_progress(&id, 50);

    let record = registry.get(&id).unwrap();
    assert_eq!(record.status, UploadStatus::Uploading);
    assert_eq!(record.progress, 50);
}

#[test]
fn progress_never_decreases_and_is_clamped() {
    let registry = registry();
    let id = registry.create("a.txt", 1000);

    registry.update_progress(&id, 60);
    registry.update_progress(&id, 40);
    assert_eq!(registry.get(&id).unwrap().progress, 60, "progress must not go backwards");

    registry.update_progress(&id, 250);
    assert_eq!(registry.get(&id).unwrap().progress, 100, "progress is capped at 100");
}

#[test]
fn zero_progress_still_starts_the_upload() {
    let registry = registry();
    let id = registry.create("a.txt", 1000);

    registry.update_progress(&id, 0);

    let record = registry.get(&id).unwrap();
    assert_eq!(record.status, UploadStatus::Uploading);
    assert_eq!(record.progress, 0);
}

#[test]
fn progress_after_processing_is_ignored() {
    let registry = registry();
    let id = registry.create("a.txt", 1000);
    registry.update_progress(&id, 30);
    registry.mark_processing(&id);

    registry.update_progress(&id, 40);

    let record = registry.get(&id).unwrap();
    assert_eq!(record.status, UploadStatus::Processing);
    assert_eq!(record.progress, 100);
}

#[test]
fn operations_on_unknown_ids_are_ignored() {
    let registry = registry();
    let known = registry.create("a.txt", 1);
    let unknown = UploadId::from("does-not-exist");

    registry.update_progress(&unknown, 10);
    registry.mark_processing(&unknown);
    assert!(!registry.mark_failed(&unknown, "boom"));
    assert!(!registry.remove(&unknown));

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, known);
    assert_eq!(snapshot[0].status, UploadStatus::Pending);
}

// --- state machine ---

#[tokio::test(start_paused = true)]
async fn full_lifecycle_scenario() {
    let registry = registry();
    let id = registry.create("a.txt", 1000);

    registry.update_progress(&id, 50);
    let record = registry.get(&id).unwrap();
    assert_eq!((record.status, record.progress), (UploadStatus::Uploading, 50));

    registry.mark_processing(&id);
    let record = registry.get(&id).unwrap();
    assert_eq!((record.status, record.progress), (UploadStatus::Processing, 100));

    registry.mark_completed(&id);
    assert_eq!(registry.get(&id).unwrap().status, UploadStatus::Completed);

    tokio::time::sleep(Duration::from_millis(2999)).await;
    assert!(registry.get(&id).is_some(), "record must survive until the delay elapses");

    tokio::time::sleep(Duration::from_millis(2)).await;
    tokio::task::yield_now().await;
    assert!(registry.get(&id).is_none(), "record must be gone after the delay");
    assert!(registry.is_empty());
}

#[test]
fn failed_records_keep_their_message_and_progress() {
    let registry = registry();
    let id = registry.create("a.txt", 1000);
    registry.update_progress(&id, 42);

    registry.mark_failed(&id, "disk full");

    let record = registry.get(&id).unwrap();
    assert_eq!(record.status, UploadStatus::Error);
    assert_eq!(record.error_message.as_deref(), Some("disk full"));
    assert_eq!(record.progress, 42);
}

#[test]
fn failure_is_reachable_before_any_bytes_are_sent() {
    let registry = registry();
    let id = registry.create("a.txt", 1000);

    registry.mark_failed(&id, "cancelled");

    assert_eq!(registry.get(&id).unwrap().status, UploadStatus::Error);
}

#[tokio::test]
async fn terminal_states_are_final() {
    let registry = registry();

    let failed = registry.create("failed.txt", 1);
    assert!(registry.mark_failed(&failed, "first"));
    assert!(!registry.mark_failed(&failed, "second"), "a second failure is ignored");
    registry.mark_completed(&failed);
    registry.mark_processing(&failed);
    let record = registry.get(&failed).unwrap();
    assert_eq!(record.status, UploadStatus::Error);
    assert_eq!(record.error_message.as_deref(), Some("first"));

    let completed = registry.create("completed.txt", 1);
    registry.mark_completed(&completed);
    assert!(!registry.mark_failed(&completed, "late failure"));
    let record = registry.get(&completed).unwrap();
    assert_eq!(record.status, UploadStatus::Completed);
    assert_eq!(record.error_message, None);
}

#[test]
fn processing_is_never_reentered() {
    let registry = registry();
    let id = registry.create("a.txt", 1);
    let mut events = registry.subscribe();

    registry.mark_processing(&id);
    registry.mark_processing(&id);

    assert!(matches!(events.try_recv(), Ok(Event::Processing { .. })));
    assert!(events.try_recv().is_err(), "second mark_processing must not emit");
}

// --- remove() ---

#[test]
fn remove_is_idempotent() {
    let registry = registry();
    let keep = registry.create("keep.txt", 1);
    let id = registry.create("a.txt", 1);
    registry.mark_failed(&id, "boom");

    assert!(registry.remove(&id));
    assert!(!registry.remove(&id));
    assert!(!registry.remove(&UploadId::from("never-created")));

    let ids: Vec<_> = registry.snapshot().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![keep]);
}

#[test]
fn remove_rejects_active_records() {
    let registry = registry();
    let pending = registry.create("pending.txt", 1);
    let uploading = registry.create("uploading.txt", 1);
    registry.update_progress(&uploading, 10);
    let processing = registry.create("processing.txt", 1);
    registry.mark_processing(&processing);

    for id in [&pending, &uploading, &processing] {
        assert!(!registry.remove(id), "active upload {id} must not be removable");
    }
    assert_eq!(registry.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn manual_removal_before_timer_is_harmless() {
    let registry = registry();
    let id = registry.create("a.txt", 1);
    registry.mark_completed(&id);

    assert!(registry.remove(&id));
    let other = registry.create("b.txt", 1);

    tokio::time::sleep(Duration::from_millis(3500)).await;
    tokio::task::yield_now().await;

    assert_eq!(registry.snapshot().len(), 1);
    assert_eq!(registry.snapshot()[0].id, other);
}

#[tokio::test(start_paused = true)]
async fn retention_delay_follows_config() {
    let config = TrackingConfig {
        completed_retention: Duration::from_millis(100),
        ..Default::default()
    };
    let registry = UploadRegistry::new(&config);
    let id = registry.create("a.txt", 1);
    registry.mark_completed(&id);

    tokio::time::sleep(Duration::from_millis(150)).await;
    tokio::task::yield_now().await;

    assert!(registry.get(&id).is_none());
}

#[test]
fn clear_finished_removes_only_terminal_records() {
    let registry = registry();
    let active = registry.create("active.txt", 1);
    let failed = registry.create("failed.txt", 1);
    registry.mark_failed(&failed, "boom");
    let done = registry.create("done.txt", 1);
    registry.mark_processing(&done);
    // no runtime: the auto-removal timer is skipped, the record stays until cleared
    registry.mark_completed(&done);

    assert_eq!(registry.clear_finished(), 2);
    assert_eq!(registry.clear_finished(), 0);

    let ids: Vec<_> = registry.snapshot().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![active]);
}

// --- has_active() / stats() ---

#[test]
fn has_active_tracks_non_terminal_records() {
    let registry = registry();
    assert!(!registry.has_active(), "empty registry has nothing active");

    let id = registry.create("a.txt", 1);
    assert!(registry.has_active());

    registry.update_progress(&id, 10);
    assert!(registry.has_active());

    registry.mark_processing(&id);
    assert!(registry.has_active());

    registry.mark_failed(&id, "boom");
    assert!(!registry.has_active(), "only terminal records remain");
}

#[test]
fn stats_counts_statuses_and_weights_progress_by_size() {
    let registry = registry();
    let small = registry.create("small.bin", 100);
    let large = registry.create("large.bin", 300);
    let failed = registry.create("failed.bin", 1000);
    let _pending = registry.create("pending.bin", 0);

    registry.update_progress(&small, 100);
    registry.update_progress(&large, 0);
    registry.mark_failed(&failed, "boom");

    let stats = registry.stats();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.uploading, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.total_size_bytes, 1400);
    assert!((stats.overall_progress - 25.0).abs() < f32::EPSILON);
}

#[test]
fn stats_of_empty_registry_are_zero() {
    assert_eq!(registry().stats(), UploadStats::default());
}

// --- observers ---

#[test]
fn watchers_see_every_mutation_immediately() {
    let registry = registry();
    let mut watcher = registry.watch();
    assert!(watcher.borrow().is_empty());

    let id = registry.create("a.txt", 1000);
    assert!(watcher.has_changed().unwrap());
    assert_eq!(watcher.borrow_and_update()[0].status, UploadStatus::Pending);

    registry.update_progress(&id, 75);
    let snapshot = watcher.borrow_and_update().clone();
    assert_eq!(snapshot[0].progress, 75);
    assert_eq!(snapshot[0].status, UploadStatus::Uploading);
}

#[test]
fn snapshots_are_detached_copies() {
    let registry = registry();
    let id = registry.create("a.txt", 1000);
    let before = registry.snapshot();

    registry.update_progress(&id, 90);

    assert_eq!(before[0].progress, 0, "earlier snapshot must not change");
    assert_eq!(registry.snapshot()[0].progress, 90);
}

#[test]
fn events_follow_mutation_order() {
    let registry = registry();
    let mut events = registry.subscribe();

    let id = registry.create("a.txt", 10);
    registry.update_progress(&id, 10);
    registry.update_progress(&id, 10);
    registry.update_progress(&id, 90);
    registry.mark_processing(&id);
    registry.mark_failed(&id, "boom");
    registry.remove(&id);

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }

    assert_eq!(
        received,
        vec![
            Event::Created {
                id: id.clone(),
                file_name: "a.txt".into(),
                file_size: 10
            },
            Event::Progress {
                id: id.clone(),
                percent: 10
            },
            Event::Progress {
                id: id.clone(),
                percent: 90
            },
            Event::Processing { id: id.clone() },
            Event::Failed {
                id: id.clone(),
                error: "boom".into()
            },
            Event::Removed { id },
        ]
    );
}
