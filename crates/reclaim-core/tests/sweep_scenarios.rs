use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reclaim_core::app::{BucketReclaimer, CancelableScope};
use reclaim_core::domain::{
    BucketOutcome, Policy, ReclaimError, SkipReason, SweepError, format_timestamp_suffix,
};
use reclaim_core::impls::InMemoryStorage;
use reclaim_core::ports::FixedClock;

const PROJECT: &str = "test-project";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn created(prefix: &str, ago: chrono::Duration) -> String {
    format!("{prefix}-{}", format_timestamp_suffix(now() - ago).unwrap())
}

fn policy(excluded: &[&str], dry_run: bool, workers: usize) -> Policy {
    Policy::builder(PROJECT)
        .bucket_name_pattern(r"^.+-([a-z0-9]+)$")
        .exclude(excluded.iter().copied())
        .lifespan(Duration::from_secs(2 * 60 * 60))
        .dry_run(dry_run)
        .workers(workers)
        .build()
        .unwrap()
}

fn reclaimer(storage: &Arc<InMemoryStorage>, policy: Policy) -> BucketReclaimer {
    BucketReclaimer::new(storage.clone(), policy).with_clock(FixedClock::new(now()))
}

#[tokio::test]
async fn only_expired_unprotected_buckets_are_reclaimed() {
    let storage = Arc::new(InMemoryStorage::new());
    let keep = created("keep", chrono::Duration::zero());
    let old = created("old", chrono::Duration::hours(3));
    let protected = created("protected", chrono::Duration::hours(3));
    for bucket in [&keep, &old, &protected] {
        storage.add_bucket(PROJECT, bucket, ["a", "b"]);
    }

    let result = reclaimer(&storage, policy(&[protected.as_str()], false, 4))
        .run(&CancelableScope::root())
        .await
        .unwrap();

    assert_eq!(result.reclaimed().collect::<Vec<_>>(), vec![old.as_str()]);
    assert_eq!(
        result.outcome_of(&protected),
        Some(&BucketOutcome::Skipped(SkipReason::Excluded))
    );
    assert!(matches!(
        result.outcome_of(&keep),
        Some(BucketOutcome::Skipped(SkipReason::NotExpired { .. }))
    ));
    let mut remaining = storage.buckets(PROJECT);
    remaining.sort();
    let mut expected = vec![keep.clone(), protected.clone()];
    expected.sort();
    assert_eq!(remaining, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_object_keeps_the_bucket() {
    let storage = Arc::new(InMemoryStorage::new());
    let old = created("old", chrono::Duration::hours(3));
    storage.add_bucket(PROJECT, &old, (1..=5).map(|i| format!("obj-{i}")));
    storage.fail_object_delete(&old, "obj-3");

    let err = reclaimer(&storage, policy(&[], false, 2))
        .run(&CancelableScope::root())
        .await
        .unwrap_err();

    assert_eq!(storage.bucket_delete_calls(), 0);
    assert!(storage.buckets(PROJECT).contains(&old));
    let message = err.to_string();
    assert!(message.contains(&old), "{message}");
    assert!(message.contains("obj-3"), "{message}");
    assert!(matches!(
        err.result().outcome_of(&old),
        Some(BucketOutcome::Errored { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_bad_bucket_does_not_stop_the_sweep() {
    let storage = Arc::new(InMemoryStorage::new());
    let bucket_a = created("a-first", chrono::Duration::hours(5));
    let bucket_b = created("b-second", chrono::Duration::hours(5));
    storage.add_bucket(PROJECT, &bucket_a, (0..20).map(|i| format!("obj-{i}")));
    storage.add_bucket(PROJECT, &bucket_b, (0..20).map(|i| format!("obj-{i}")));
    storage.fail_object_delete(&bucket_a, "obj-0");

    let err = reclaimer(&storage, policy(&[], false, 4))
        .run(&CancelableScope::root())
        .await
        .unwrap_err();

    let SweepError::Buckets { result, failures } = err else {
        panic!("expected per-bucket failures");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].bucket(), Some(bucket_a.as_str()));
    assert!(matches!(failures[0], ReclaimError::ObjectDelete { .. }));
    assert_eq!(
        result.outcome_of(&bucket_b),
        Some(&BucketOutcome::Deleted { objects: 20, dry_run: false })
    );
    assert_eq!(storage.buckets(PROJECT), vec![bucket_a]);
}

#[tokio::test]
async fn dry_run_leaves_the_backend_untouched() {
    let storage = Arc::new(InMemoryStorage::new());
    let old = created("old", chrono::Duration::hours(3));
    let young = created("young", chrono::Duration::minutes(1));
    storage.add_bucket(PROJECT, &old, ["x", "y", "z"]);
    storage.add_bucket(PROJECT, &young, ["x"]);
    let before = storage.snapshot();

    let result = reclaimer(&storage, policy(&[], true, 3))
        .run(&CancelableScope::root())
        .await
        .unwrap();

    assert_eq!(storage.snapshot(), before);
    assert_eq!(storage.total_object_delete_calls(), 0);
    assert_eq!(storage.bucket_delete_calls(), 0);
    assert_eq!(
        result.outcome_of(&old),
        Some(&BucketOutcome::Deleted { objects: 3, dry_run: true })
    );
}

#[tokio::test]
async fn second_sweep_after_success_is_clean() {
    let storage = Arc::new(InMemoryStorage::new());
    let old = created("old", chrono::Duration::hours(3));
    let keep = created("keep", chrono::Duration::minutes(3));
    storage.add_bucket(PROJECT, &old, ["x"]);
    storage.add_bucket(PROJECT, &keep, ["x"]);
    let reclaimer = reclaimer(&storage, policy(&[], false, 2));

    let first = reclaimer.run(&CancelableScope::root()).await.unwrap();
    let second = reclaimer.run(&CancelableScope::root()).await.unwrap();

    assert_eq!(first.reclaimed().count(), 1);
    assert_eq!(second.reclaimed().count(), 0);
    assert_eq!(second.errored().count(), 0);
    assert_eq!(second.skipped().collect::<Vec<_>>(), vec![keep.as_str()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_object_deleted_once_for_any_worker_count() {
    for workers in [1, 2, 7, 32] {
        let storage = Arc::new(InMemoryStorage::new());
        let old = created("old", chrono::Duration::hours(3));
        storage.add_bucket(PROJECT, &old, (0..500).map(|i| format!("obj-{i:04}")));

        let result = reclaimer(&storage, policy(&[], false, workers))
            .run(&CancelableScope::root())
            .await
            .unwrap();

        assert_eq!(
            result.outcome_of(&old),
            Some(&BucketOutcome::Deleted { objects: 500, dry_run: false }),
            "workers={workers}"
        );
        assert!(storage.buckets(PROJECT).is_empty());
        assert_eq!(storage.total_object_delete_calls(), 500);
        for i in (0..500).step_by(50) {
            assert_eq!(storage.delete_attempts(&old, &format!("obj-{i:04}")), 1);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interrupt_during_a_bucket_stops_the_sweep() {
    let storage = Arc::new(InMemoryStorage::new());
    let bucket_a = created("a-first", chrono::Duration::hours(5));
    let bucket_b = created("b-second", chrono::Duration::hours(5));
    storage.add_bucket(PROJECT, &bucket_a, (0..150).map(|i| format!("obj-{i:03}")));
    storage.add_bucket(PROJECT, &bucket_b, (0..150).map(|i| format!("obj-{i:03}")));
    storage.set_object_delete_latency(Duration::from_millis(5));

    let scope = CancelableScope::root();
    let trigger = scope.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let err = reclaimer(&storage, policy(&[], false, 2))
        .run(&scope)
        .await
        .unwrap_err();

    let SweepError::Buckets { result, failures } = err else {
        panic!("expected per-bucket failures");
    };
    assert!(matches!(
        &failures[0],
        ReclaimError::Cancelled { bucket, .. } if bucket == &bucket_a
    ));
    assert!(matches!(
        failures.last(),
        Some(ReclaimError::Interrupted { project }) if project == PROJECT
    ));
    assert!(matches!(
        result.outcome_of(&bucket_a),
        Some(BucketOutcome::Errored { .. })
    ));
    assert_eq!(result.outcome_of(&bucket_b), None);

    assert_eq!(storage.bucket_delete_calls(), 0);
    assert!(storage.total_object_delete_calls() < 200);
    assert!(!storage.objects(&bucket_a).is_empty());
    assert_eq!(storage.objects(&bucket_b).len(), 150);
}
