//! BucketReclaimer - sweep 全体のオーケストレーション
//!
//! # フロー
//! 1. BucketSource からバケットを 1 件ずつ取り出す（全件を先に読まない）
//! 2. ExpirationClassifier で判定
//! 3. 対象なら DeletionPipeline でオブジェクトを全削除
//! 4. 空になったことを確認できたバケットだけを削除
//! 5. バケット単位の失敗は記録して次へ進み、最後にまとめて返す
//!
//! バケットは 1 つずつ順番に処理する。並列なのはバケット内のオブジェクト削除だけ。

use std::sync::Arc;

use futures::StreamExt;
use tracing::{Instrument, debug, info, info_span, trace, warn};

use super::pipeline::DeletionPipeline;
use super::scope::CancelableScope;
use crate::domain::{
    BucketCandidate, BucketOutcome, BucketState, Classification, ExpirationClassifier, Policy,
    ReclaimError, SweepError, SweepResult,
};
use crate::ports::{BucketSource, Clock, ObjectStore, SystemClock};

pub struct BucketReclaimer {
    buckets: Arc<dyn BucketSource>,
    pipeline: DeletionPipeline,
    clock: Arc<dyn Clock>,
    policy: Policy,
}

impl BucketReclaimer {
    /// 1 つのバックエンドがバケットとオブジェクトの両方を扱う場合
    pub fn new<B>(backend: Arc<B>, policy: Policy) -> Self
    where
        B: BucketSource + ObjectStore + 'static,
    {
        Self::with_ports(backend.clone(), backend, policy)
    }

    pub fn with_ports(
        buckets: Arc<dyn BucketSource>,
        objects: Arc<dyn ObjectStore>,
        policy: Policy,
    ) -> Self {
        let pipeline = DeletionPipeline::new(objects, policy.worker_count(), policy.dry_run());
        Self {
            buckets,
            pipeline,
            clock: Arc::new(SystemClock),
            policy,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// 1 回の sweep を実行する
    ///
    /// - `Ok`: 対象バケットが全て回収されたか、正当にスキップされた
    /// - `Err(SweepError::Buckets)`: 1 つ以上のバケットで失敗（残りは処理済み）
    /// - `Err(SweepError::Enumeration)`: バケット一覧の取得に失敗して中断
    ///
    /// `scope` がキャンセルされると処理中のバケットを止め、次のバケットには進まない。
    pub async fn run(&self, scope: &CancelableScope) -> Result<SweepResult, SweepError> {
        let project = self.policy.project_id();
        let dry_run = self.policy.dry_run();
        info!(project, dry_run, workers = self.pipeline.workers(), "sweep started");

        let mut result = SweepResult::new();
        let mut failures = Vec::new();
        let mut candidates = self.buckets.list_buckets(project);

        loop {
            let next = tokio::select! {
                biased;
                _ = scope.cancelled() => {
                    failures.push(ReclaimError::Interrupted { project: project.to_string() });
                    break;
                }
                next = candidates.next() => next,
            };
            let candidate = match next {
                None => break,
                Some(Ok(candidate)) => candidate,
                Some(Err(source)) => {
                    let source = ReclaimError::BucketListing {
                        project: project.to_string(),
                        source,
                    };
                    warn!(project, error = %source, "sweep aborted");
                    return Err(SweepError::Enumeration { result, source });
                }
            };

            let name = candidate.name();
            let span = info_span!("bucket", bucket = name);
            let outcome = self.sweep_one(scope, &candidate).instrument(span).await;
            match outcome {
                Ok(outcome) => result.record(name, outcome),
                Err(err) => {
                    result.record(
                        name,
                        BucketOutcome::Errored {
                            reason: err.to_string(),
                        },
                    );
                    failures.push(err);
                }
            }
        }

        info!(
            project,
            reclaimed = result.reclaimed().count(),
            skipped = result.skipped().count(),
            errored = result.errored().count(),
            "sweep finished"
        );
        if failures.is_empty() {
            Ok(result)
        } else {
            Err(SweepError::Buckets { result, failures })
        }
    }

    async fn sweep_one(
        &self,
        scope: &CancelableScope,
        candidate: &BucketCandidate,
    ) -> Result<BucketOutcome, ReclaimError> {
        let bucket = candidate.name();
        let mut state = BucketState::Discovered;
        debug!(created_at = ?candidate.created_at(), "bucket discovered");
        let now = self.clock.now();
        match ExpirationClassifier::new(&self.policy).classify(bucket, now) {
            Classification::Skip(reason) => {
                advance(&mut state, BucketState::Skipped);
                info!(%reason, "skipping bucket");
                return Ok(BucketOutcome::Skipped(reason));
            }
            Classification::Eligible { age } => {
                advance(&mut state, BucketState::Eligible);
                info!(age_secs = age.as_secs(), "bucket expired, reclaiming");
            }
        }

        let objects = self.reclaim(scope, &mut state, bucket).await?;
        Ok(BucketOutcome::Deleted {
            objects,
            dry_run: self.policy.dry_run(),
        })
    }

    async fn reclaim(
        &self,
        scope: &CancelableScope,
        state: &mut BucketState,
        bucket: &str,
    ) -> Result<usize, ReclaimError> {
        advance(state, BucketState::ObjectsDeleting);
        let report = match self.pipeline.run(scope, bucket).await {
            Ok(report) => report,
            Err(err) => {
                // 空になったか分からないバケットは削除しない
                advance(state, BucketState::ObjectsDeleteFailed);
                return Err(err);
            }
        };
        advance(state, BucketState::ObjectsDeleted);

        advance(state, BucketState::BucketDeleting);
        if self.policy.dry_run() {
            advance(state, BucketState::BucketDeleted);
            info!(objects = report.deleted, dry_run = true, "bucket deleted");
            return Ok(report.deleted);
        }

        let deleted = tokio::select! {
            biased;
            _ = scope.cancelled() => Err(ReclaimError::Cancelled {
                bucket: bucket.to_string(),
                abandoned: 0,
            }),
            deleted = self.buckets.delete_bucket(bucket) => deleted.map_err(|source| {
                ReclaimError::BucketDelete { bucket: bucket.to_string(), source }
            }),
        };
        match deleted {
            Ok(()) => {
                advance(state, BucketState::BucketDeleted);
                info!(objects = report.deleted, "bucket deleted");
                Ok(report.deleted)
            }
            Err(err) => {
                advance(state, BucketState::BucketDeleteFailed);
                warn!(error = %err, "bucket delete failed");
                Err(err)
            }
        }
    }
}

fn advance(state: &mut BucketState, next: BucketState) {
    debug_assert!(state.can_transition_to(next), "{state} -> {next}");
    trace!(from = %state, to = %next, "bucket state");
    *state = next;
}

/// 1 回の sweep を実行するショートカット
///
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use std::sync::Arc;
/// use reclaim_core::app::CancelableScope;
/// use reclaim_core::domain::Policy;
/// use reclaim_core::impls::InMemoryStorage;
///
/// let policy = Policy::builder("my-project")
///     .bucket_name_pattern(r"^.+-([a-z0-9]+)$")
///     .build()?;
/// let result = reclaim_core::run(&CancelableScope::root(), policy, Arc::new(InMemoryStorage::new())).await?;
/// println!("{} buckets reclaimed", result.reclaimed().count());
/// # Ok(())
/// # }
/// ```
pub async fn run<B>(
    scope: &CancelableScope,
    policy: Policy,
    backend: Arc<B>,
) -> Result<SweepResult, SweepError>
where
    B: BucketSource + ObjectStore + 'static,
{
    debug!(project = policy.project_id(), "building reclaimer");
    BucketReclaimer::new(backend, policy).run(scope).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SkipReason, format_timestamp_suffix};
    use crate::impls::InMemoryStorage;
    use crate::ports::FixedClock;
    use chrono::{DateTime, TimeZone, Utc};
    use std::time::Duration;

    const PROJECT: &str = "test-project";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn aged(prefix: &str, age: chrono::Duration) -> String {
        format!("{prefix}-{}", format_timestamp_suffix(now() - age).unwrap())
    }

    fn policy(dry_run: bool) -> Policy {
        Policy::builder(PROJECT)
            .bucket_name_pattern(r"^.+-([a-z0-9]+)$")
            .lifespan(Duration::from_secs(2 * 60 * 60))
            .dry_run(dry_run)
            .workers(3)
            .build()
            .unwrap()
    }

    fn reclaimer(storage: &Arc<InMemoryStorage>, policy: Policy) -> BucketReclaimer {
        BucketReclaimer::new(storage.clone(), policy).with_clock(FixedClock::new(now()))
    }

    #[tokio::test]
    async fn skipped_buckets_are_recorded_with_reason() {
        let storage = Arc::new(InMemoryStorage::new());
        let young = aged("young", chrono::Duration::minutes(5));
        storage.add_bucket(PROJECT, &young, ["a"]);
        storage.add_bucket(PROJECT, "plain", ["a"]);

        let result = reclaimer(&storage, policy(false))
            .run(&CancelableScope::root())
            .await
            .unwrap();

        assert_eq!(
            result.outcome_of("plain"),
            Some(&BucketOutcome::Skipped(SkipReason::NoTimestampSuffix))
        );
        assert!(matches!(
            result.outcome_of(&young),
            Some(BucketOutcome::Skipped(SkipReason::NotExpired { .. }))
        ));
        assert_eq!(storage.buckets(PROJECT).len(), 2);
    }

    #[tokio::test]
    async fn bucket_delete_failure_is_isolated() {
        let storage = Arc::new(InMemoryStorage::new());
        let first = aged("first", chrono::Duration::hours(3));
        let second = aged("second", chrono::Duration::hours(3));
        storage.add_bucket(PROJECT, &first, ["x", "y"]);
        storage.add_bucket(PROJECT, &second, ["z"]);
        storage.fail_bucket_delete(&first);

        let err = reclaimer(&storage, policy(false))
            .run(&CancelableScope::root())
            .await
            .unwrap_err();

        let failures = err.failures();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], ReclaimError::BucketDelete { bucket, .. } if *bucket == first));
        // オブジェクトは消えているが、バケットは残る
        assert!(storage.objects(&first).is_empty());
        assert!(storage.buckets(PROJECT).contains(&first));
        assert!(!storage.buckets(PROJECT).contains(&second));
        assert_eq!(
            err.result().outcome_of(&second),
            Some(&BucketOutcome::Deleted { objects: 1, dry_run: false })
        );
    }

    #[tokio::test]
    async fn bucket_listing_failure_aborts_immediately() {
        let storage = Arc::new(InMemoryStorage::new());
        let first = aged("a-first", chrono::Duration::hours(3));
        storage.add_bucket(PROJECT, &first, ["x"]);
        storage.add_bucket(PROJECT, &aged("b-second", chrono::Duration::hours(3)), ["x"]);
        storage.fail_bucket_listing_after(1);

        let err = reclaimer(&storage, policy(false))
            .run(&CancelableScope::root())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SweepError::Enumeration { source: ReclaimError::BucketListing { .. }, .. }
        ));
        // 失敗前に取り出したバケットは処理済み
        assert_eq!(err.result().reclaimed().collect::<Vec<_>>(), vec![first.as_str()]);
        assert_eq!(storage.buckets(PROJECT).len(), 1);
    }

    #[tokio::test]
    async fn dry_run_listing_errors_still_surface() {
        let storage = Arc::new(InMemoryStorage::new());
        let old = aged("old", chrono::Duration::hours(3));
        storage.add_bucket(PROJECT, &old, ["x"]);
        storage.fail_object_listing(&old);

        let err = reclaimer(&storage, policy(true))
            .run(&CancelableScope::root())
            .await
            .unwrap_err();

        assert!(matches!(err.failures()[0], ReclaimError::ObjectListing { .. }));
        assert_eq!(storage.bucket_delete_calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_scope_interrupts_the_sweep() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.add_bucket(PROJECT, &aged("old", chrono::Duration::hours(3)), ["x"]);
        let scope = CancelableScope::root();
        scope.cancel();

        let err = reclaimer(&storage, policy(false))
            .run(&scope)
            .await
            .unwrap_err();

        assert!(matches!(err.failures()[0], ReclaimError::Interrupted { .. }));
        assert_eq!(storage.total_object_delete_calls(), 0);
        assert_eq!(storage.buckets(PROJECT).len(), 1);
    }

    #[tokio::test]
    async fn run_shortcut_uses_system_clock() {
        let storage = Arc::new(InMemoryStorage::new());
        let ancient = format!(
            "ancient-{}",
            format_timestamp_suffix(Utc::now() - chrono::Duration::days(30)).unwrap()
        );
        storage.add_bucket(PROJECT, &ancient, ["x"]);

        let result = run(&CancelableScope::root(), policy(false), storage.clone())
            .await
            .unwrap();

        assert_eq!(result.reclaimed().collect::<Vec<_>>(), vec![ancient.as_str()]);
        assert!(storage.buckets(PROJECT).is_empty());
    }
}
