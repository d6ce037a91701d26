//! DeletionPipeline - 1 バケット内の全オブジェクトを並列に削除する
//!
//! # フロー
//! 1. 呼び出し元のスコープから子スコープを作る
//! 2. 列挙タスク 1 本が ObjectRef を有界キューに流す
//! 3. worker N 本がキューから取り出して削除する（dry-run なら記録だけ）
//! 4. 最初の失敗でスコープをキャンセルし、残りのタスクを止める
//! 5. 全タスクの終了を待ってから結果を返す
//!
//! 失敗は 1 バケットにつき高々 1 つだけ返す。キャンセル後に起きた失敗は捨てる。
//! 失敗した場合、キューに残った ObjectRef は処理されずに破棄される。

use std::sync::{Arc, OnceLock};

use futures::StreamExt;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, warn};

use super::queue::{ObjectQueue, ObjectSender};
use super::scope::CancelableScope;
use crate::domain::{ObjectRef, ReclaimError};
use crate::ports::ObjectStore;

/// 1 回のパイプライン実行の集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// キューに流したオブジェクト数
    pub listed: usize,
    /// 削除した（dry-run では削除したことにした）オブジェクト数
    pub deleted: usize,
}

/// DeletionPipeline は worker 数と dry-run フラグだけを持つ
#[derive(Clone)]
pub struct DeletionPipeline {
    objects: Arc<dyn ObjectStore>,
    workers: usize,
    dry_run: bool,
}

impl DeletionPipeline {
    /// `workers` は 1 未満なら 1 に切り上げる
    pub fn new(objects: Arc<dyn ObjectStore>, workers: usize, dry_run: bool) -> Self {
        Self {
            objects,
            workers: workers.max(1),
            dry_run,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// `bucket` を空にする
    ///
    /// 成功は「全オブジェクトの削除を確認できた」ときだけ。
    /// 親スコープがキャンセルされた場合は `ReclaimError::Cancelled` を返す。
    pub async fn run(
        &self,
        parent: &CancelableScope,
        bucket: &str,
    ) -> Result<PipelineReport, ReclaimError> {
        let scope = parent.child();
        let failure = Arc::new(FirstFailure::new(scope.clone()));
        let (tx, queue) = ObjectQueue::bounded(self.workers);

        let mut tasks = JoinSet::new();
        tasks.spawn(
            enumerate(
                Arc::clone(&self.objects),
                bucket.to_string(),
                tx,
                scope.clone(),
                Arc::clone(&failure),
            )
            .in_current_span(),
        );
        for worker_id in 0..self.workers {
            tasks.spawn(
                drain(
                    worker_id,
                    Arc::clone(&self.objects),
                    queue.clone(),
                    scope.clone(),
                    Arc::clone(&failure),
                    self.dry_run,
                )
                .in_current_span(),
            );
        }

        // ここが唯一の合流点。全タスクが終わるまで抜けない
        let mut report = PipelineReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(TaskExit::Listed(n)) => report.listed = n,
                Ok(TaskExit::Deleted(n)) => report.deleted += n,
                Err(e) => failure.report(ReclaimError::TaskFailed {
                    bucket: bucket.to_string(),
                    abandoned: 0,
                    message: e.to_string(),
                }),
            }
        }

        let abandoned = queue.abandon().await;
        // タスクは全て終わっているので参照はここだけ
        let first = Arc::into_inner(failure).and_then(FirstFailure::into_inner);
        if let Some(err) = first {
            warn!(
                bucket,
                deleted = report.deleted,
                abandoned,
                error = %err,
                "object deletion stopped"
            );
            return Err(err.with_abandoned(abandoned));
        }
        if scope.is_cancelled() {
            warn!(bucket, deleted = report.deleted, abandoned, "object deletion cancelled");
            return Err(ReclaimError::Cancelled {
                bucket: bucket.to_string(),
                abandoned,
            });
        }
        Ok(report)
    }
}

enum TaskExit {
    Listed(usize),
    Deleted(usize),
}

/// 最初の失敗だけを保持し、同時にスコープをキャンセルする
struct FirstFailure {
    slot: OnceLock<ReclaimError>,
    scope: CancelableScope,
}

impl FirstFailure {
    fn new(scope: CancelableScope) -> Self {
        Self {
            slot: OnceLock::new(),
            scope,
        }
    }

    fn report(&self, err: ReclaimError) {
        match self.slot.set(err) {
            Ok(()) => self.scope.cancel(),
            Err(dropped) => debug!(error = %dropped, "dropping error reported after cancellation"),
        }
    }

    fn into_inner(self) -> Option<ReclaimError> {
        self.slot.into_inner()
    }
}

/// オブジェクト名をキューに流す。キャンセルされたら即座にやめる
async fn enumerate(
    objects: Arc<dyn ObjectStore>,
    bucket: String,
    tx: ObjectSender,
    scope: CancelableScope,
    failure: Arc<FirstFailure>,
) -> TaskExit {
    let mut listed = 0;
    let mut names = objects.list_objects(&bucket);
    loop {
        let next = tokio::select! {
            biased;
            _ = scope.cancelled() => break,
            next = names.next() => next,
        };
        let name = match next {
            None => break,
            Some(Ok(name)) => name,
            Some(Err(source)) => {
                failure.report(ReclaimError::ObjectListing {
                    bucket: bucket.clone(),
                    abandoned: 0,
                    source,
                });
                break;
            }
        };
        // 誰も取り出さないキューに書き込み続けて詰まらないよう、送信もキャンセルと競合させる
        tokio::select! {
            biased;
            _ = scope.cancelled() => break,
            sent = tx.send(ObjectRef::new(bucket.as_str(), name)) => {
                if sent.is_err() {
                    break;
                }
            }
        }
        listed += 1;
    }
    debug!(bucket = %bucket, listed, "object listing finished");
    TaskExit::Listed(listed)
}

async fn drain(
    worker_id: usize,
    objects: Arc<dyn ObjectStore>,
    queue: ObjectQueue,
    scope: CancelableScope,
    failure: Arc<FirstFailure>,
    dry_run: bool,
) -> TaskExit {
    let mut deleted = 0;
    loop {
        let object = tokio::select! {
            biased;
            _ = scope.cancelled() => break,
            next = queue.next() => match next {
                Some(object) => object,
                None => break,
            },
        };

        if dry_run {
            debug!(worker_id, object = %object, dry_run = true, "object deleted");
            deleted += 1;
            continue;
        }

        let result = tokio::select! {
            biased;
            _ = scope.cancelled() => break,
            result = objects.delete_object(object.bucket(), object.name()) => result,
        };
        match result {
            Ok(()) => {
                debug!(worker_id, object = %object, "object deleted");
                deleted += 1;
            }
            Err(source) => {
                failure.report(ReclaimError::ObjectDelete {
                    bucket: object.bucket().to_string(),
                    object: object.name().to_string(),
                    abandoned: 0,
                    source,
                });
                break;
            }
        }
    }
    TaskExit::Deleted(deleted)
}
