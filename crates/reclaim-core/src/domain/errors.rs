//! Errors - sweep 中のエラー分類
//!
//! - バケット単位のエラー（ObjectListing / ObjectDelete / BucketDelete / Cancelled / TaskFailed）は
//!   その場で回収され、sweep は続行する
//! - BucketListing だけが sweep 全体を即座に止める

use std::fmt;

use super::outcome::SweepResult;

/// ポート境界を越えるバックエンドのエラー
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// ReclaimError は 1 回の操作の失敗
#[derive(Debug, thiserror::Error)]
pub enum ReclaimError {
    #[error("listing buckets of project {project}: {source}")]
    BucketListing {
        project: String,
        #[source]
        source: BackendError,
    },

    #[error("listing objects of bucket {bucket}{}: {source}", AbandonedNote(.abandoned))]
    ObjectListing {
        bucket: String,
        abandoned: usize,
        #[source]
        source: BackendError,
    },

    #[error("deleting object {object} of bucket {bucket}{}: {source}", AbandonedNote(.abandoned))]
    ObjectDelete {
        bucket: String,
        object: String,
        abandoned: usize,
        #[source]
        source: BackendError,
    },

    #[error("deleting bucket {bucket}: {source}")]
    BucketDelete {
        bucket: String,
        #[source]
        source: BackendError,
    },

    #[error("bucket {bucket}: object deletion cancelled{}", AbandonedNote(.abandoned))]
    Cancelled { bucket: String, abandoned: usize },

    #[error("bucket {bucket}: deletion task failed{}: {message}", AbandonedNote(.abandoned))]
    TaskFailed {
        bucket: String,
        abandoned: usize,
        message: String,
    },

    #[error("sweep of project {project} interrupted")]
    Interrupted { project: String },
}

impl ReclaimError {
    /// エラーが属するバケット（プロジェクト単位のエラーは None）
    pub fn bucket(&self) -> Option<&str> {
        match self {
            ReclaimError::ObjectListing { bucket, .. }
            | ReclaimError::ObjectDelete { bucket, .. }
            | ReclaimError::BucketDelete { bucket, .. }
            | ReclaimError::Cancelled { bucket, .. }
            | ReclaimError::TaskFailed { bucket, .. } => Some(bucket),
            ReclaimError::BucketListing { .. } | ReclaimError::Interrupted { .. } => None,
        }
    }

    /// キューに積まれたまま処理されなかったオブジェクト数
    pub fn abandoned(&self) -> usize {
        match self {
            ReclaimError::ObjectListing { abandoned, .. }
            | ReclaimError::ObjectDelete { abandoned, .. }
            | ReclaimError::Cancelled { abandoned, .. }
            | ReclaimError::TaskFailed { abandoned, .. } => *abandoned,
            _ => 0,
        }
    }

    /// バケット単位のエラーに未処理オブジェクト数を書き込む。それ以外はそのまま
    pub(crate) fn with_abandoned(mut self, count: usize) -> Self {
        match &mut self {
            ReclaimError::ObjectListing { abandoned, .. }
            | ReclaimError::ObjectDelete { abandoned, .. }
            | ReclaimError::Cancelled { abandoned, .. }
            | ReclaimError::TaskFailed { abandoned, .. } => *abandoned = count,
            _ => {}
        }
        self
    }
}

struct AbandonedNote<'a>(&'a usize);

impl fmt::Display for AbandonedNote<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self.0 {
            0 => Ok(()),
            n => write!(f, " ({n} queued objects abandoned)"),
        }
    }
}

/// SweepError は sweep 全体の失敗。どちらの場合も（途中までの）SweepResult を持つ
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    /// バケット一覧の取得に失敗。これ以上候補を見つけられないので即座に中断
    #[error("sweep aborted: {source}")]
    Enumeration {
        result: SweepResult,
        #[source]
        source: ReclaimError,
    },

    /// 1 つ以上のバケットで失敗。メッセージは改行区切りで連結
    #[error("{}", JoinedErrors(.failures))]
    Buckets {
        result: SweepResult,
        failures: Vec<ReclaimError>,
    },
}

impl SweepError {
    pub fn result(&self) -> &SweepResult {
        match self {
            SweepError::Enumeration { result, .. } | SweepError::Buckets { result, .. } => result,
        }
    }

    pub fn into_result(self) -> SweepResult {
        match self {
            SweepError::Enumeration { result, .. } | SweepError::Buckets { result, .. } => result,
        }
    }

    pub fn failures(&self) -> Vec<&ReclaimError> {
        match self {
            SweepError::Enumeration { source, .. } => vec![source],
            SweepError::Buckets { failures, .. } => failures.iter().collect(),
        }
    }
}

struct JoinedErrors<'a>(&'a [ReclaimError]);

impl fmt::Display for JoinedErrors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}
