//! Outcome model: per-bucket results of one sweep.
//!
//! `SweepResult` is built incrementally by the reclaimer and is handed to the
//! caller once the last bucket is done (or the sweep is aborted).

use serde::Serialize;

use super::classifier::SkipReason;

/// The final outcome of one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BucketOutcome {
    /// Every object and then the bucket itself were deleted.
    /// Under dry-run nothing was touched, but the bucket is still reported here.
    Deleted { objects: usize, dry_run: bool },

    /// Intentionally left alone by the classifier.
    Skipped(SkipReason),

    /// Object deletion or bucket deletion failed.
    Errored { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketReport {
    pub bucket: String,
    #[serde(flatten)]
    pub outcome: BucketOutcome,
}

/// Ordered per-bucket outcomes, in BucketSource iteration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepResult {
    buckets: Vec<BucketReport>,
}

impl SweepResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, bucket: impl Into<String>, outcome: BucketOutcome) {
        self.buckets.push(BucketReport {
            bucket: bucket.into(),
            outcome,
        });
    }

    pub fn buckets(&self) -> &[BucketReport] {
        &self.buckets
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn outcome_of(&self, bucket: &str) -> Option<&BucketOutcome> {
        self.buckets
            .iter()
            .find(|r| r.bucket == bucket)
            .map(|r| &r.outcome)
    }

    pub fn reclaimed(&self) -> impl Iterator<Item = &str> {
        self.names_where(|o| matches!(o, BucketOutcome::Deleted { .. }))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.names_where(|o| matches!(o, BucketOutcome::Skipped(_)))
    }

    pub fn errored(&self) -> impl Iterator<Item = &str> {
        self.names_where(|o| matches!(o, BucketOutcome::Errored { .. }))
    }

    fn names_where(&self, pred: fn(&BucketOutcome) -> bool) -> impl Iterator<Item = &str> {
        self.buckets
            .iter()
            .filter(move |r| pred(&r.outcome))
            .map(|r| r.bucket.as_str())
    }
}
