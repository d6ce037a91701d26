//! Policy - 1 回の sweep の設定
//!
//! # Fail-fast 設計
//! - `PolicyBuilder::build()` で全項目を検証してから `Policy` を作る
//! - 一度作った `Policy` は変更できない

use regex::Regex;
use std::collections::BTreeSet;
use std::time::Duration;

/// バケットの寿命のデフォルト値
pub const DEFAULT_LIFESPAN: Duration = Duration::from_secs(2 * 60 * 60);

/// バケットごとのオブジェクト削除 worker 数のデフォルト値
pub const DEFAULT_WORKER_COUNT: usize = 10;

/// PolicyError は設定の検証エラー
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("project id must not be empty")]
    EmptyProjectId,

    #[error("bucket name pattern is required")]
    MissingBucketNamePattern,

    #[error("invalid bucket name pattern: {0}")]
    InvalidBucketNamePattern(#[from] regex::Error),

    #[error("bucket name pattern {pattern:?} must have exactly one capture group, found {found}")]
    CaptureGroupCount { pattern: String, found: usize },

    #[error("worker count must be at least 1")]
    ZeroWorkers,
}

/// Policy は不変の sweep 設定
#[derive(Debug, Clone)]
pub struct Policy {
    project_id: String,
    bucket_name_regex: Regex,
    excluded_names: BTreeSet<String>,
    lifespan: Duration,
    dry_run: bool,
    worker_count: usize,
}

impl Policy {
    pub fn builder(project_id: impl Into<String>) -> PolicyBuilder {
        PolicyBuilder::new(project_id)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn bucket_name_regex(&self) -> &Regex {
        &self.bucket_name_regex
    }

    pub fn excluded_names(&self) -> &BTreeSet<String> {
        &self.excluded_names
    }

    pub fn is_excluded(&self, bucket_name: &str) -> bool {
        self.excluded_names.contains(bucket_name)
    }

    pub fn lifespan(&self) -> Duration {
        self.lifespan
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// 常に 1 以上
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}

/// PolicyBuilder は Policy を組み立てる
///
/// # 使用例
/// ```
/// use reclaim_core::domain::Policy;
/// use std::time::Duration;
///
/// let policy = Policy::builder("my-project")
///     .bucket_name_pattern(r"^.+-([a-z0-9]+)$")
///     .exclude(["protected-bucket"])
///     .lifespan(Duration::from_secs(3600))
///     .workers(4)
///     .build()?;
/// assert_eq!(policy.worker_count(), 4);
/// # Ok::<(), reclaim_core::domain::PolicyError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    project_id: String,
    bucket_name_pattern: Option<String>,
    excluded_names: BTreeSet<String>,
    lifespan: Duration,
    dry_run: bool,
    worker_count: usize,
}

impl PolicyBuilder {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            bucket_name_pattern: None,
            excluded_names: BTreeSet::new(),
            lifespan: DEFAULT_LIFESPAN,
            dry_run: false,
            worker_count: DEFAULT_WORKER_COUNT,
        }
    }

    /// タイムスタンプ部分をちょうど 1 つのキャプチャグループで囲んだ正規表現
    pub fn bucket_name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.bucket_name_pattern = Some(pattern.into());
        self
    }

    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn lifespan(mut self, lifespan: Duration) -> Self {
        self.lifespan = lifespan;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn build(self) -> Result<Policy, PolicyError> {
        if self.project_id.trim().is_empty() {
            return Err(PolicyError::EmptyProjectId);
        }
        let pattern = self
            .bucket_name_pattern
            .filter(|p| !p.is_empty())
            .ok_or(PolicyError::MissingBucketNamePattern)?;
        let bucket_name_regex = Regex::new(&pattern)?;
        // captures_len() は暗黙のグループ 0 を含む
        let found = bucket_name_regex.captures_len() - 1;
        if found != 1 {
            return Err(PolicyError::CaptureGroupCount { pattern, found });
        }
        if self.worker_count == 0 {
            return Err(PolicyError::ZeroWorkers);
        }
        Ok(Policy {
            project_id: self.project_id,
            bucket_name_regex,
            excluded_names: self.excluded_names,
            lifespan: self.lifespan,
            dry_run: self.dry_run,
            worker_count: self.worker_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const PATTERN: &str = r"^.+-([a-z0-9]+)$";

    #[test]
    fn test_build_with_defaults() {
        let policy = Policy::builder("test")
            .bucket_name_pattern(PATTERN)
            .build()
            .unwrap();
        assert_eq!(policy.project_id(), "test");
        assert_eq!(policy.lifespan(), DEFAULT_LIFESPAN);
        assert_eq!(policy.worker_count(), DEFAULT_WORKER_COUNT);
        assert!(!policy.dry_run());
        assert!(policy.excluded_names().is_empty());
    }

    #[test]
    fn test_build_collects_excluded_names() {
        let policy = Policy::builder("test3")
            .bucket_name_pattern(PATTERN)
            .exclude(["test4", "test5"])
            .exclude(vec!["test6".to_string()])
            .lifespan(Duration::from_secs(60))
            .dry_run(true)
            .build()
            .unwrap();
        assert!(policy.is_excluded("test4"));
        assert!(policy.is_excluded("test6"));
        assert!(!policy.is_excluded("test7"));
        assert_eq!(policy.lifespan(), Duration::from_secs(60));
        assert!(policy.dry_run());
    }

    #[test]
    fn test_build_empty_project() {
        let err = Policy::builder("  ")
            .bucket_name_pattern(PATTERN)
            .build()
            .unwrap_err();
        assert!(matches!(err, PolicyError::EmptyProjectId));
    }

    #[test]
    fn test_build_missing_pattern() {
        let err = Policy::builder("test4").build().unwrap_err();
        assert!(matches!(err, PolicyError::MissingBucketNamePattern));
    }

    #[test]
    fn test_build_invalid_pattern() {
        let err = Policy::builder("test5")
            .bucket_name_pattern("[aa)@")
            .build()
            .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidBucketNamePattern(_)));
    }

    #[rstest]
    #[case::no_group("^bucket-[a-z0-9]+$", 0)]
    #[case::two_groups("^(.+)-([a-z0-9]+)$", 2)]
    fn test_build_wrong_capture_group_count(#[case] pattern: &str, #[case] expected: usize) {
        let err = Policy::builder("test")
            .bucket_name_pattern(pattern)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyError::CaptureGroupCount { found, .. } if found == expected
        ));
    }

    #[test]
    fn test_build_non_capturing_group_is_not_counted() {
        let policy = Policy::builder("test")
            .bucket_name_pattern(r"^(?:prow|ci)-.+-([a-z0-9]+)$")
            .build();
        assert!(policy.is_ok());
    }

    #[test]
    fn test_build_zero_workers() {
        let err = Policy::builder("test")
            .bucket_name_pattern(PATTERN)
            .workers(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, PolicyError::ZeroWorkers));
    }
}
