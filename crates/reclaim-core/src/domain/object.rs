//! Bucket / Object の参照型
//!
//! どちらも列挙中にだけ存在する“運搬用”データ。
//! ObjectRef は 1 つの worker にだけ渡され、削除は高々 1 回しか試みない。

use chrono::{DateTime, Utc};
use std::fmt;

/// BucketSource が列挙するバケット候補
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketCandidate {
    name: String,
    created_at: Option<DateTime<Utc>>,
}

impl BucketCandidate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: None,
        }
    }

    /// バックエンドが作成時刻を返せる場合に付与する
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

/// 削除キューを流れるオブジェクト参照
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    bucket: String,
    name: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.name)
    }
}
