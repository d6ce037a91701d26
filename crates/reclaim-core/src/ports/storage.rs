//! Storage ports - バケットとオブジェクトのバックエンド
//!
//! 実際のクラウド SDK はこの crate の外側で実装する。
//! 一覧は遅延ストリームで返し、全件をメモリに載せない。
//!
//! # 設計原則
//! - ストリームは有限。エラーを返した後の再開はできない
//! - リトライはアダプタ側の責務（core は 1 回の成功/失敗だけを見る）

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::{BackendError, BucketCandidate};

/// BucketSource はプロジェクト内のバケットを列挙・削除する
#[async_trait]
pub trait BucketSource: Send + Sync {
    /// `project_id` のバケットを遅延列挙する
    fn list_buckets<'a>(
        &'a self,
        project_id: &'a str,
    ) -> BoxStream<'a, Result<BucketCandidate, BackendError>>;

    /// 空になったバケットを削除する
    async fn delete_bucket(&self, bucket: &str) -> Result<(), BackendError>;
}

/// ObjectStore はバケット内のオブジェクトを列挙・削除する
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `bucket` 内のオブジェクト名を遅延列挙する
    fn list_objects<'a>(&'a self, bucket: &'a str) -> BoxStream<'a, Result<String, BackendError>>;

    async fn delete_object(&self, bucket: &str, object: &str) -> Result<(), BackendError>;
}
