//! App - アプリケーション層
//!
//! ports を組み合わせて sweep を実装します。
//!
//! # 主要コンポーネント
//! - **CancelableScope**: キャンセル信号（バケットごとに子スコープ）
//! - **ObjectQueue**: 列挙タスクと worker をつなぐ有界キュー
//! - **DeletionPipeline**: 1 バケット分のオブジェクト並列削除
//! - **BucketReclaimer**: バケットの列挙・判定・削除と失敗の集約

pub mod pipeline;
pub mod queue;
pub mod reclaimer;
pub mod scope;

pub use self::pipeline::{DeletionPipeline, PipelineReport};
pub use self::queue::ObjectQueue;
pub use self::reclaimer::{BucketReclaimer, run};
pub use self::scope::CancelableScope;
