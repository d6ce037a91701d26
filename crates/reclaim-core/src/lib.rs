//! reclaim-core
//!
//! Core building blocks for the expiring-bucket reclaimer.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（policy, classifier, outcome, state, errors）
//! - **ports**: 抽象化レイヤー（BucketSource, ObjectStore, Clock）
//! - **app**: アプリケーションロジック（scope, queue, pipeline, reclaimer）
//! - **impls**: 実装（InMemoryStorage, LocalFsStorage）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{BucketReclaimer, CancelableScope, run};
pub use domain::{Policy, PolicyError, ReclaimError, SweepError, SweepResult};
