//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（GCS などのオブジェクトストレージ、時計）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod clock;
pub mod storage;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::storage::{BucketSource, ObjectStore};
