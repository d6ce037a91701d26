//! Impls - ports の実装
//!
//! - **InMemoryStorage**: テスト・開発用（失敗注入つき）
//! - **LocalFsStorage**: ローカルディレクトリをバケットに見立てる

pub mod inmem_storage;
pub mod local_fs;

pub use self::inmem_storage::InMemoryStorage;
pub use self::local_fs::LocalFsStorage;
