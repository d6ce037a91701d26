//! LocalFsStorage - ローカルディレクトリをオブジェクトストレージに見立てる
//!
//! - ルート直下のディレクトリ 1 つが 1 バケット（ルート自体がプロジェクト）
//! - バケット配下のファイルがオブジェクト。名前はバケットからの相対パス（`/` 区切り）
//! - バケットの削除は、ファイルが 1 つも残っていない場合だけ成功する

use std::path::{Component, Path, PathBuf};

use async_stream::stream;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use tracing::trace;

use crate::domain::{BackendError, BucketCandidate};
use crate::ports::{BucketSource, ObjectStore};

#[derive(Debug, Clone)]
pub struct LocalFsStorage {
    root: PathBuf,
}

impl LocalFsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, BackendError> {
        let valid = !bucket.is_empty()
            && bucket != "."
            && bucket != ".."
            && !bucket.contains(['/', '\\']);
        if !valid {
            return Err(format!("invalid bucket name {bucket:?}").into());
        }
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, object: &str) -> Result<PathBuf, BackendError> {
        let relative = Path::new(object);
        let valid = !object.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(format!("invalid object name {object:?}").into());
        }
        Ok(self.bucket_dir(bucket)?.join(relative))
    }
}

#[async_trait]
impl BucketSource for LocalFsStorage {
    fn list_buckets<'a>(
        &'a self,
        project_id: &'a str,
    ) -> BoxStream<'a, Result<BucketCandidate, BackendError>> {
        Box::pin(stream! {
            trace!(project = project_id, root = %self.root.display(), "listing buckets");
            let mut entries = match tokio::fs::read_dir(&self.root).await {
                Ok(entries) => entries,
                Err(e) => {
                    yield Err(BackendError::from(e));
                    return;
                }
            };
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(BackendError::from(e));
                        return;
                    }
                };
                let metadata = match entry.metadata().await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        yield Err(BackendError::from(e));
                        return;
                    }
                };
                if !metadata.is_dir() {
                    continue;
                }
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                let mut candidate = BucketCandidate::new(name);
                if let Ok(created) = metadata.created() {
                    candidate = candidate.with_created_at(DateTime::<Utc>::from(created));
                }
                yield Ok(candidate);
            }
        })
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<(), BackendError> {
        let dir = self.bucket_dir(bucket)?;
        tokio::task::spawn_blocking(move || remove_empty_tree(&dir))
            .await
            .map_err(BackendError::from)?
    }
}

#[async_trait]
impl ObjectStore for LocalFsStorage {
    fn list_objects<'a>(&'a self, bucket: &'a str) -> BoxStream<'a, Result<String, BackendError>> {
        Box::pin(stream! {
            let base = match self.bucket_dir(bucket) {
                Ok(base) => base,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            // 深さ優先。ディレクトリ単位で読むので全件をメモリに載せない
            let mut pending = vec![base.clone()];
            while let Some(dir) = pending.pop() {
                let mut entries = match tokio::fs::read_dir(&dir).await {
                    Ok(entries) => entries,
                    Err(e) => {
                        yield Err(BackendError::from(e));
                        return;
                    }
                };
                loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break,
                        Err(e) => {
                            yield Err(BackendError::from(e));
                            return;
                        }
                    };
                    let path = entry.path();
                    let file_type = match entry.file_type().await {
                        Ok(file_type) => file_type,
                        Err(e) => {
                            yield Err(BackendError::from(e));
                            return;
                        }
                    };
                    if file_type.is_dir() {
                        pending.push(path);
                        continue;
                    }
                    match object_name(&base, &path) {
                        Some(name) => yield Ok(name),
                        None => {
                            yield Err(format!("unrepresentable object path {}", path.display()).into());
                            return;
                        }
                    }
                }
            }
        })
    }

    async fn delete_object(&self, bucket: &str, object: &str) -> Result<(), BackendError> {
        let path = self.object_path(bucket, object)?;
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }
}

/// `base` からの相対パスを `/` 区切りの名前にする
fn object_name(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

/// ディレクトリだけで構成された木を下から削除する。ファイルがあれば失敗
fn remove_empty_tree(dir: &Path) -> Result<(), BackendError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            remove_empty_tree(&entry.path())?;
        } else {
            return Err(format!(
                "bucket directory {} is not empty: {}",
                dir.display(),
                entry.path().display()
            )
            .into());
        }
    }
    std::fs::remove_dir(dir)?;
    Ok(())
}
