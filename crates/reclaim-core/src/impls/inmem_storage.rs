//! InMemoryStorage - 開発・テスト用のストレージバックエンド
//!
//! # 学習ポイント
//! - `std::sync::Mutex` は await を跨がない短い区間だけ握る
//! - `futures::stream::unfold` + カーソルで「遅延」列挙を再現する
//! - 失敗注入（failure injection）で各不変条件をテストできるようにする

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};

use crate::domain::{BackendError, BucketCandidate};
use crate::ports::{BucketSource, ObjectStore};

#[derive(Debug, Default)]
struct StoredBucket {
    project: String,
    objects: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct State {
    /// バケット名はグローバルに一意
    buckets: BTreeMap<String, StoredBucket>,
    failing_object_deletes: HashSet<(String, String)>,
    failing_bucket_deletes: HashSet<String>,
    failing_object_listings: HashSet<String>,
    /// 何件返した後に一覧を失敗させるか
    bucket_listing_fails_after: Option<usize>,
    object_delete_latency: Option<Duration>,
    object_delete_attempts: HashMap<(String, String), usize>,
    bucket_delete_calls: usize,
}

/// InMemoryStorage は BucketSource と ObjectStore の両方を実装する
///
/// # 使用例
/// ```
/// use reclaim_core::impls::InMemoryStorage;
///
/// let storage = InMemoryStorage::new();
/// storage.add_bucket("project", "bucket-1", ["a.txt", "b.txt"]);
/// storage.fail_object_delete("bucket-1", "b.txt");
/// assert_eq!(storage.objects("bucket-1").len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    state: Mutex<State>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// バケットを作る（既にあればオブジェクトを追加する）
    pub fn add_bucket<I, S>(&self, project: &str, bucket: &str, objects: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.lock();
        let stored = state
            .buckets
            .entry(bucket.to_string())
            .or_insert_with(|| StoredBucket {
                project: project.to_string(),
                objects: BTreeSet::new(),
            });
        stored.objects.extend(objects.into_iter().map(Into::into));
    }

    pub fn fail_object_delete(&self, bucket: &str, object: &str) {
        self.lock()
            .failing_object_deletes
            .insert((bucket.to_string(), object.to_string()));
    }

    pub fn fail_bucket_delete(&self, bucket: &str) {
        self.lock().failing_bucket_deletes.insert(bucket.to_string());
    }

    pub fn fail_object_listing(&self, bucket: &str) {
        self.lock().failing_object_listings.insert(bucket.to_string());
    }

    pub fn fail_bucket_listing_after(&self, yielded: usize) {
        self.lock().bucket_listing_fails_after = Some(yielded);
    }

    pub fn set_object_delete_latency(&self, latency: Duration) {
        self.lock().object_delete_latency = Some(latency);
    }

    /// `project` のバケット名（昇順）
    pub fn buckets(&self, project: &str) -> Vec<String> {
        self.lock()
            .buckets
            .iter()
            .filter(|(_, b)| b.project == project)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// `bucket` のオブジェクト名（昇順）。バケットがなければ空
    pub fn objects(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .buckets
            .get(bucket)
            .map(|b| b.objects.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 全バケット・全オブジェクトのスナップショット
    pub fn snapshot(&self) -> BTreeMap<String, Vec<String>> {
        self.lock()
            .buckets
            .iter()
            .map(|(name, b)| (name.clone(), b.objects.iter().cloned().collect()))
            .collect()
    }

    pub fn delete_attempts(&self, bucket: &str, object: &str) -> usize {
        self.lock()
            .object_delete_attempts
            .get(&(bucket.to_string(), object.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_object_delete_calls(&self) -> usize {
        self.lock().object_delete_attempts.values().sum()
    }

    pub fn bucket_delete_calls(&self) -> usize {
        self.lock().bucket_delete_calls
    }

    fn next_bucket(
        &self,
        project: &str,
        cursor: &Option<String>,
        yielded: usize,
    ) -> Option<Result<BucketCandidate, BackendError>> {
        let state = self.lock();
        if state.bucket_listing_fails_after == Some(yielded) {
            return Some(Err(format!("listing buckets of {project}: injected failure").into()));
        }
        let lower = match cursor {
            Some(last) => Bound::Excluded(last.clone()),
            None => Bound::Unbounded,
        };
        state
            .buckets
            .range((lower, Bound::Unbounded))
            .find(|(_, b)| b.project == project)
            .map(|(name, _)| Ok(BucketCandidate::new(name.clone())))
    }

    fn next_object(
        &self,
        bucket: &str,
        cursor: &Option<String>,
    ) -> Option<Result<String, BackendError>> {
        let state = self.lock();
        if state.failing_object_listings.contains(bucket) {
            return Some(Err(format!("listing objects of {bucket}: injected failure").into()));
        }
        let Some(stored) = state.buckets.get(bucket) else {
            return Some(Err(format!("bucket {bucket} not found").into()));
        };
        let lower = match cursor {
            Some(last) => Bound::Excluded(last.clone()),
            None => Bound::Unbounded,
        };
        stored
            .objects
            .range((lower, Bound::Unbounded))
            .next()
            .map(|name| Ok(name.clone()))
    }
}

/// カーソル。`done` になったら以降は何も返さない
struct Cursor {
    last: Option<String>,
    yielded: usize,
    done: bool,
}

impl Cursor {
    fn start() -> Self {
        Self {
            last: None,
            yielded: 0,
            done: false,
        }
    }
}

#[async_trait]
impl BucketSource for InMemoryStorage {
    fn list_buckets<'a>(
        &'a self,
        project_id: &'a str,
    ) -> BoxStream<'a, Result<BucketCandidate, BackendError>> {
        stream::unfold(Cursor::start(), move |mut cursor| async move {
            if cursor.done {
                return None;
            }
            let item = self.next_bucket(project_id, &cursor.last, cursor.yielded)?;
            match &item {
                Ok(candidate) => {
                    cursor.last = Some(candidate.name().to_string());
                    cursor.yielded += 1;
                }
                Err(_) => cursor.done = true,
            }
            Some((item, cursor))
        })
        .boxed()
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.bucket_delete_calls += 1;
        if state.failing_bucket_deletes.contains(bucket) {
            return Err(format!("deleting bucket {bucket}: injected failure").into());
        }
        let is_empty = match state.buckets.get(bucket) {
            None => return Err(format!("bucket {bucket} not found").into()),
            Some(stored) => stored.objects.is_empty(),
        };
        if !is_empty {
            return Err(format!("bucket {bucket} is not empty").into());
        }
        state.buckets.remove(bucket);
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for InMemoryStorage {
    fn list_objects<'a>(&'a self, bucket: &'a str) -> BoxStream<'a, Result<String, BackendError>> {
        stream::unfold(Cursor::start(), move |mut cursor| async move {
            if cursor.done {
                return None;
            }
            let item = self.next_object(bucket, &cursor.last)?;
            match &item {
                Ok(name) => cursor.last = Some(name.clone()),
                Err(_) => cursor.done = true,
            }
            Some((item, cursor))
        })
        .boxed()
    }

    async fn delete_object(&self, bucket: &str, object: &str) -> Result<(), BackendError> {
        let key = (bucket.to_string(), object.to_string());
        let latency = {
            let mut state = self.lock();
            *state.object_delete_attempts.entry(key.clone()).or_default() += 1;
            state.object_delete_latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        if state.failing_object_deletes.contains(&key) {
            return Err(format!("deleting {bucket}/{object}: injected failure").into());
        }
        let removed = state
            .buckets
            .get_mut(bucket)
            .is_some_and(|stored| stored.objects.remove(object));
        if removed {
            Ok(())
        } else {
            Err(format!("object {bucket}/{object} not found").into())
        }
    }
}
