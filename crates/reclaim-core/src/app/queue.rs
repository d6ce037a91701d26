//! ObjectQueue - 1 バケット分の削除キュー
//!
//! 列挙タスク 1 本が書き込み、worker N 本が取り出す。
//! `mpsc::Receiver` は単一消費者なので内部で `Mutex` に包んで共有する。
//! 呼び出し側がロックを意識する必要はない。

use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use crate::domain::ObjectRef;

/// worker 1 本あたりのキュー容量
pub const SLOTS_PER_WORKER: usize = 4;

/// 書き込み側。全て drop されるとキューが閉じる
pub type ObjectSender = mpsc::Sender<ObjectRef>;

/// 取り出し側。clone して worker に配る
#[derive(Debug, Clone)]
pub struct ObjectQueue {
    rx: Arc<Mutex<mpsc::Receiver<ObjectRef>>>,
}

impl ObjectQueue {
    /// `workers` 本の worker に見合った容量の有界キューを作る
    pub fn bounded(workers: usize) -> (ObjectSender, ObjectQueue) {
        let capacity = workers.max(1).saturating_mul(SLOTS_PER_WORKER);
        let (tx, rx) = mpsc::channel(capacity);
        (
            tx,
            ObjectQueue {
                rx: Arc::new(Mutex::new(rx)),
            },
        )
    }

    /// 次の ObjectRef。キューが閉じて空なら None
    ///
    /// cancel-safe: `select!` で落とされても取り出し済みの要素は失われない
    pub async fn next(&self) -> Option<ObjectRef> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }

    /// キューを閉じて、残っていた（誰も処理しなかった）要素数を返す
    pub async fn abandon(&self) -> usize {
        let mut rx = self.rx.lock().await;
        rx.close();
        let mut abandoned = 0;
        while rx.try_recv().is_ok() {
            abandoned += 1;
        }
        abandoned
    }
}
