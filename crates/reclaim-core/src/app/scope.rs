//! CancelableScope - キャンセル信号とその発火手段のセット
//!
//! `tokio_util::sync::CancellationToken` の薄いラッパ。
//! 子スコープのキャンセルは親や兄弟に伝播しない。親のキャンセルは子に伝播する。

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct CancelableScope {
    token: CancellationToken,
}

impl CancelableScope {
    /// どこにもぶら下がらないスコープ
    pub fn root() -> Self {
        Self::default()
    }

    /// 親のキャンセルだけを受け取る子スコープ
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    /// 冪等。何度呼んでも最初の 1 回と同じ
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// キャンセルされるまで待つ
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
