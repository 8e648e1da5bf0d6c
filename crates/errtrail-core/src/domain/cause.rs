//! Cause - レコードが包んでいるもの
//!
//! # 学習ポイント
//! - グローバルな番兵値の代わりに閉じた enum（`Sentinel`）を使う
//! - 外部エラーは `Box<dyn Error + Send + Sync>` で型を消して保持する

use std::error::Error;
use std::fmt;

/// 所有権付き・スレッド安全な型消去エラー
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// 実際のエラーの代わりに使う固定の目印
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Sentinel {
    /// `ErrorList` を持つ集約ルート
    #[error("Error List")]
    List,

    /// 照合の目印としてだけ作るレコード
    #[error("Test Error")]
    Marker,
}

/// [`Cause`] の種類（中身なし）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CauseKind {
    Foreign,
    List,
    Marker,
}

/// `TracedError` を剥がしたときに出てくるもの
#[derive(Debug)]
pub enum Cause {
    /// クレート外から来た元のエラー（手を加えずに保持）
    Foreign(BoxError),
    Sentinel(Sentinel),
}

impl Cause {
    pub fn kind(&self) -> CauseKind {
        match self {
            Cause::Foreign(_) => CauseKind::Foreign,
            Cause::Sentinel(Sentinel::List) => CauseKind::List,
            Cause::Sentinel(Sentinel::Marker) => CauseKind::Marker,
        }
    }

    pub fn as_error(&self) -> &(dyn Error + 'static) {
        match self {
            Cause::Foreign(err) => err.as_ref(),
            Cause::Sentinel(sentinel) => sentinel,
        }
    }

    /// 外部エラーを返す。番兵なら `None`
    pub fn into_foreign(self) -> Option<BoxError> {
        match self {
            Cause::Foreign(err) => Some(err),
            Cause::Sentinel(_) => None,
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_error(), f)
    }
}
