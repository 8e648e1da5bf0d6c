//! ErrorList - 失敗をスレッド安全に集める
//!
//! # 学習ポイント
//! - 位置の取得（スタック走査）はロックの外、ロックは `push` だけを守る
//! - `parking_lot::Mutex` はポイズニングがないので `lock()` に `unwrap` が要らない
//! - `add` は `#[track_caller]` なので、並行に呼ばれても各エントリの行は呼び出し元になる

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::TracedError;
use super::cause::BoxError;
use crate::app::propagate::{LIST_DEPTH, propagate};
use crate::impls::BacktraceCapture;
use crate::ports::CallSiteCapture;

/// 集約ルートが所有する、追加順の失敗リスト
///
/// 変更操作は `add` だけ。
///
/// # 使用例
/// ```ignore
/// let list = ErrorList::new();
/// list.add(io_err);
/// list.with_entries(|entries| assert_eq!(entries.len(), 1));
/// ```
pub struct ErrorList {
    entries: Mutex<Vec<TracedError>>,
    capture: Arc<dyn CallSiteCapture>,
    depth: usize,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::with_capture(Arc::new(BacktraceCapture::new()), LIST_DEPTH)
    }

    /// `capture` と `depth` でエントリの位置を決めるリスト
    pub fn with_capture(capture: Arc<dyn CallSiteCapture>, depth: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            capture,
            depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// `err` を包んで末尾に追加する。複数スレッドから同時に呼んでよい
    ///
    /// エントリの位置は `add` の呼び出し元。
    #[track_caller]
    #[inline(never)]
    pub fn add<E>(&self, err: E)
    where
        E: Into<BoxError>,
    {
        self.add_at(err.into(), self.depth, Some(Location::caller()));
    }

    #[inline(never)]
    pub(crate) fn add_at(
        &self,
        err: BoxError,
        depth: usize,
        caller: Option<&'static Location<'static>>,
    ) {
        let record = propagate(self.capture.as_ref(), err, depth, caller);
        let id = record.id();
        let len = {
            let mut entries = self.entries.lock();
            entries.push(record);
            entries.len()
        };
        debug!(record = %id, len, "added entry to error list");
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// ロックを保持したまま、追加順のエントリに `f` を適用する
    pub fn with_entries<R>(&self, f: impl FnOnce(&[TracedError]) -> R) -> R {
        let entries = self.entries.lock();
        f(&entries)
    }
}

impl Default for ErrorList {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorList")
            .field("len", &self.len())
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}
