//! TracerBuilder - キャプチャ設定の構築
//!
//! # 学習ポイント
//! - Builder パターン
//! - 起動時検証（Fail-fast 設計）
//! - capture が `Arc<dyn>` でも、file / line は `Tracer::wrap` の `#[track_caller]` で決まる

use std::fmt;
use std::panic::Location;
use std::path::PathBuf;
use std::sync::Arc;

use super::propagate::{LIST_DEPTH, WRAP_DEPTH, propagate};
use crate::domain::{BoxError, ErrorList, TracedError};
use crate::impls::BacktraceCapture;
use crate::ports::CallSiteCapture;

/// TracerBuilder はレコードの位置の取り方を組み立てる
///
/// # 使用例
/// ```ignore
/// let tracer = Tracer::builder()
///     .strip_prefix(env!("CARGO_MANIFEST_DIR"))
///     .build()?;
/// let err = tracer.wrap(io_err);
/// ```
pub struct TracerBuilder {
    wrap_depth: usize,
    list_depth: usize,
    strip_prefix: Option<PathBuf>,
    capture: Option<Arc<dyn CallSiteCapture>>,
}

/// 設定の組み合わせが成立しないときのエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("{setting} must be at least 1, got {depth}")]
    DepthTooShallow { setting: &'static str, depth: usize },

    #[error("strip_prefix only applies to the built-in backtrace capture, not a custom one")]
    ConflictingCapture,
}

impl TracerBuilder {
    pub fn new() -> Self {
        Self {
            wrap_depth: WRAP_DEPTH,
            list_depth: LIST_DEPTH,
            strip_prefix: None,
            capture: None,
        }
    }

    /// [`Tracer::wrap`] が関数名の解決に使う depth
    pub fn wrap_depth(mut self, depth: usize) -> Self {
        self.wrap_depth = depth;
        self
    }

    /// [`Tracer::new_aggregate_root`] で作るリストの depth
    pub fn list_depth(mut self, depth: usize) -> Self {
        self.list_depth = depth;
        self
    }

    pub fn strip_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.strip_prefix = Some(prefix.into());
        self
    }

    pub fn capture(mut self, capture: impl CallSiteCapture + 'static) -> Self {
        self.capture = Some(Arc::new(capture));
        self
    }

    /// 設定を検証して [`Tracer`] を作る
    ///
    /// depth 0 はこのクレート内部のフレームを指すので、どちらの depth でも拒否する。
    pub fn build(self) -> Result<Tracer, BuildError> {
        for (setting, depth) in [("wrap_depth", self.wrap_depth), ("list_depth", self.list_depth)] {
            if depth == 0 {
                return Err(BuildError::DepthTooShallow { setting, depth });
            }
        }
        let capture: Arc<dyn CallSiteCapture> = match (self.capture, self.strip_prefix) {
            (Some(_), Some(_)) => return Err(BuildError::ConflictingCapture),
            (Some(capture), None) => capture,
            (None, Some(prefix)) => Arc::new(BacktraceCapture::with_strip_prefix(prefix)),
            (None, None) => Arc::new(BacktraceCapture::new()),
        };
        Ok(Tracer {
            capture,
            wrap_depth: self.wrap_depth,
            list_depth: self.list_depth,
        })
    }
}

impl Default for TracerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracer は設定済みのエントリポイント一式
///
/// depth の意味は `app::propagate` の関数と同じ。
/// `Clone` は `Arc` の複製だけなので、タスクごとに持たせてよい。
#[derive(Clone)]
pub struct Tracer {
    capture: Arc<dyn CallSiteCapture>,
    wrap_depth: usize,
    list_depth: usize,
}

impl Tracer {
    pub fn builder() -> TracerBuilder {
        TracerBuilder::new()
    }

    pub fn wrap_depth(&self) -> usize {
        self.wrap_depth
    }

    pub fn list_depth(&self) -> usize {
        self.list_depth
    }

    /// file / line は呼び出し元の `Location`、関数名は `wrap_depth` の走査から取る
    #[track_caller]
    #[inline(never)]
    pub fn wrap<E>(&self, err: E) -> TracedError
    where
        E: Into<BoxError>,
    {
        propagate(
            self.capture.as_ref(),
            err.into(),
            self.wrap_depth,
            Some(Location::caller()),
        )
    }

    #[inline(never)]
    pub fn wrap_to_depth<E>(&self, err: E, depth: usize) -> TracedError
    where
        E: Into<BoxError>,
    {
        propagate(self.capture.as_ref(), err.into(), depth, None)
    }

    /// この Tracer の capture を共有するリストを持つ集約ルート
    pub fn new_aggregate_root(&self) -> TracedError {
        TracedError::aggregate_root(ErrorList::with_capture(
            Arc::clone(&self.capture),
            self.list_depth,
        ))
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self {
            capture: Arc::new(BacktraceCapture::new()),
            wrap_depth: WRAP_DEPTH,
            list_depth: LIST_DEPTH,
        }
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("wrap_depth", &self.wrap_depth)
            .field("list_depth", &self.list_depth)
            .finish_non_exhaustive()
    }
}
