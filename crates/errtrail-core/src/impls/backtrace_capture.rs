//! BacktraceCapture - `backtrace` クレートによるスタック解決
//!
//! # 学習ポイント
//! - `backtrace::trace` + `resolve_frame` で必要なフレームだけを解決する
//!   （`Backtrace::new()` はスタック全体のシンボルを解決するので毎回は重い）
//! - 最適化ビルドでは末尾呼び出しでフレームが消えるため、depth の数え上げは
//!   ずれることがある。`Location` が渡された場合は file / line が一致する
//!   フレームを優先し、数え上げはフォールバックにとどめる

use std::panic::Location;
use std::path::{Path, PathBuf};

use backtrace::{Frame, Symbol};
use tracing::warn;

use crate::domain::CallSite;
use crate::ports::CallSiteCapture;

/// BacktraceCapture は呼び出しのたびに実行中のスタックを走査する
///
/// # 走査の起点
/// - 自身の `walk` フレームを起点（anchor）にする
/// - anchor より内側（`backtrace` クレート内部など）は depth に数えない
/// - インライン展開されたシンボルは 1 つずつ数える
///
/// # 精度
/// - `capture_at`: file / line は常に `Location` の値。関数名は一致する
///   フレームから取り、見つからなければ depth 番目のフレームから取る
/// - `capture`: depth の数え上げのみ。デバッグ情報がないと file / line は空
#[derive(Debug, Clone, Default)]
pub struct BacktraceCapture {
    strip_prefix: Option<PathBuf>,
}

/// 走査中に 1 シンボルずつ取り出した位置
struct Resolved {
    site: CallSite,
    file_path: Option<PathBuf>,
}

impl BacktraceCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// file を `prefix` からの相対パスで表示する（例: ワークスペースのルート）
    pub fn with_strip_prefix(prefix: impl Into<PathBuf>) -> Self {
        Self {
            strip_prefix: Some(prefix.into()),
        }
    }

    fn finish(&self, site: CallSite) -> CallSite {
        match &self.strip_prefix {
            Some(prefix) => site.relative_to(prefix),
            None => site,
        }
    }

    /// anchor から `depth` 番目のシンボル、または `caller` と一致するシンボルを探す
    ///
    /// depth 0 は `walk` を呼んだフレーム。どちらかが見つかった時点で走査を止める。
    #[inline(never)]
    fn walk(&self, depth: usize, caller: Option<&Location<'static>>) -> Option<CallSite> {
        let mut anchored = false;
        let mut index = 0usize;
        let mut found: Option<CallSite> = None;

        backtrace::trace(|frame: &Frame| {
            backtrace::resolve_frame(frame, |symbol: &Symbol| {
                if found.is_some() {
                    return;
                }
                let resolved = resolve(symbol);
                if !anchored {
                    anchored = is_anchor(&resolved.site.operation);
                    return;
                }
                let at_depth = index == depth;
                index += 1;
                if at_depth || caller.is_some_and(|loc| matches_location(&resolved, loc)) {
                    found = Some(resolved.site);
                }
            });
            found.is_none()
        });

        if !anchored {
            warn!("capture frame not found in backtrace; symbols unavailable?");
        } else if found.is_none() {
            warn!(
                depth,
                available = index,
                "capture depth runs past the end of the stack"
            );
        }
        found
    }
}

impl CallSiteCapture for BacktraceCapture {
    fn capture(&self, depth: usize) -> CallSite {
        let site = self.walk(depth + 1, None).unwrap_or_default();
        self.finish(site)
    }

    fn capture_at(&self, caller: &'static Location<'static>, depth: usize) -> CallSite {
        let operation = self
            .walk(depth + 1, Some(caller))
            .map(|site| site.operation)
            .unwrap_or_default();
        self.finish(CallSite::new(caller.file(), operation, caller.line()))
    }
}

fn resolve(symbol: &Symbol) -> Resolved {
    let file_path = symbol.filename().map(Path::to_path_buf);
    let site = CallSite {
        file: file_path
            .as_deref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default(),
        // ハッシュなしのデマングル名
        operation: symbol
            .name()
            .map(|name| format!("{name:#}"))
            .unwrap_or_default(),
        line: symbol.lineno().unwrap_or(0),
    };
    Resolved { site, file_path }
}

fn is_anchor(name: &str) -> bool {
    name.ends_with("BacktraceCapture::walk")
}

/// `Location::file` はワークスペース相対、シンボル側は絶対パスのことがある
fn matches_location(resolved: &Resolved, caller: &Location<'static>) -> bool {
    resolved.site.line == caller.line()
        && resolved
            .file_path
            .as_deref()
            .is_some_and(|path| path.ends_with(caller.file()))
}
