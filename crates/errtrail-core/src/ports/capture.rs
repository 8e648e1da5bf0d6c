//! CallSiteCapture port - 呼び出し位置取得の抽象化
//!
//! # 実装
//! - **BacktraceCapture**（`impls`）: 実際のスタックを解決する（本番用）
//! - **FixedCapture**: 常に同じ位置を返す（テスト用）
//!
//! # 学習ポイント
//! - `#[track_caller]` で得た `Location` は最適化ビルドでもずれない
//! - スタック走査は関数名の解決にだけ使い、file / line は `Location` を優先する

use std::panic::Location;

use crate::domain::CallSite;

/// CallSiteCapture は `depth` フレーム上の呼び出し位置を返す
///
/// # depth の数え方
/// - 0: `capture` / `capture_at` を呼んだフレーム
/// - 1: その呼び出し元
/// - スタックの末尾を越えた場合は [`CallSite::unknown`]
///
/// # Thread Safety
/// - `Send + Sync` を要求（`ErrorList::add` はロックの外で並行に capture する）
pub trait CallSiteCapture: Send + Sync {
    /// スタック走査だけで位置を解決する
    fn capture(&self, depth: usize) -> CallSite;

    /// `#[track_caller]` の `Location` を使って位置を解決する
    ///
    /// 既定実装: `capture(depth)` の関数名に `caller` の file / line を重ねる
    fn capture_at(&self, caller: &'static Location<'static>, depth: usize) -> CallSite {
        let site = self.capture(depth);
        CallSite {
            file: caller.file().to_string(),
            line: caller.line(),
            ..site
        }
    }
}

/// FixedCapture は depth や呼び出し元に関係なく同じ位置を返す
///
/// # 用途
/// - テストで位置を決定的にする
/// - 位置情報を固定したい呼び出し元（CLI のデモなど）
#[derive(Debug, Clone, Default)]
pub struct FixedCapture {
    site: CallSite,
}

impl FixedCapture {
    pub fn new(site: CallSite) -> Self {
        Self { site }
    }
}

impl CallSiteCapture for FixedCapture {
    fn capture(&self, _depth: usize) -> CallSite {
        self.site.clone()
    }

    fn capture_at(&self, _caller: &'static Location<'static>, _depth: usize) -> CallSite {
        self.site.clone()
    }
}
