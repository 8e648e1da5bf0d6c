//! CallSite / TraceEntry - 呼び出し位置と trace の 1 件
//!
//! # 学習ポイント
//! - `CallSite` は公開フィールドのプレーンな値型（比較・複製が自由）
//! - `TraceEntry` は newtype で、表示形式だけを変える

use std::fmt;
use std::path::Path;

/// 解決済みの `(file, operation, line)`
///
/// [`CallSiteCapture`](crate::ports::CallSiteCapture) が作る。
/// スタックの末尾を越えた場合は失敗せず [`CallSite::unknown`]（空文字列と行 0）になる。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CallSite {
    pub file: String,
    pub operation: String,
    pub line: u32,
}

impl CallSite {
    pub fn new(file: impl Into<String>, operation: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            operation: operation.into(),
            line,
        }
    }

    /// 何も解決できなかったときの位置
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.file.is_empty() && self.operation.is_empty() && self.line == 0
    }

    /// `file` を `prefix` からの相対パスにする。`prefix` の外ならそのまま
    pub fn relative_to(mut self, prefix: &Path) -> Self {
        if let Ok(rest) = Path::new(&self.file).strip_prefix(prefix) {
            self.file = rest.to_string_lossy().into_owned();
        }
        self
    }
}

/// [`TracedError`](crate::domain::TracedError) に記録された伝播 1 回分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry(CallSite);

impl TraceEntry {
    pub fn site(&self) -> &CallSite {
        &self.0
    }
}

impl From<CallSite> for TraceEntry {
    fn from(site: CallSite) -> Self {
        Self(site)
    }
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "File: {}; Operation: {}; Line: {};",
            self.0.file, self.0.operation, self.0.line
        )
    }
}
