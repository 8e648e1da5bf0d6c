//! TracedError - エラーレコード本体
//!
//! レコードは外部エラーを最初に包んだときに 1 度だけ作られ、以降は呼び出し階層を
//! 所有権ごと上っていく。境界ごとの再 wrap はエラーを入れ子にせず、trace に 1 件足す。
//!
//! # 学習ポイント
//! - 同一性は `RecordId` で追う（値は move されるのでアドレスは使えない）
//! - `Display` / `Debug` は同じ `write_report` を共有する
//! - `source()` で包んだ元のエラーをそのまま返す（`std::error::Error` の連鎖）
//!
//! # 使用例
//! ```ignore
//! let root = new_aggregate_root();
//! root.add(io_err)?;
//! eprintln!("{root}");
//! ```

use std::error::Error;
use std::fmt::{self, Write as _};
use std::panic::Location;

use super::cause::{BoxError, Cause, CauseKind, Sentinel};
use super::{CallSite, ErrorList, RecordId, TraceEntry};
use crate::error::AggregateError;

/// 空の集約ルートがヘッダの代わりに表示する文言
pub const EMPTY_LIST_MESSAGE: &str = "No errors in error list";

/// 発生位置・原因・蓄積された trace を持つ構造化エラー
pub struct TracedError {
    id: RecordId,
    origin: CallSite,
    message: String,
    cause: Cause,
    trace: Vec<TraceEntry>,
    error_list: Option<ErrorList>,
}

impl TracedError {
    /// 外部エラーを包む新しいレコード。trace は `site` の 1 件で始まる
    pub(crate) fn from_foreign(err: BoxError, site: CallSite) -> Self {
        let mut record = Self {
            id: RecordId::generate(),
            origin: site.clone(),
            message: err.to_string(),
            cause: Cause::Foreign(err),
            trace: Vec::new(),
            error_list: None,
        };
        record.push_trace(site);
        record
    }

    /// `list` を所有する空の集約ルート
    pub(crate) fn aggregate_root(list: ErrorList) -> Self {
        Self::from_sentinel(Sentinel::List, Some(list))
    }

    /// メッセージと原因がマーカー番兵のレコード（テストでの目印用）
    pub fn marker() -> Self {
        Self::from_sentinel(Sentinel::Marker, None)
    }

    fn from_sentinel(sentinel: Sentinel, error_list: Option<ErrorList>) -> Self {
        Self {
            id: RecordId::generate(),
            origin: CallSite::unknown(),
            message: sentinel.to_string(),
            cause: Cause::Sentinel(sentinel),
            trace: Vec::new(),
            error_list,
        }
    }

    pub(crate) fn push_trace(&mut self, site: CallSite) {
        self.trace.push(TraceEntry::from(site));
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn origin(&self) -> &CallSite {
        &self.origin
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> &Cause {
        &self.cause
    }

    pub fn cause_kind(&self) -> CauseKind {
        self.cause.kind()
    }

    /// レコードを手放し、包んでいた原因だけを取り出す
    pub fn into_cause(self) -> Cause {
        self.cause
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    pub fn error_list(&self) -> Option<&ErrorList> {
        self.error_list.as_ref()
    }

    /// 原因がリスト番兵で、かつリストを持っているとき true
    pub fn is_aggregate_root(&self) -> bool {
        self.cause.kind() == CauseKind::List && self.error_list.is_some()
    }

    /// このレコードのリストに失敗を追加する
    ///
    /// エントリの位置は `add` の呼び出し元。集約ルートでなければ
    /// [`AggregateError::NotAnAggregateRoot`]。
    #[track_caller]
    #[inline(never)]
    pub fn add<E>(&self, err: E) -> Result<(), AggregateError>
    where
        E: Into<BoxError>,
    {
        let Some(list) = self.error_list.as_ref().filter(|_| self.is_aggregate_root()) else {
            return Err(AggregateError::NotAnAggregateRoot(self.id));
        };
        list.add_at(err.into(), list.depth(), Some(Location::caller()));
        Ok(())
    }

    /// `candidate` が `TracedError` かどうか
    ///
    /// 型だけを比べる。メッセージや原因が違うレコード同士でも一致する。
    pub fn is_match(&self, candidate: &(dyn Error + 'static)) -> bool {
        candidate.downcast_ref::<TracedError>().is_some()
    }

    /// 人が読むためのレポート。`Display` と `Debug` はどちらもこれを出力する
    pub fn render(&self) -> String {
        let mut out = String::new();
        // String への書き込みは失敗しない
        let _ = self.write_report(&mut out);
        out
    }

    fn write_report(&self, out: &mut impl fmt::Write) -> fmt::Result {
        if self.cause.kind() == CauseKind::List
            && let Some(list) = &self.error_list
        {
            return list.with_entries(|entries| {
                if entries.is_empty() {
                    return out.write_str(EMPTY_LIST_MESSAGE);
                }
                self.write_block(out)?;
                out.write_str("\nErrorList: [")?;
                for child in entries {
                    out.write_char('\n')?;
                    child.write_block(out)?;
                    out.write_str(",\n")?;
                }
                out.write_str("]\n")
            });
        }
        self.write_block(out)
    }

    fn write_block(&self, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(out, "File: {}", self.origin.file)?;
        writeln!(out, "Operation: {}", self.origin.operation)?;
        writeln!(out, "Line: {}", self.origin.line)?;
        writeln!(out, "Message: {}", self.message)?;
        writeln!(out, "Error: {:?}", self.cause.to_string())?;
        out.write_str("Trace: [\n")?;
        for entry in &self.trace {
            writeln!(out, "{entry}")?;
        }
        out.write_char(']')
    }
}

impl fmt::Display for TracedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_report(f)
    }
}

impl fmt::Debug for TracedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_report(f)
    }
}

impl Error for TracedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.cause.as_error())
    }
}
