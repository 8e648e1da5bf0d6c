//! RecordId - レコードの識別子
//!
//! `TracedError` は値として呼び出し元へ move されていくため、
//! 「同じレコードか」はポインタではなく ID で判定します。
//! ULID を使うので生成順でソートでき、調整なしで生成できます。

use std::fmt;
use ulid::Ulid;

/// [`TracedError`](crate::domain::TracedError) 1 件の同一性
///
/// レコード生成時に 1 度だけ割り当てられ、再 wrap しても変わらない。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(Ulid);

impl RecordId {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for RecordId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "err-{}", self.0)
    }
}
