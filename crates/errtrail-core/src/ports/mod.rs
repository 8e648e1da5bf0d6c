//! Ports - 抽象化レイヤー
//!
//! 呼び出し位置の取得（スタック解析）は外部の協調者として扱い、
//! コアは `capture(depth) -> CallSite` の一操作だけに依存します。

pub mod capture;

pub use self::capture::{CallSiteCapture, FixedCapture};
