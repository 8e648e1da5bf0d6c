//! errtrail-core
//!
//! 伝播しながら呼び出し経路の trace を蓄積するエラーレコードと、
//! バッチの失敗をまとめるスレッド安全なリスト。
//!
//! # モジュール構成
//! - **domain**: CallSite, TraceEntry, RecordId, Cause, TracedError, ErrorList
//! - **ports**: CallSiteCapture（呼び出し位置取得の抽象化）, FixedCapture
//! - **impls**: BacktraceCapture
//! - **app**: wrap 系エントリポイント, TracerBuilder
//! - **error**: このクレート自身の API エラー
//!
//! # 使用例
//! ```ignore
//! use errtrail_core::{ResultExt, TracedError};
//!
//! fn read_block() -> Result<Vec<u8>, TracedError> {
//!     std::fs::read("block.bin").traced()
//! }
//!
//! fn load() -> Result<Vec<u8>, TracedError> {
//!     read_block().traced() // 同じレコードに trace が 1 件増える
//! }
//! ```

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;

pub use app::{
    BuildError, ResultExt, Tracer, TracerBuilder, new_aggregate_root, wrap, wrap_to_depth,
    wrap_with,
};
pub use domain::{
    BoxError, CallSite, Cause, CauseKind, ErrorList, RecordId, Sentinel, TraceEntry, TracedError,
};
pub use error::AggregateError;
pub use impls::BacktraceCapture;
pub use ports::{CallSiteCapture, FixedCapture};
