//! App - エントリポイント層
//!
//! # 主要コンポーネント
//! - **propagate**: wrap / wrap_to_depth / wrap_with / new_aggregate_root / ResultExt
//! - **TracerBuilder / Tracer**: キャプチャ設定（深さ、パス短縮、協調者の差し替え）

pub mod builder;
pub mod propagate;

pub use self::builder::{BuildError, Tracer, TracerBuilder};
pub use self::propagate::{
    LIST_DEPTH, ResultExt, WRAP_DEPTH, new_aggregate_root, wrap, wrap_to_depth, wrap_with,
};
