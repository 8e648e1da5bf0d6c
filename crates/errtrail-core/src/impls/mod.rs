//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **BacktraceCapture**: `backtrace` クレートでスタックを解決する既定の CallSiteCapture

pub mod backtrace_capture;

pub use self::backtrace_capture::BacktraceCapture;
