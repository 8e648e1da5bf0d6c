//! Propagate - wrap 系エントリポイント
//!
//! すべてのエントリポイントは [`propagate`] に集約されるので、depth の数え方は共通です。
//! - depth 0: `propagate` 自身
//! - depth 1: 公開エントリポイント（`wrap`, `wrap_to_depth`, `traced`, ...）
//! - depth 2: エントリポイントの呼び出し元
//!
//! `ErrorList::add` は 1 フレーム外側にあるので [`LIST_DEPTH`] を使います。
//!
//! # 学習ポイント
//! - `wrap` / `traced` / `add` は `#[track_caller]` なので file / line は
//!   最適化ビルドでも呼び出し元を指す。depth は関数名の解決にだけ使われる
//! - `wrap_to_depth` / `wrap_with` はスタック走査のみ（任意の深さを指定できる代わりに、
//!   最適化ビルドでは末尾呼び出しでフレームが消えて位置がずれることがある）

use std::panic::Location;

use tracing::{debug, trace};

use crate::domain::{BoxError, ErrorList, TracedError};
use crate::impls::BacktraceCapture;
use crate::ports::CallSiteCapture;

/// [`wrap`] が使う depth（エントリポイントの呼び出し元）
pub const WRAP_DEPTH: usize = 2;

/// `ErrorList::add` が使う depth（`add` の呼び出し元）
pub const LIST_DEPTH: usize = 3;

/// 外部エラーを包む、または既存レコードに trace を 1 件追加する
///
/// `caller` があれば `capture_at`、なければ `capture` で位置を解決する。
#[inline(never)]
pub(crate) fn propagate(
    capture: &dyn CallSiteCapture,
    err: BoxError,
    depth: usize,
    caller: Option<&'static Location<'static>>,
) -> TracedError {
    let site = match caller {
        Some(location) => capture.capture_at(location, depth),
        None => capture.capture(depth),
    };
    match err.downcast::<TracedError>() {
        Ok(record) => {
            let mut record = *record;
            trace!(
                record = %record.id(),
                file = %site.file,
                operation = %site.operation,
                line = site.line,
                "appending trace entry"
            );
            record.push_trace(site);
            record
        }
        Err(foreign) => {
            let record = TracedError::from_foreign(foreign, site);
            debug!(
                record = %record.id(),
                operation = %record.origin().operation,
                message = %record.message(),
                "wrapped foreign error"
            );
            record
        }
    }
}

/// 関数境界でエラーを包む
///
/// - `TracedError` はそのまま同じレコードとして返り、trace が 1 件増える
/// - それ以外は新しいレコードになり、trace 1 件で始まる
/// - 位置は `wrap` の呼び出し元（`#[track_caller]`）。`map_err(wrap)` のように
///   アダプタ経由で呼ぶとアダプタ側の位置になるので、その場合は [`ResultExt::traced`] を使う
///
/// # 使用例
/// ```ignore
/// match parse(&raw) {
///     Ok(config) => Ok(config),
///     Err(err) => Err(wrap(err)),
/// }
/// ```
#[track_caller]
#[inline(never)]
pub fn wrap<E>(err: E) -> TracedError
where
    E: Into<BoxError>,
{
    propagate(
        &BacktraceCapture::new(),
        err.into(),
        WRAP_DEPTH,
        Some(Location::caller()),
    )
}

/// depth を明示して包む（2 = この関数の呼び出し元）
///
/// スタック走査だけで位置を決めるので、正確さはビルドの最適化に左右される。
#[inline(never)]
pub fn wrap_to_depth<E>(err: E, depth: usize) -> TracedError
where
    E: Into<BoxError>,
{
    propagate(&BacktraceCapture::new(), err.into(), depth, None)
}

/// 協調者を差し替えて [`wrap_to_depth`] する
#[inline(never)]
pub fn wrap_with<E>(capture: &dyn CallSiteCapture, err: E, depth: usize) -> TracedError
where
    E: Into<BoxError>,
{
    propagate(capture, err.into(), depth, None)
}

/// バッチ失敗の集約ルートを作る
pub fn new_aggregate_root() -> TracedError {
    TracedError::aggregate_root(ErrorList::new())
}

/// `Result` 用の `?` フレンドリーな wrap
pub trait ResultExt<T> {
    /// エラーがあれば包む。位置は `traced` の呼び出し元
    fn traced(self) -> Result<T, TracedError>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<BoxError>,
{
    #[track_caller]
    #[inline(never)]
    fn traced(self) -> Result<T, TracedError> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(propagate(
                &BacktraceCapture::new(),
                err.into(),
                WRAP_DEPTH,
                Some(Location::caller()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CallSite, CauseKind, EMPTY_LIST_MESSAGE};
    use crate::ports::FixedCapture;
    use parking_lot::Mutex;
    use rstest::rstest;
    use std::error::Error;
    use std::hint::black_box;
    use std::io;
    use std::sync::Arc;

    /// 要求された depth を記録し、depth 名の位置を返す
    #[derive(Default)]
    struct RecordingCapture {
        depths: Mutex<Vec<usize>>,
    }

    impl CallSiteCapture for RecordingCapture {
        fn capture(&self, depth: usize) -> CallSite {
            self.depths.lock().push(depth);
            CallSite::new("src/rec.rs", format!("depth_{depth}"), depth as u32)
        }
    }

    fn fixed(op: &str) -> FixedCapture {
        FixedCapture::new(CallSite::new("src/job.rs", op, 1))
    }

    #[test]
    fn rewrapping_keeps_the_same_record() {
        let e1 = wrap_with(&fixed("job::fetch"), io::Error::other("disk full"), WRAP_DEPTH);
        let id = e1.id();
        let e2 = wrap_with(&fixed("job::run"), e1, WRAP_DEPTH);
        assert_eq!(e2.id(), id);
        assert_eq!(e2.trace().len(), 2);

        let e3 = wrap_with(&fixed("main"), e2, WRAP_DEPTH);
        assert_eq!(e3.id(), id);
        assert_eq!(e3.trace().len(), 3);

        let ops: Vec<&str> = e3.trace().iter().map(|t| t.site().operation.as_str()).collect();
        assert_eq!(ops, ["job::fetch", "job::run", "main"]);
        assert_eq!(e3.origin().operation, "job::fetch");
        assert_eq!(e3.message(), "disk full");
    }

    #[test]
    fn fresh_wrap_is_seeded() {
        let record = wrap_with(&fixed("job::fetch"), io::Error::other("disk full"), WRAP_DEPTH);
        assert_eq!(record.message(), "disk full");
        assert_eq!(record.trace().len(), 1);
        assert_eq!(record.cause_kind(), CauseKind::Foreign);
        let io_err = record
            .source()
            .and_then(|s| s.downcast_ref::<io::Error>())
            .expect("io error source");
        assert_eq!(io_err.to_string(), "disk full");
    }

    #[test]
    fn unwrap_returns_the_exact_foreign_error() {
        let foreign: BoxError = Box::new(io::Error::other("disk full"));
        let addr = foreign.as_ref() as *const (dyn Error + Send + Sync) as *const ();

        let record = wrap_with(&fixed("job::fetch"), foreign, WRAP_DEPTH);
        let source = record.source().expect("source");
        assert!(std::ptr::eq(source as *const dyn Error as *const (), addr));

        let back = record.into_cause().into_foreign().expect("foreign cause");
        assert!(std::ptr::eq(
            back.as_ref() as *const (dyn Error + Send + Sync) as *const (),
            addr
        ));
        assert!(back.downcast::<io::Error>().is_ok());
    }

    #[test]
    fn entry_points_request_the_documented_depths() {
        let capture = Arc::new(RecordingCapture::default());
        let record = wrap_with(capture.as_ref(), "x", WRAP_DEPTH);
        let _ = wrap_with(capture.as_ref(), record, 5);

        let root = TracedError::aggregate_root(ErrorList::with_capture(capture.clone(), LIST_DEPTH));
        root.add("y").expect("aggregate root");
        root.error_list().expect("list").add("z");

        assert_eq!(*capture.depths.lock(), [WRAP_DEPTH, 5, LIST_DEPTH, LIST_DEPTH]);
    }

    // 末尾呼び出しにならないよう、戻り値に行番号を添えて返す
    #[inline(never)]
    fn open_store() -> (TracedError, u32) {
        let (err, line) = (wrap(io::Error::other("disk full")), line!());
        black_box((err, line))
    }

    #[inline(never)]
    fn load_config() -> (TracedError, u32, u32) {
        let (inner, inner_line) = open_store();
        let (err, line) = (wrap(inner), line!());
        black_box((err, inner_line, line))
    }

    #[test]
    fn wrap_reports_the_exact_call_line() {
        let (e1, line) = open_store();
        assert_eq!(e1.origin().line, line);
        assert!(e1.origin().file.ends_with("propagate.rs"), "{}", e1.origin().file);
        assert_eq!(e1.trace()[0].site(), e1.origin());
        if cfg!(debug_assertions) {
            assert!(e1.origin().operation.contains("open_store"), "{}", e1.origin().operation);
        }

        let id = e1.id();
        let (e2, rewrap_line) = (wrap(e1), line!());
        assert_eq!(e2.id(), id);
        assert_eq!(e2.trace().len(), 2);
        assert_eq!(e2.trace()[1].site().line, rewrap_line);
        assert_eq!(e2.origin().line, line);
    }

    #[test]
    fn chained_wraps_record_each_call_line() {
        let (chained, inner_line, outer_line) = load_config();
        let lines: Vec<u32> = chained.trace().iter().map(|t| t.site().line).collect();
        assert_eq!(lines, [inner_line, outer_line]);
        if cfg!(debug_assertions) {
            assert!(chained.trace()[0].site().operation.contains("open_store"));
            assert!(chained.trace()[1].site().operation.contains("load_config"));
        }
    }

    #[inline(never)]
    fn helper_that_reports_its_caller() -> TracedError {
        let err = wrap_to_depth("timeout", WRAP_DEPTH + 1);
        black_box(err)
    }

    #[inline(never)]
    fn outer_operation() -> TracedError {
        let err = helper_that_reports_its_caller();
        black_box(err)
    }

    #[test]
    #[cfg_attr(not(debug_assertions), ignore = "depth counting needs an unoptimized build")]
    fn wrap_to_depth_looks_further_up() {
        let record = outer_operation();
        assert!(
            record.origin().operation.contains("outer_operation"),
            "{}",
            record.origin().operation
        );
    }

    #[inline(never)]
    fn read_header() -> (Result<u32, TracedError>, u32) {
        let parsed: Result<u32, _> = "not a number".parse::<u32>();
        let (result, line) = (parsed.traced(), line!());
        black_box((result, line))
    }

    #[test]
    fn traced_wraps_only_errors() {
        let ok: Result<u8, io::Error> = Ok(3);
        assert_eq!(ok.traced().expect("ok"), 3);

        let (result, line) = read_header();
        let err = result.expect_err("parse failure");
        assert_eq!(err.origin().line, line);
        assert!(err.origin().file.ends_with("propagate.rs"), "{}", err.origin().file);
        assert_eq!(err.message(), "invalid digit found in string");
        if cfg!(debug_assertions) {
            assert!(err.origin().operation.contains("read_header"), "{}", err.origin().operation);
        }
    }

    #[test]
    fn empty_aggregate_renders_fixed_text() {
        let root = new_aggregate_root();
        assert!(root.is_aggregate_root());
        assert_eq!(root.cause_kind(), CauseKind::List);
        assert_eq!(root.message(), "Error List");
        assert_eq!(root.render(), EMPTY_LIST_MESSAGE);
    }

    #[test]
    fn aggregate_renders_children_in_add_order() {
        let capture = Arc::new(fixed("batch::step"));
        let root = TracedError::aggregate_root(ErrorList::with_capture(capture, LIST_DEPTH));
        root.add("A").expect("aggregate root");
        root.add("B").expect("aggregate root");

        let text = root.render();
        assert!(text.contains("ErrorList: ["));
        let a = text.find("Message: A").expect("A rendered");
        let b = text.find("Message: B").expect("B rendered");
        assert!(a < b);
        assert_eq!(text.matches("Trace: [").count(), 3);
        assert_eq!(
            text.matches("File: src/job.rs; Operation: batch::step; Line: 1;").count(),
            2
        );
        assert!(text.ends_with("]\n"));
    }

    #[test]
    fn aggregate_add_reports_the_exact_call_line() {
        let root = new_aggregate_root();
        let (added, root_line) = (root.add("A"), line!());
        added.expect("aggregate root");
        let list = root.error_list().expect("list");
        let (_, list_line) = (list.add("B"), line!());

        list.with_entries(|entries| {
            assert_eq!(entries[0].origin().line, root_line);
            assert_eq!(entries[1].origin().line, list_line);
            assert!(entries[0].origin().file.ends_with("propagate.rs"));
            if cfg!(debug_assertions) {
                let op = &entries[0].origin().operation;
                assert!(op.contains("aggregate_add_reports_the_exact_call_line"), "{op}");
            }
        });
    }

    #[rstest]
    #[case(1)]
    #[case(10)]
    #[case(100)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_are_not_lost(#[case] n: usize) {
        let capture = Arc::new(fixed("batch::worker"));
        let root = Arc::new(TracedError::aggregate_root(ErrorList::with_capture(
            capture, LIST_DEPTH,
        )));

        let mut joins = Vec::with_capacity(n);
        for i in 0..n {
            let root = Arc::clone(&root);
            joins.push(tokio::spawn(async move {
                root.add(format!("failure {i}")).expect("aggregate root");
            }));
        }
        for join in joins {
            join.await.expect("task panicked");
        }

        let list = root.error_list().expect("list");
        assert_eq!(list.len(), n);
        let mut messages: Vec<String> =
            list.with_entries(|e| e.iter().map(|r| r.message().to_string()).collect());
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), n);
    }

    #[rstest]
    #[case(1)]
    #[case(10)]
    #[case(100)]
    fn concurrent_adds_with_backtrace_capture(#[case] n: usize) {
        let root = new_aggregate_root();
        std::thread::scope(|scope| {
            for i in 0..n {
                let root = &root;
                scope.spawn(move || root.add(format!("failure {i}")).expect("aggregate root"));
            }
        });
        assert_eq!(root.error_list().map(ErrorList::len), Some(n));
    }
}
