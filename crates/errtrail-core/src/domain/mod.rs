//! Domain - 値型とレコード（CallSite, RecordId, Cause, TracedError, ErrorList）

pub mod call_site;
pub mod cause;
pub mod ids;
pub mod list;
pub mod record;

pub use self::call_site::{CallSite, TraceEntry};
pub use self::cause::{BoxError, Cause, CauseKind, Sentinel};
pub use self::ids::RecordId;
pub use self::list::ErrorList;
pub use self::record::{EMPTY_LIST_MESSAGE, TracedError};
