//! Multi-format data transfer objects.
//!
//! The core is [`DataObject`]: an insertion-ordered store of
//! (format descriptor, medium) pairs with the query, copy and
//! enumeration semantics drag-and-drop and clipboard consumers expect,
//! down to the exact status codes. The `broker`, `ipc` and `client`
//! modules host data objects for other processes over a Unix socket.

pub mod broker;
pub mod cli;
pub mod client;
pub mod data_object;
pub mod format;
pub mod hresult;
pub mod ipc;
pub mod medium;

pub use data_object::{
    DataDir, DataObject, DataObjectError, FetchStatus, FormatEnumerator, Handoff, QueryStatus,
    ReleaseReport,
};
pub use format::{Aspect, ClipFormat, FormatEtc, FormatNames, Tymed};
pub use hresult::HResult;
pub use medium::{Bitmap, HeapOps, Medium, MediumError, MediumOps};
