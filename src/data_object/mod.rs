//! Data object: an insertion-ordered store of (format, medium) pairs.
//!
//! Producers put payloads in with [`DataObject::set_data`]; consumers
//! probe with [`DataObject::query_get_data`], take copies with
//! [`DataObject::get_data`] and discover formats through a
//! [`FormatEnumerator`] snapshot.
//!
//! Ownership of every stored medium stays with the object until it is
//! replaced or [`DataObject::clear`]ed, and each one is handed to
//! [`MediumOps::release_medium`] exactly once. Dropping the object clears
//! it.

mod enum_format;

use serde::{Deserialize, Serialize};

use crate::format::{Aspect, FormatEtc};
use crate::hresult::HResult;
use crate::medium::{HeapOps, Medium, MediumError, MediumOps};

pub use enum_format::{FetchStatus, FormatEnumerator};

/// Data object errors.
///
/// Missing formats are not errors; they surface as [`Medium::Null`] or a
/// [`QueryStatus`]. Everything here is a hard failure for the caller.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DataObjectError {
    #[error("failed to duplicate {format} medium: {source}")]
    Duplicate {
        format: FormatEtc,
        #[source]
        source: MediumError,
    },
    #[error("advise connections are not supported")]
    AdviseNotSupported,
    #[error("no canonical format; the requested format stands")]
    NoCanonicalFormat,
    #[error("rendering into a caller-supplied medium is not supported")]
    GetDataHereNotSupported,
    #[error("enumerating {0} formats is not implemented")]
    NotImplemented(DataDir),
    #[error("output buffer holds {capacity} formats but {requested} were requested")]
    BufferTooSmall { requested: usize, capacity: usize },
}

impl DataObjectError {
    /// Protocol status an external caller sees for this error.
    pub fn hresult(&self) -> HResult {
        match self {
            DataObjectError::Duplicate {
                source: MediumError::OutOfMemory(_),
                ..
            } => HResult::E_OUTOFMEMORY,
            DataObjectError::Duplicate {
                source: MediumError::Unsupported(_),
                ..
            } => HResult::DV_E_TYMED,
            DataObjectError::Duplicate { .. } => HResult::E_INVALIDARG,
            DataObjectError::AdviseNotSupported => HResult::OLE_E_ADVISENOTSUPPORTED,
            DataObjectError::NoCanonicalFormat => HResult::DV_E_FORMATETC,
            DataObjectError::GetDataHereNotSupported => HResult::COR_E_NOTSUPPORTED,
            DataObjectError::NotImplemented(_) => HResult::E_NOTIMPL,
            DataObjectError::BufferTooSmall { .. } => HResult::E_INVALIDARG,
        }
    }
}

/// Outcome of [`DataObject::query_get_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Found,
    /// Only the content aspect is served.
    WrongAspect,
    WrongMediumKind,
    WrongFormat,
}

impl QueryStatus {
    pub fn hresult(self) -> HResult {
        match self {
            QueryStatus::Found => HResult::S_OK,
            QueryStatus::WrongAspect => HResult::DV_E_DVASPECT,
            QueryStatus::WrongMediumKind => HResult::DV_E_TYMED,
            QueryStatus::WrongFormat => HResult::DV_E_CLIPFORMAT,
        }
    }
}

/// Enumeration direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataDir {
    /// Formats available from `get_data`.
    Get,
    /// Formats accepted by `set_data`.
    Set,
}

impl std::fmt::Display for DataDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DataDir::Get => "get",
            DataDir::Set => "set",
        })
    }
}

/// How `set_data` receives its medium.
#[derive(Debug)]
pub enum Handoff<'a> {
    /// The object takes the medium as-is.
    Transfer(Medium),
    /// The object stores its own copy; the caller keeps the original.
    Copy(&'a Medium),
}

/// Result of releasing stored mediums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    pub released: usize,
    pub failed: usize,
}

#[derive(Debug)]
struct Entry {
    format: FormatEtc,
    medium: Medium,
}

/// Multi-format data object.
#[derive(Debug)]
pub struct DataObject<O: MediumOps = HeapOps> {
    entries: Vec<Entry>,
    ops: O,
}

impl DataObject<HeapOps> {
    pub fn new() -> Self {
        Self::with_ops(HeapOps)
    }
}

impl Default for DataObject<HeapOps> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: MediumOps> DataObject<O> {
    /// Data object that copies and releases through `ops`.
    pub fn with_ops(ops: O) -> Self {
        Self {
            entries: Vec::new(),
            ops,
        }
    }

    /// Store `medium` under `format`.
    ///
    /// The first stored entry matching `format` is removed and its medium
    /// released before anything else happens. The new entry goes to the
    /// end of the order. With [`Handoff::Copy`], a failed copy is returned
    /// as an error and nothing is stored.
    pub fn set_data(&mut self, format: FormatEtc, medium: Handoff<'_>) -> Result<(), DataObjectError> {
        if let Some(pos) = self.entries.iter().position(|e| e.format.matches(&format)) {
            let old = self.entries.remove(pos);
            tracing::debug!(%format, replaced = %old.format, "replacing stored format");
            self.release_entry(old);
        }

        let medium = match medium {
            Handoff::Transfer(medium) => medium,
            Handoff::Copy(medium) => self
                .ops
                .copy_medium(medium)
                .map_err(|source| DataObjectError::Duplicate { format, source })?,
        };

        self.entries.push(Entry { format, medium });
        Ok(())
    }

    /// Copy of the first stored medium matching `request`.
    ///
    /// Returns [`Medium::Null`] when nothing matches. A failed copy of a
    /// matching medium is an error.
    pub fn get_data(&self, request: &FormatEtc) -> Result<Medium, DataObjectError> {
        let Some(entry) = self.entries.iter().find(|e| e.format.matches(request)) else {
            return Ok(Medium::Null);
        };
        self.ops
            .copy_medium(&entry.medium)
            .map_err(|source| DataObjectError::Duplicate {
                format: entry.format,
                source,
            })
    }

    /// Whether `get_data(request)` would find something, and if not, why.
    ///
    /// When no entry matches, the reason recorded for the last entry
    /// scanned is the one reported, so the answer depends on insertion
    /// order. Consumers in the field rely on that.
    pub fn query_get_data(&self, request: &FormatEtc) -> QueryStatus {
        if request.aspect != Aspect::Content {
            return QueryStatus::WrongAspect;
        }

        let mut status = QueryStatus::WrongMediumKind;
        for entry in &self.entries {
            status = if !entry.format.tymed.intersects(request.tymed) {
                QueryStatus::WrongMediumKind
            } else if entry.format.format != request.format {
                QueryStatus::WrongFormat
            } else if entry.format.aspect != request.aspect {
                QueryStatus::WrongAspect
            } else {
                return QueryStatus::Found;
            };
        }
        status
    }

    /// Snapshot enumerator over the stored formats, in insertion order.
    pub fn enum_format_etc(&self, direction: DataDir) -> Result<FormatEnumerator, DataObjectError> {
        match direction {
            DataDir::Get => Ok(FormatEnumerator::new(
                self.entries.iter().map(|e| e.format).collect(),
            )),
            DataDir::Set => Err(DataObjectError::NotImplemented(direction)),
        }
    }

    /// Render into a medium the caller allocated. Not supported.
    pub fn get_data_here(&self, _request: &FormatEtc, _medium: &mut Medium) -> Result<(), DataObjectError> {
        Err(DataObjectError::GetDataHereNotSupported)
    }

    /// Canonical equivalent of `format`. There is none; callers use
    /// their own descriptor.
    pub fn canonical_format_etc(&self, _format: &FormatEtc) -> Result<FormatEtc, DataObjectError> {
        Err(DataObjectError::NoCanonicalFormat)
    }

    /// Change notifications are not offered.
    pub fn advise(&mut self, _format: &FormatEtc) -> Result<u32, DataObjectError> {
        Err(DataObjectError::AdviseNotSupported)
    }

    pub fn unadvise(&mut self, _connection: u32) -> Result<(), DataObjectError> {
        Err(DataObjectError::AdviseNotSupported)
    }

    pub fn enum_advise(&self) -> Result<Vec<u32>, DataObjectError> {
        Err(DataObjectError::AdviseNotSupported)
    }

    /// Release every stored medium and empty the object.
    ///
    /// Every medium is attempted even if some releases fail. Calling it
    /// again on an empty object does nothing.
    pub fn clear(&mut self) -> ReleaseReport {
        let mut report = ReleaseReport::default();
        let ops = &self.ops;
        for entry in self.entries.drain(..) {
            match ops.release_medium(entry.medium) {
                Ok(()) => report.released += 1,
                Err(e) => {
                    tracing::warn!(format = %entry.format, error = %e, "medium release failed");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Stored formats in insertion order.
    pub fn formats(&self) -> impl Iterator<Item = &FormatEtc> {
        self.entries.iter().map(|e| &e.format)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn release_entry(&self, entry: Entry) {
        if let Err(e) = self.ops.release_medium(entry.medium) {
            tracing::warn!(format = %entry.format, error = %e, "medium release failed");
        }
    }
}

impl<O: MediumOps> Drop for DataObject<O> {
    fn drop(&mut self) {
        self.clear();
    }
}
