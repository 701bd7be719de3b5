//! Format enumerator: a cursor over a snapshot of format descriptors.
//!
//! The descriptor list is copied out of the data object when the
//! enumerator is created, so later changes to the object are never seen
//! and the two can be dropped in any order. `reset` rewinds the cursor;
//! it does not take a new snapshot.

use crate::format::FormatEtc;
use crate::hresult::HResult;

use super::DataObjectError;

/// Whether a fetch or skip did everything asked of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Complete,
    /// Fewer items than requested (possibly none).
    Partial,
}

impl FetchStatus {
    pub fn hresult(self) -> HResult {
        match self {
            FetchStatus::Complete => HResult::S_OK,
            FetchStatus::Partial => HResult::S_FALSE,
        }
    }
}

/// Cursor over an owned descriptor snapshot.
///
/// `Clone` yields an independent cursor with its own copy of the
/// snapshot, positioned where this one is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatEnumerator {
    formats: Box<[FormatEtc]>,
    /// Invariant: `index <= formats.len()`.
    index: usize,
}

impl FormatEnumerator {
    pub fn new(formats: Vec<FormatEtc>) -> Self {
        Self {
            formats: formats.into_boxed_slice(),
            index: 0,
        }
    }

    /// Copy up to `count` descriptors into `out`, advancing the cursor.
    ///
    /// `fetched`, when given, is zeroed first and then set to the number
    /// copied. In order:
    /// - `count == 0`, no `out`, or an exhausted cursor: `Partial`, nothing moves.
    /// - `count != 1` without `fetched`: `Partial`, nothing moves; the
    ///   caller could not learn how many came back.
    /// - `out` shorter than `count`: [`DataObjectError::BufferTooSmall`].
    ///
    /// Otherwise `Complete` only if exactly `count` were copied. A short
    /// read copies what is left and still reports `Partial`.
    pub fn next(
        &mut self,
        count: usize,
        out: Option<&mut [FormatEtc]>,
        mut fetched: Option<&mut usize>,
    ) -> Result<FetchStatus, DataObjectError> {
        if let Some(n) = fetched.as_deref_mut() {
            *n = 0;
        }

        let Some(out) = out else {
            return Ok(FetchStatus::Partial);
        };
        if count == 0 || self.index >= self.formats.len() {
            return Ok(FetchStatus::Partial);
        }
        if count != 1 && fetched.is_none() {
            return Ok(FetchStatus::Partial);
        }
        if out.len() < count {
            return Err(DataObjectError::BufferTooSmall {
                requested: count,
                capacity: out.len(),
            });
        }

        let copied = count.min(self.formats.len() - self.index);
        out[..copied].copy_from_slice(&self.formats[self.index..self.index + copied]);
        self.index += copied;

        if let Some(n) = fetched {
            *n = copied;
        }

        Ok(if copied == count {
            FetchStatus::Complete
        } else {
            FetchStatus::Partial
        })
    }

    /// Advance by `count`, but only if that stays within the snapshot.
    pub fn skip(&mut self, count: usize) -> FetchStatus {
        match self.index.checked_add(count) {
            Some(target) if target <= self.formats.len() => {
                self.index = target;
                FetchStatus::Complete
            }
            _ => FetchStatus::Partial,
        }
    }

    /// Rewind to the first descriptor. Always succeeds.
    pub fn reset(&mut self) -> FetchStatus {
        self.index = 0;
        FetchStatus::Complete
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.index
    }

    /// Descriptors not yet fetched or skipped.
    pub fn remaining(&self) -> &[FormatEtc] {
        &self.formats[self.index..]
    }

    /// Snapshot size.
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.index == self.formats.len()
    }
}
