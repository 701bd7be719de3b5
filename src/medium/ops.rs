//! Medium copy/release collaborators.
//!
//! The data object never looks inside a payload. It asks a
//! [`MediumOps`] to copy one when a reader needs its own, and to release
//! one when the object lets go of it.

use super::{Medium, MediumError};

/// Duplicate and release payloads, whatever their medium kind.
///
/// `Send + Sync` so a data object can live inside the broker task.
pub trait MediumOps: Send + Sync {
    /// Produce an independent copy of `medium`.
    fn copy_medium(&self, medium: &Medium) -> Result<Medium, MediumError>;

    /// Free `medium`. Ownership passes in; it is gone whatever the result.
    fn release_medium(&self, medium: Medium) -> Result<(), MediumError>;
}

/// In-process mediums: copies with fallible allocation, frees by drop.
///
/// Foreign handles belong to the platform; this implementation can
/// neither copy nor free them and reports `Unsupported`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapOps;

impl MediumOps for HeapOps {
    fn copy_medium(&self, medium: &Medium) -> Result<Medium, MediumError> {
        medium.try_duplicate()
    }

    fn release_medium(&self, medium: Medium) -> Result<(), MediumError> {
        match medium {
            Medium::Foreign { tymed, handle } => {
                tracing::debug!(%tymed, handle, "foreign handle left to its platform owner");
                Err(MediumError::Unsupported(tymed))
            }
            other => {
                drop(other);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Tymed;

    #[test]
    fn heap_copy_matches_source() {
        let m = Medium::Stream(b"payload".to_vec());
        assert_eq!(HeapOps.copy_medium(&m).unwrap(), m);
    }

    #[test]
    fn heap_release_in_process() {
        assert!(HeapOps.release_medium(Medium::HGlobal(vec![0; 16])).is_ok());
        assert!(HeapOps.release_medium(Medium::Null).is_ok());
    }

    #[test]
    fn heap_release_foreign_reports_unsupported() {
        let err = HeapOps
            .release_medium(Medium::Foreign {
                tymed: Tymed::MFPICT,
                handle: 1,
            })
            .unwrap_err();
        assert_eq!(err, MediumError::Unsupported(Tymed::MFPICT));
    }
}
