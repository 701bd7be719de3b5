//! Storage mediums: the payloads behind each format.
//!
//! A [`Medium`] is a tagged variant over medium kind. It owns what it
//! holds and is not `Clone`: a second copy only comes from
//! [`Medium::try_duplicate`] (or a [`MediumOps`] implementation), which
//! can fail and says so.

mod ops;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::format::Tymed;

pub use ops::{HeapOps, MediumOps};

/// Medium duplication / release errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MediumError {
    #[error("out of memory copying {0} bytes")]
    OutOfMemory(usize),
    #[error("medium kind {0} cannot be handled in-process")]
    Unsupported(Tymed),
    #[error("medium release failed: {0}")]
    ReleaseFailed(String),
}

/// Bitmap pixels carried by a GDI medium.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    /// Packed pixel rows, top-down.
    #[serde(with = "serde_bytes")]
    pub bits: Vec<u8>,
}

/// One physical representation of data.
#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Medium {
    /// No data. What `get_data` hands back when nothing matches.
    #[default]
    Null,
    /// Global memory block.
    HGlobal(#[serde(with = "serde_bytes")] Vec<u8>),
    /// Path of a file holding the data. Only the name travels.
    File(PathBuf),
    /// Stream contents.
    Stream(#[serde(with = "serde_bytes")] Vec<u8>),
    /// Device-independent copy of a GDI bitmap.
    Gdi(Bitmap),
    /// Platform-owned handle (storage object, metafile, ...) that only the
    /// platform can copy or free.
    Foreign { tymed: Tymed, handle: u64 },
}

impl Medium {
    /// Medium kind this payload is stored on. `Null` is the empty set.
    pub fn tymed(&self) -> Tymed {
        match self {
            Medium::Null => Tymed::empty(),
            Medium::HGlobal(_) => Tymed::HGLOBAL,
            Medium::File(_) => Tymed::FILE,
            Medium::Stream(_) => Tymed::ISTREAM,
            Medium::Gdi(_) => Tymed::GDI,
            Medium::Foreign { tymed, .. } => *tymed,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Medium::Null)
    }

    /// Payload byte size, where the medium holds bytes in-process.
    pub fn byte_len(&self) -> Option<usize> {
        match self {
            Medium::HGlobal(bytes) | Medium::Stream(bytes) => Some(bytes.len()),
            Medium::Gdi(bitmap) => Some(bitmap.bits.len()),
            Medium::Null | Medium::File(_) | Medium::Foreign { .. } => None,
        }
    }

    /// In-process payload bytes, if any.
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Medium::HGlobal(bytes) | Medium::Stream(bytes) => Some(bytes),
            Medium::Gdi(bitmap) => Some(&bitmap.bits),
            Medium::Null | Medium::File(_) | Medium::Foreign { .. } => None,
        }
    }

    /// Independent deep copy.
    ///
    /// Allocation failure is reported instead of aborting, and foreign
    /// handles are rejected: a half-made copy is never returned.
    pub fn try_duplicate(&self) -> Result<Medium, MediumError> {
        match self {
            Medium::Null => Ok(Medium::Null),
            Medium::HGlobal(bytes) => Ok(Medium::HGlobal(copy_bytes(bytes)?)),
            Medium::Stream(bytes) => Ok(Medium::Stream(copy_bytes(bytes)?)),
            Medium::File(path) => Ok(Medium::File(path.clone())),
            Medium::Gdi(bitmap) => Ok(Medium::Gdi(Bitmap {
                width: bitmap.width,
                height: bitmap.height,
                bits: copy_bytes(&bitmap.bits)?,
            })),
            Medium::Foreign { tymed, .. } => Err(MediumError::Unsupported(*tymed)),
        }
    }
}

fn copy_bytes(src: &[u8]) -> Result<Vec<u8>, MediumError> {
    let mut dst = Vec::new();
    dst.try_reserve_exact(src.len())
        .map_err(|_| MediumError::OutOfMemory(src.len()))?;
    dst.extend_from_slice(src);
    Ok(dst)
}
