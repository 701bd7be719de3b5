//! Status codes of the data-transfer protocol.
//!
//! Consumers branch on these exact values, so they are fixed here once
//! and everything else maps onto them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Protocol status code. Negative values are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HResult(pub i32);

impl HResult {
    pub const S_OK: Self = Self(0);
    pub const S_FALSE: Self = Self(1);
    pub const E_NOTIMPL: Self = Self(0x8000_4001_u32 as i32);
    pub const E_OUTOFMEMORY: Self = Self(0x8007_000E_u32 as i32);
    pub const E_INVALIDARG: Self = Self(0x8007_0057_u32 as i32);
    pub const OLE_E_ADVISENOTSUPPORTED: Self = Self(0x8004_0003_u32 as i32);
    pub const DV_E_FORMATETC: Self = Self(0x8004_0064_u32 as i32);
    pub const DV_E_TYMED: Self = Self(0x8004_0069_u32 as i32);
    pub const DV_E_CLIPFORMAT: Self = Self(0x8004_006A_u32 as i32);
    pub const DV_E_DVASPECT: Self = Self(0x8004_006B_u32 as i32);
    pub const COR_E_NOTSUPPORTED: Self = Self(0x8013_1515_u32 as i32);

    pub fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// Symbolic name for the codes this crate produces.
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::S_OK => "S_OK",
            Self::S_FALSE => "S_FALSE",
            Self::E_NOTIMPL => "E_NOTIMPL",
            Self::E_OUTOFMEMORY => "E_OUTOFMEMORY",
            Self::E_INVALIDARG => "E_INVALIDARG",
            Self::OLE_E_ADVISENOTSUPPORTED => "OLE_E_ADVISENOTSUPPORTED",
            Self::DV_E_FORMATETC => "DV_E_FORMATETC",
            Self::DV_E_TYMED => "DV_E_TYMED",
            Self::DV_E_CLIPFORMAT => "DV_E_CLIPFORMAT",
            Self::DV_E_DVASPECT => "DV_E_DVASPECT",
            Self::COR_E_NOTSUPPORTED => "COR_E_NOTSUPPORTED",
            _ => return None,
        })
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({:#010x})", self.0 as u32),
            None => write!(f, "{:#010x}", self.0 as u32),
        }
    }
}
