//! Format descriptors: clipboard format ids, aspects, medium kinds.
//!
//! A [`FormatEtc`] names one way of rendering data: which format, for
//! which aspect, on which physical mediums. Descriptors are plain values;
//! two of them are interchangeable when their fields are equal.

pub mod names;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use names::{FormatNameError, FormatNames};

/// Clipboard format identifier.
///
/// Values below [`ClipFormat::FIRST_REGISTERED`] are predefined by the
/// platform; values at or above it are handed out by [`FormatNames`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipFormat(pub u16);

impl ClipFormat {
    pub const TEXT: Self = Self(1);
    pub const BITMAP: Self = Self(2);
    pub const METAFILEPICT: Self = Self(3);
    pub const SYLK: Self = Self(4);
    pub const DIF: Self = Self(5);
    pub const TIFF: Self = Self(6);
    pub const OEMTEXT: Self = Self(7);
    pub const DIB: Self = Self(8);
    pub const PALETTE: Self = Self(9);
    pub const RIFF: Self = Self(11);
    pub const WAVE: Self = Self(12);
    pub const UNICODETEXT: Self = Self(13);
    pub const ENHMETAFILE: Self = Self(14);
    pub const HDROP: Self = Self(15);
    pub const LOCALE: Self = Self(16);
    pub const DIBV5: Self = Self(17);

    /// First identifier in the registered (named) range.
    pub const FIRST_REGISTERED: u16 = 0xC000;

    /// Whether this id was assigned by name registration.
    pub fn is_registered(self) -> bool {
        self.0 >= Self::FIRST_REGISTERED
    }
}

impl fmt::Display for ClipFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match names::predefined_name(*self) {
            Some(name) => f.write_str(name),
            None => write!(f, "#{:#06x}", self.0),
        }
    }
}

/// How the data is meant to be rendered.
///
/// Only [`Aspect::Content`] is ever served by a [`crate::DataObject`];
/// the others exist so that requests for them can be answered precisely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aspect {
    #[default]
    Content,
    Thumbnail,
    Icon,
    DocPrint,
}

impl Aspect {
    /// Raw aspect value as the platform numbers it.
    pub fn bits(self) -> u32 {
        match self {
            Aspect::Content => 1,
            Aspect::Thumbnail => 2,
            Aspect::Icon => 4,
            Aspect::DocPrint => 8,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "content" => Some(Aspect::Content),
            "thumbnail" => Some(Aspect::Thumbnail),
            "icon" => Some(Aspect::Icon),
            "docprint" => Some(Aspect::DocPrint),
            _ => None,
        }
    }
}

impl fmt::Display for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Aspect::Content => "content",
            Aspect::Thumbnail => "thumbnail",
            Aspect::Icon => "icon",
            Aspect::DocPrint => "docprint",
        })
    }
}

bitflags::bitflags! {
    /// Set of storage-medium kinds a descriptor accepts.
    ///
    /// The empty set is the null medium.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Tymed: u32 {
        /// Global memory handle.
        const HGLOBAL = 1;
        /// Path to a file on disk.
        const FILE = 2;
        /// Stream object.
        const ISTREAM = 4;
        /// Structured storage object.
        const ISTORAGE = 8;
        /// GDI bitmap handle.
        const GDI = 16;
        /// Metafile picture.
        const MFPICT = 32;
        /// Enhanced metafile.
        const ENHMF = 64;
    }
}

impl Tymed {
    /// Parse a single medium-kind name (`hglobal`, `stream`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hglobal" => Some(Tymed::HGLOBAL),
            "file" => Some(Tymed::FILE),
            "stream" | "istream" => Some(Tymed::ISTREAM),
            "storage" | "istorage" => Some(Tymed::ISTORAGE),
            "gdi" => Some(Tymed::GDI),
            "mfpict" => Some(Tymed::MFPICT),
            "enhmf" => Some(Tymed::ENHMF),
            _ => None,
        }
    }
}

// Always the raw bits, whatever the format: the value also travels
// inside tagged protocol messages, which are buffered before decoding.
impl Serialize for Tymed {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for Tymed {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(Tymed::from_bits_retain)
    }
}

impl fmt::Display for Tymed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("null");
        }
        let names: Vec<String> = self
            .iter_names()
            .map(|(name, _)| name.to_ascii_lowercase())
            .collect();
        f.write_str(&names.join("|"))
    }
}

/// Format descriptor: format id, aspect, page index and medium kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatEtc {
    pub format: ClipFormat,
    pub aspect: Aspect,
    /// Page/item index; -1 means all of the data.
    pub lindex: i32,
    pub tymed: Tymed,
}

impl FormatEtc {
    /// Content-aspect descriptor for the whole data.
    pub fn new(format: ClipFormat, tymed: Tymed) -> Self {
        Self {
            format,
            aspect: Aspect::Content,
            lindex: -1,
            tymed,
        }
    }

    pub fn with_aspect(mut self, aspect: Aspect) -> Self {
        self.aspect = aspect;
        self
    }

    pub fn with_lindex(mut self, lindex: i32) -> Self {
        self.lindex = lindex;
        self
    }

    /// Lookup rule shared by set/get: some requested medium kind is
    /// accepted, and aspect and format are equal. `lindex` is ignored.
    pub fn matches(&self, request: &FormatEtc) -> bool {
        self.tymed.intersects(request.tymed)
            && self.aspect == request.aspect
            && self.format == request.format
    }
}

impl fmt::Display for FormatEtc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.format, self.aspect, self.tymed)
    }
}
