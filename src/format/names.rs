//! Format-name registration table.
//!
//! Maps format names to [`ClipFormat`] ids. Predefined formats have
//! fixed names; any other name gets an id from the registered range
//! the first time it is seen, and the same id on every later call.

use std::collections::HashMap;

use super::ClipFormat;

const PREDEFINED: &[(ClipFormat, &str)] = &[
    (ClipFormat::TEXT, "text"),
    (ClipFormat::BITMAP, "bitmap"),
    (ClipFormat::METAFILEPICT, "metafilepict"),
    (ClipFormat::SYLK, "sylk"),
    (ClipFormat::DIF, "dif"),
    (ClipFormat::TIFF, "tiff"),
    (ClipFormat::OEMTEXT, "oemtext"),
    (ClipFormat::DIB, "dib"),
    (ClipFormat::PALETTE, "palette"),
    (ClipFormat::RIFF, "riff"),
    (ClipFormat::WAVE, "wave"),
    (ClipFormat::UNICODETEXT, "unicodetext"),
    (ClipFormat::ENHMETAFILE, "enhmetafile"),
    (ClipFormat::HDROP, "hdrop"),
    (ClipFormat::LOCALE, "locale"),
    (ClipFormat::DIBV5, "dibv5"),
];

/// Shell format names commonly advertised by drag sources.
pub const FILE_GROUP_DESCRIPTOR: &str = "FileGroupDescriptorW";
pub const FILE_CONTENTS: &str = "FileContents";
pub const PREFERRED_DROP_EFFECT: &str = "Preferred DropEffect";
pub const SHELL_ID_LIST: &str = "Shell IDList Array";

/// Name of a predefined format, if `format` is one.
pub fn predefined_name(format: ClipFormat) -> Option<&'static str> {
    PREDEFINED
        .iter()
        .find(|(f, _)| *f == format)
        .map(|(_, name)| *name)
}

/// Predefined format with this name, compared ASCII case-insensitively.
pub fn predefined_format(name: &str) -> Option<ClipFormat> {
    PREDEFINED
        .iter()
        .find(|(_, n)| n.eq_ignore_ascii_case(name))
        .map(|(f, _)| *f)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FormatNameError {
    #[error("format name is empty")]
    EmptyName,
    #[error("registered format range exhausted")]
    Exhausted,
}

/// Name ↔ id table for registered formats.
#[derive(Debug)]
pub struct FormatNames {
    /// Keyed by ASCII-lowercased name.
    by_name: HashMap<String, ClipFormat>,
    /// Original spelling, indexed by `id - FIRST_REGISTERED`.
    names: Vec<String>,
}

impl FormatNames {
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
            names: Vec::new(),
        }
    }

    /// Register `name`, returning its id.
    ///
    /// Predefined names resolve to their fixed id. Names compare
    /// case-insensitively; the first spelling registered is kept.
    pub fn register(&mut self, name: &str) -> Result<ClipFormat, FormatNameError> {
        if name.is_empty() {
            return Err(FormatNameError::EmptyName);
        }
        if let Some(format) = self.lookup(name) {
            return Ok(format);
        }

        let offset = self.names.len();
        let id = usize::from(ClipFormat::FIRST_REGISTERED) + offset;
        let id = u16::try_from(id).map_err(|_| FormatNameError::Exhausted)?;
        let format = ClipFormat(id);

        self.by_name.insert(name.to_ascii_lowercase(), format);
        self.names.push(name.to_string());
        tracing::debug!(name, id = format.0, "registered format");
        Ok(format)
    }

    /// Resolve a name without registering it.
    pub fn lookup(&self, name: &str) -> Option<ClipFormat> {
        predefined_format(name).or_else(|| self.by_name.get(&name.to_ascii_lowercase()).copied())
    }

    /// Name for a predefined or registered id.
    pub fn name_of(&self, format: ClipFormat) -> Option<&str> {
        if let Some(name) = predefined_name(format) {
            return Some(name);
        }
        let offset = format.0.checked_sub(ClipFormat::FIRST_REGISTERED)?;
        self.names.get(usize::from(offset)).map(String::as_str)
    }

    /// Number of registered (non-predefined) names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for FormatNames {
    fn default() -> Self {
        Self::new()
    }
}
