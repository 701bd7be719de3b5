//! Output formatting for CLI client commands.
//!
//! Tables and status lines go to stdout. For `get`, raw payload bytes
//! go to stdout and any description to stderr, so piping works
//! (`xferd client get <object> --format text > out.txt`).

use std::io::{self, Write};

use crate::format::FormatEtc;
use crate::hresult::HResult;
use crate::ipc::protocol::ObjectDescriptor;
use crate::medium::Medium;

/// Print hosted objects as a table.
pub fn print_objects(objects: &[ObjectDescriptor]) {
    if objects.is_empty() {
        println!("No hosted objects");
        return;
    }

    println!("{:<38} {:>7} NAME", "OBJECT", "FORMATS");
    println!("{}", "-".repeat(60));
    for o in objects {
        println!(
            "{:<38} {:>7} {}",
            o.object,
            o.formats,
            o.name.as_deref().unwrap_or("-")
        );
    }
}

/// Print format descriptors as a table, in enumeration order.
pub fn print_formats(formats: &[FormatEtc]) {
    if formats.is_empty() {
        println!("No formats");
        return;
    }

    println!("{:<16} {:<10} {:>6} TYMED", "FORMAT", "ASPECT", "LINDEX");
    println!("{}", "-".repeat(50));
    for f in formats {
        println!("{}", format_row(f));
    }
}

pub fn print_query(request: &FormatEtc, status: HResult) {
    println!("{request}: {}", describe_query(status));
}

pub fn print_published(object: &str) {
    println!("{object}");
}

/// Write a fetched medium: payload bytes to stdout, anything that is
/// not a byte payload as a line on stderr.
pub fn write_medium(medium: &Medium) -> Result<(), io::Error> {
    match medium {
        Medium::File(path) => {
            println!("{}", path.display());
            Ok(())
        }
        Medium::Gdi(bitmap) => {
            eprintln!("Bitmap:    {}x{}", bitmap.width, bitmap.height);
            io::stdout().lock().write_all(&bitmap.bits)
        }
        Medium::Foreign { tymed, handle } => {
            eprintln!("Platform handle {handle:#x} ({tymed}); no bytes to show");
            Ok(())
        }
        other => {
            let bytes = other.bytes().unwrap_or_default();
            let mut stdout = io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()
        }
    }
}

fn format_row(f: &FormatEtc) -> String {
    format!(
        "{:<16} {:<10} {:>6} {}",
        f.format.to_string(),
        f.aspect.to_string(),
        f.lindex,
        f.tymed
    )
}

fn describe_query(status: HResult) -> String {
    let meaning = match status {
        HResult::S_OK => "available",
        HResult::DV_E_DVASPECT => "wrong aspect",
        HResult::DV_E_TYMED => "not in any requested medium",
        HResult::DV_E_CLIPFORMAT => "format not offered",
        _ => "unavailable",
    };
    format!("{meaning} [{status}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Aspect, ClipFormat, Tymed};

    #[test]
    fn row_for_predefined_format() {
        let row = format_row(&FormatEtc::new(ClipFormat::TEXT, Tymed::HGLOBAL));
        assert!(row.starts_with("text"));
        assert!(row.contains("content"));
        assert!(row.contains("-1"));
        assert!(row.ends_with("hglobal"));
    }

    #[test]
    fn row_for_registered_format_and_medium_set() {
        let f = FormatEtc::new(ClipFormat(0xC003), Tymed::HGLOBAL | Tymed::ISTREAM)
            .with_aspect(Aspect::Icon);
        let row = format_row(&f);
        assert!(row.starts_with("#0xc003"));
        assert!(row.contains("icon"));
        assert!(row.ends_with("hglobal|istream"));
    }

    #[test]
    fn query_descriptions() {
        assert!(describe_query(HResult::S_OK).starts_with("available"));
        assert!(describe_query(HResult::DV_E_CLIPFORMAT).starts_with("format not offered"));
        assert!(describe_query(HResult::DV_E_TYMED).contains("DV_E_TYMED"));
        assert!(describe_query(HResult::E_INVALIDARG).starts_with("unavailable"));
    }
}
