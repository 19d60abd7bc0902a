//! Zip packing for bulk downloads.

use crate::blob::sanitize_file_name;
use crate::Result;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub fn archive_file_name(date: NaiveDate) -> String {
    format!("roi_images_{}.zip", date.format("%Y-%m-%d"))
}

/// Pack `(name, bytes)` pairs into one zip archive, in order.
///
/// Path separators in names become `_`, so every entry extracts into the
/// archive root. Repeated names get ` (n)` inserted before the extension so no
/// entry is silently replaced.
pub fn build_zip(entries: Vec<(String, Vec<u8>)>) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let mut used = HashSet::new();
    for (name, data) in entries {
        let name = unique_name(&sanitize_file_name(&name), &mut used);
        writer.start_file(name.as_str(), options)?;
        writer.write_all(&data)?;
    }

    Ok(writer.finish()?.into_inner())
}

fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    let mut n = 1;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
