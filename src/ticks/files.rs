//! Tick container discovery
//!
//! Containers are named `<dataset>-YYYYMMDD.<kind>.<dbn|csv>.zst`. Anything
//! that does not follow the pattern is left out of the window rather than
//! failing the run.

use super::{StreamKind, TickEncoding, TickFile};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

/// Parse `<dataset>-YYYYMMDD.<kind>.<ext>` into its date, stream kind and
/// encoding
///
/// The dataset part may itself contain dots and dashes.
pub fn parse_tick_filename(name: &str) -> Option<(NaiveDate, StreamKind, TickEncoding)> {
    let (stem, kind, encoding) = [StreamKind::Trades, StreamKind::Tbbo]
        .into_iter()
        .flat_map(|kind| TickEncoding::ALL.into_iter().map(move |enc| (kind, enc)))
        .find_map(|(kind, enc)| {
            let suffix = format!(".{}.{}", kind.as_str(), enc.extension());
            name.strip_suffix(suffix.as_str()).map(|stem| (stem, kind, enc))
        })?;

    let (dataset, digits) = stem.rsplit_once('-')?;
    if dataset.is_empty() || digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let date = NaiveDate::parse_from_str(digits, "%Y%m%d").ok()?;
    Some((date, kind, encoding))
}

/// List every container of `kind` in `dir`, sorted by date then path
///
/// A missing directory yields an empty list. A day present in both encodings
/// is read from its DBN container only.
pub fn list_tick_files(dir: &Path, kind: StreamKind) -> io::Result<Vec<TickFile>> {
    if !dir.is_dir() {
        tracing::debug!(dir = ?dir, kind = %kind, "Tick directory not found");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if name == "symbology.json" || name.ends_with(".tmp") {
            continue;
        }
        match parse_tick_filename(&name) {
            Some((date, file_kind, encoding)) if file_kind == kind => {
                files.push(TickFile {
                    date,
                    kind,
                    encoding,
                    path,
                });
            }
            Some(_) => {}
            None => {
                tracing::warn!(file = %name, kind = %kind, "Skipping file without a parsable date/kind");
            }
        }
    }

    // Encodings sort DBN first, so the CSV twin of a DBN container is dropped.
    files.sort_by(|a, b| (a.date, a.encoding, &a.path).cmp(&(b.date, b.encoding, &b.path)));
    let mut seen = BTreeSet::new();
    files.retain(|file| {
        let name = file.file_name();
        let stem = name
            .strip_suffix(file.encoding.extension())
            .unwrap_or(&name)
            .to_string();
        let fresh = seen.insert(stem);
        if !fresh {
            tracing::info!(file = %name, "Skipping container already present as DBN");
        }
        fresh
    });
    files.sort_by(|a, b| (a.date, &a.path).cmp(&(b.date, &b.path)));
    Ok(files)
}

/// Containers of `kind` whose embedded date falls in `[from, to]`
pub fn discover_tick_files(
    dir: &Path,
    kind: StreamKind,
    from: NaiveDate,
    to: NaiveDate,
) -> io::Result<Vec<TickFile>> {
    Ok(list_tick_files(dir, kind)?
        .into_iter()
        .filter(|f| f.date >= from && f.date <= to)
        .collect())
}

/// Distinct years covered by the containers of `kind` in `dir`
pub fn discover_years(dir: &Path, kind: StreamKind) -> io::Result<BTreeSet<i32>> {
    use chrono::Datelike;

    Ok(list_tick_files(dir, kind)?
        .into_iter()
        .map(|f| f.date.year())
        .collect())
}
