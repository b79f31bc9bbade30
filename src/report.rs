//! Report formatting and export
//!
//! At process shutdown the host takes a snapshot of the quiescent registry
//! and hands it to `export`, which sorts by discovery sequence and writes
//! one fixed-width line per page. Export failure is never fatal: the
//! instrumented process must be able to finish shutting down even when the
//! report cannot be written, so errors are logged and swallowed here.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::registry::PageRecord;

/// Report width of a page id: `0x` plus two hex digits per pointer byte.
const PAGE_ID_WIDTH: usize = 2 + 2 * std::mem::size_of::<usize>();

/// Default report path: `<base_dir>/pagein.<pid>`, where `base_dir` is the
/// process's startup working directory.
pub fn default_report_path(base_dir: &Path) -> PathBuf {
    base_dir.join(format!("pagein.{}", std::process::id()))
}

/// Format one report line.
///
/// `rank` is the 0-based position in sequence order; since records are
/// sorted by their unique `sequence`, rank and sequence coincide.
/// `relative_ticks` uses wrapping subtraction: a record stamped on a core
/// whose counter reads behind the baseline wraps to a huge value rather
/// than panicking. Known limitation of per-core counters, carried as-is.
fn format_line(rank: usize, record: &PageRecord, baseline: u64) -> String {
    let relative_ticks = record.timestamp.wrapping_sub(baseline);
    format!(
        "{rank:4} {page:#0width$x} {tag} {relative_ticks:12} {location}\n",
        page = record.page_id,
        width = PAGE_ID_WIDTH,
        tag = record.origin.tag(),
        location = record.location,
    )
}

fn open_report(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// Write the first-touch report for `records` to `path`.
///
/// Records are sorted ascending by discovery sequence (unique, so no ties);
/// the baseline for relative timing is the timestamp of the rank-0 record.
/// An empty snapshot still produces an empty report file.
///
/// Failure to open or write the report is non-fatal: a warning is logged
/// and the function returns so process shutdown can proceed.
pub fn export(mut records: Vec<PageRecord>, path: &Path) {
    records.sort_by_key(|r| r.sequence);
    let baseline = records.first().map(|r| r.timestamp).unwrap_or(0);

    let file = match open_report(path) {
        Ok(file) => file,
        Err(err) => {
            warn!(path = %path.display(), %err, "skipping page-in report");
            return;
        }
    };

    let mut out = BufWriter::new(file);
    for (rank, record) in records.iter().enumerate() {
        if let Err(err) = out.write_all(format_line(rank, record, baseline).as_bytes()) {
            warn!(path = %path.display(), %err, "truncated page-in report");
            return;
        }
    }
    if let Err(err) = out.flush() {
        warn!(path = %path.display(), %err, "truncated page-in report");
    }
}
