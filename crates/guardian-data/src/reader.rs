//! CSV snapshot loading and the on-disk report store.
//!
//! A report directory holds `cloud_cost_report_<date>.csv` snapshots,
//! possibly nested. [`LocalReportStore`] lists them with their size and
//! modification time and reads them back as [`RawTable`]s.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use guardian_core::error::{GuardianError, Result};
use guardian_core::models::{clean_cell, RawTable};
use tracing::{debug, warn};

use crate::merger::{is_snapshot_report, CandidateFile, ReportSource};

const UTF8_BOM: char = '\u{feff}';

// ── CSV parsing ───────────────────────────────────────────────────────────────

/// Parse CSV text with a header row into a [`RawTable`].
///
/// Ragged rows are accepted: short rows are padded with missing cells and
/// extra trailing cells are dropped. Missing-value markers become `None`.
pub fn read_csv<R: Read>(reader: R) -> Result<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if i == 0 {
                h.trim_start_matches(UTF8_BOM).to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut table = RawTable::new(headers);
    for record in rdr.records() {
        let record = record?;
        table.push_row(record.iter().map(clean_cell).collect());
    }
    Ok(table)
}

/// Open and parse a CSV file.
pub fn read_csv_path(path: &Path) -> Result<RawTable> {
    let file = File::open(path).map_err(|source| GuardianError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let table = read_csv(file)?;
    debug!(
        "Read {} rows x {} columns from {}",
        table.len(),
        table.columns().len(),
        path.display()
    );
    Ok(table)
}

// ── LocalReportStore ──────────────────────────────────────────────────────────

/// A directory of CSV reports, addressed by path relative to its root.
#[derive(Debug, Clone)]
pub struct LocalReportStore {
    root: PathBuf,
}

impl LocalReportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of a listed candidate.
    pub fn path_of(&self, candidate: &CandidateFile) -> PathBuf {
        self.root.join(&candidate.name)
    }

    /// Every `.csv` file under the root, newest first.
    ///
    /// Names are relative to the root with `/` separators. Files whose
    /// metadata cannot be read are listed without a modification time.
    pub fn list_candidates(&self) -> Result<Vec<CandidateFile>> {
        if !self.root.is_dir() {
            return Err(GuardianError::ReportDirNotFound(self.root.clone()));
        }

        let mut files: Vec<CandidateFile> = walkdir::WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry
                        .path()
                        .extension()
                        .map(|ext| ext.eq_ignore_ascii_case("csv"))
                        .unwrap_or(false)
            })
            .filter_map(|entry| {
                let rel = entry.path().strip_prefix(&self.root).ok()?;
                let name = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let (size, last_modified) = match entry.metadata() {
                    Ok(meta) => (
                        meta.len(),
                        meta.modified().ok().map(DateTime::<Utc>::from),
                    ),
                    Err(e) => {
                        warn!("Cannot stat {}: {}", entry.path().display(), e);
                        (0, None)
                    }
                };
                Some(CandidateFile {
                    name,
                    size,
                    last_modified,
                })
            })
            .collect();

        files.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| a.name.cmp(&b.name))
        });
        debug!("Found {} CSV files in {}", files.len(), self.root.display());
        Ok(files)
    }

    /// The most recently modified snapshot report, or the most recent CSV
    /// of any name when no file looks like a snapshot.
    pub fn latest_report(&self) -> Result<CandidateFile> {
        let files = self.list_candidates()?;
        let snapshot = files.iter().find(|c| is_snapshot_report(&c.name)).cloned();
        snapshot
            .or_else(|| files.into_iter().next())
            .ok_or_else(|| GuardianError::NoReports(self.root.clone()))
    }
}

impl ReportSource for LocalReportStore {
    fn read_report(&self, candidate: &CandidateFile) -> Result<RawTable> {
        read_csv_path(&self.path_of(candidate))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
