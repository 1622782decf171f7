//! Multi-snapshot merging for the waste trend.
//!
//! Each collection run writes one snapshot; the trend needs several. The
//! merger picks the newest snapshots from a [`ReportSource`], stamps rows
//! that lack a date with the run date, and concatenates them into one raw
//! table ready for normalization.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use guardian_core::error::Result;
use guardian_core::models::{CanonicalField, RawTable};
use guardian_core::normalizer::aliases;
use guardian_core::time_utils::{start_of_day, utc_day};
use regex::Regex;
use tracing::{debug, warn};

/// Column written into snapshots that carry no date of their own.
const DATE_COLUMN: &str = "date";

/// One file offered by a report store listing.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFile {
    /// Key or relative path; the file name is its last `/` segment.
    pub name: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, size: u64, last_modified: Option<DateTime<Utc>>) -> Self {
        Self {
            name: name.into(),
            size,
            last_modified,
        }
    }

    /// The date of the collection run this file came from: the date in
    /// its name, else its modification day.
    pub fn run_date(&self) -> Option<NaiveDate> {
        filename_date(&self.name).or_else(|| self.last_modified.map(utc_day))
    }

    fn rank_key(&self) -> NaiveDateTime {
        filename_date(&self.name)
            .map(start_of_day)
            .or_else(|| self.last_modified.map(|ts| ts.naive_utc()))
            .unwrap_or(NaiveDateTime::MIN)
    }
}

/// Anything that can fetch a listed report as a raw table.
pub trait ReportSource {
    fn read_report(&self, candidate: &CandidateFile) -> Result<RawTable>;
}

/// Result of [`merge_reports`].
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub table: RawTable,
    /// Number of files whose rows made it into `table`.
    pub files_used: usize,
    /// Names of selected files that could not be read.
    pub skipped: Vec<String>,
}

fn base_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Whether a file name looks like a scheduled cost snapshot.
pub fn is_snapshot_report(name: &str) -> bool {
    let lower = base_name(name).to_lowercase();
    lower.ends_with(".csv") && lower.contains("cloud_cost_report")
}

fn date_token_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4}-\d{2}-\d{2})").expect("regex is valid"))
}

/// The first valid `YYYY-MM-DD` token in the file name, if any.
pub fn filename_date(name: &str) -> Option<NaiveDate> {
    date_token_pattern()
        .captures_iter(base_name(name))
        .filter_map(|c| c.get(1))
        .find_map(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
}

/// Snapshot reports only, newest first.
///
/// The embedded filename date ranks a file when present, otherwise its
/// modification time. Files with neither sort last; ties keep listing
/// order.
pub fn rank_candidates(candidates: &[CandidateFile]) -> Vec<CandidateFile> {
    let mut ranked: Vec<CandidateFile> = candidates
        .iter()
        .filter(|c| is_snapshot_report(&c.name))
        .cloned()
        .collect();
    ranked.sort_by(|a, b| b.rank_key().cmp(&a.rank_key()));
    ranked
}

fn has_date_values(table: &RawTable) -> bool {
    aliases(CanonicalField::Date)
        .iter()
        .any(|name| table.column_has_values(name))
}

/// Merge the `max_files` newest snapshots into one raw table.
///
/// Unreadable files are logged, listed in [`MergeOutcome::skipped`] and
/// left out; the rest are still merged.
pub fn merge_reports<S>(source: &S, candidates: &[CandidateFile], max_files: usize) -> MergeOutcome
where
    S: ReportSource + ?Sized,
{
    let selected: Vec<CandidateFile> = rank_candidates(candidates)
        .into_iter()
        .take(max_files)
        .collect();

    let mut tables = Vec::with_capacity(selected.len());
    let mut skipped = Vec::new();

    for candidate in &selected {
        let mut table = match source.read_report(candidate) {
            Ok(t) => t,
            Err(e) => {
                warn!("Skipping report {}: {}", candidate.name, e);
                skipped.push(candidate.name.clone());
                continue;
            }
        };

        if !has_date_values(&table) {
            if let Some(day) = candidate.run_date() {
                table.set_column(DATE_COLUMN, Some(day.format("%Y-%m-%d").to_string()));
            }
        }
        tables.push(table);
    }

    let files_used = tables.len();
    let table = RawTable::concat(&tables);
    debug!(
        "Merged {} rows from {} of {} selected reports",
        table.len(),
        files_used,
        selected.len()
    );

    MergeOutcome {
        table,
        files_used,
        skipped,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
