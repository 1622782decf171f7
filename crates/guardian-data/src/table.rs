//! Per-record output tables: the full detail table and the compact
//! analysis table, plus the status / resource-type filter used to narrow
//! the detail view.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use guardian_core::deriver::{
    derive_instance_type, derive_status, derive_status_from_rules, effective_hourly_co2,
    effective_hourly_cost, effective_waste_co2_hour, effective_waste_co2_hour_with_status,
    effective_waste_cost_hour, effective_waste_cost_hour_with_status, exclusion_note,
    IdleThresholds,
};
use guardian_core::models::{CanonicalTable, RawTable, Status, HOURS_PER_PERIOD};
use guardian_core::normalizer::normalize;
use serde::Serialize;
use tracing::debug;

/// Header of the detail table, in output order.
pub const DETAIL_COLUMNS: [&str; 11] = [
    "date",
    "resource_type",
    "resource_id",
    "details",
    "cpu",
    "network_kbps",
    "est_cost_day",
    "est_co2_day",
    "waste_cost_day",
    "waste_co2_day",
    "status",
];

/// Descending order with NaN after every number.
pub(crate) fn cmp_desc_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

// ── Detail table ──────────────────────────────────────────────────────────────

/// One row of the detail table. Field order matches [`DETAIL_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    pub date: Option<NaiveDateTime>,
    pub resource_type: Option<String>,
    pub resource_id: String,
    pub details: Option<String>,
    pub cpu: Option<f64>,
    pub network_kbps: Option<f64>,
    pub est_cost_day: f64,
    pub est_co2_day: f64,
    pub waste_cost_day: f64,
    pub waste_co2_day: f64,
    pub status: Status,
}

/// Build detail rows from a normalized table.
///
/// Status is always recomputed from the rules; any status in the source is
/// ignored. Daily figures missing from the source are filled with the
/// effective hourly value × 24. Records without a resource id are dropped.
pub fn detail_rows(table: &CanonicalTable, thresholds: &IdleThresholds) -> Vec<DetailRow> {
    let rows: Vec<DetailRow> = table
        .iter()
        .filter_map(|r| {
            let resource_id = r
                .resource_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())?
                .to_string();
            let status = derive_status_from_rules(r, thresholds);

            Some(DetailRow {
                date: r.date,
                resource_type: r.resource_type.clone(),
                details: r.details.clone(),
                cpu: r.cpu,
                network_kbps: r.network_kbps,
                est_cost_day: r
                    .est_cost_day
                    .unwrap_or_else(|| effective_hourly_cost(r) * HOURS_PER_PERIOD),
                est_co2_day: r
                    .est_co2_day
                    .unwrap_or_else(|| effective_hourly_co2(r) * HOURS_PER_PERIOD),
                waste_cost_day: r.waste_cost_day.unwrap_or_else(|| {
                    effective_waste_cost_hour_with_status(r, &status) * HOURS_PER_PERIOD
                }),
                waste_co2_day: r.waste_co2_day.unwrap_or_else(|| {
                    effective_waste_co2_hour_with_status(r, &status) * HOURS_PER_PERIOD
                }),
                resource_id,
                status,
            })
        })
        .collect();

    debug!(
        "Detail table: {} of {} records kept",
        rows.len(),
        table.len()
    );
    rows
}

/// Normalize `raw` and build the detail table.
pub fn detailed_table(raw: &RawTable, thresholds: &IdleThresholds) -> Vec<DetailRow> {
    detail_rows(&normalize(raw), thresholds)
}

// ── Analysis table ────────────────────────────────────────────────────────────

/// One row of the compact analysis table. Money and CO₂ are hourly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRow {
    pub resource_id: Option<String>,
    pub status: Status,
    pub instance_type: String,
    pub resource_type: Option<String>,
    pub hourly_cost: f64,
    pub waste_cost: f64,
    pub waste_co2_kg: f64,
    pub note: &'static str,
}

/// One row per record, biggest waste first.
///
/// Unlike [`detail_rows`], a status present in the source is trusted.
pub fn analysis_rows(table: &CanonicalTable, thresholds: &IdleThresholds) -> Vec<AnalysisRow> {
    let mut rows: Vec<AnalysisRow> = table
        .iter()
        .map(|r| AnalysisRow {
            resource_id: r.resource_id.clone(),
            status: derive_status(r, thresholds),
            instance_type: derive_instance_type(r),
            resource_type: r.resource_type.clone(),
            hourly_cost: effective_hourly_cost(r),
            waste_cost: effective_waste_cost_hour(r, thresholds),
            waste_co2_kg: effective_waste_co2_hour(r, thresholds),
            note: exclusion_note(r),
        })
        .collect();
    rows.sort_by(|a, b| cmp_desc_nan_last(a.waste_cost, b.waste_cost));
    rows
}

/// Normalize `raw` and build the analysis table.
pub fn minimal_table(raw: &RawTable, thresholds: &IdleThresholds) -> Vec<AnalysisRow> {
    analysis_rows(&normalize(raw), thresholds)
}

// ── Filtering ─────────────────────────────────────────────────────────────────

/// Row filter for the detail view. An empty selection keeps everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailFilter {
    pub statuses: Vec<String>,
    pub resource_types: Vec<String>,
}

impl DetailFilter {
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty() && self.resource_types.is_empty()
    }

    pub fn matches(&self, row: &DetailRow) -> bool {
        let status_ok = self.statuses.is_empty()
            || self
                .statuses
                .iter()
                .any(|s| s.eq_ignore_ascii_case(row.status.label()));
        let type_ok = self.resource_types.is_empty()
            || row
                .resource_type
                .as_deref()
                .map(|t| self.resource_types.iter().any(|s| s == t))
                .unwrap_or(false);
        status_ok && type_ok
    }

    pub fn apply(&self, rows: Vec<DetailRow>) -> Vec<DetailRow> {
        if self.is_empty() {
            return rows;
        }
        rows.into_iter().filter(|r| self.matches(r)).collect()
    }
}

/// Distinct status labels present, sorted.
pub fn status_options(rows: &[DetailRow]) -> Vec<String> {
    rows.iter()
        .map(|r| r.status.label().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct resource types present, sorted.
pub fn resource_type_options(rows: &[DetailRow]) -> Vec<String> {
    rows.iter()
        .filter_map(|r| r.resource_type.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Whether the table looks like a daily cost report rather than an ad-hoc
/// export: it carries daily cost columns, or most rows are dated.
pub fn is_daily_report(table: &CanonicalTable) -> bool {
    if table.is_empty() {
        return false;
    }
    let has_daily = table
        .iter()
        .any(|r| r.est_cost_day.is_some() || r.waste_cost_day.is_some());
    let dated = table.iter().filter(|r| r.date.is_some()).count();
    has_daily || dated * 2 >= table.len()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use guardian_core::deriver::EXCLUSION_NOTE;
    use guardian_core::models::{clean_cell, CanonicalRecord};

    fn raw(columns: &[&str], rows: &[&[&str]]) -> RawTable {
        let mut table = RawTable::new(columns.iter().copied());
        for row in rows {
            table.push_row(row.iter().map(|c| clean_cell(c)).collect());
        }
        table
    }

    fn thresholds() -> IdleThresholds {
        IdleThresholds::default()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // ── detail ────────────────────────────────────────────────────────────────

    #[test]
    fn test_detail_recomputes_status_from_rules() {
        let table = raw(
            &["Resource ID", "Status", "CPU %", "Network (KB/s)"],
            &[&["i-1", "Busy", "1", "1"]],
        );
        let rows = detailed_table(&table, &thresholds());
        assert_eq!(rows[0].status, Status::Idle);
    }

    #[test]
    fn test_detail_fills_daily_from_hourly() {
        let table = raw(
            &["Resource ID", "Hourly Cost", "CO2 (kg)", "CPU %", "Network (KB/s)"],
            &[&["i-1", "0.5", "0.01", "1", "1"]],
        );
        let row = &detailed_table(&table, &thresholds())[0];
        assert!(approx(row.est_cost_day, 12.0));
        assert!(approx(row.est_co2_day, 0.24));
        // Idle, so the whole cost is waste.
        assert!(approx(row.waste_cost_day, 12.0));
        assert!(approx(row.waste_co2_day, 0.24));
    }

    #[test]
    fn test_detail_keeps_present_daily_values() {
        let table = raw(
            &["Resource ID", "Est. Cost ($)", "Waste Cost ($)", "CPU %", "Network (KB/s)"],
            &[&["i-1", "48", "7", "50", "50"]],
        );
        let row = &detailed_table(&table, &thresholds())[0];
        assert!(approx(row.est_cost_day, 48.0));
        assert!(approx(row.waste_cost_day, 7.0));
        assert_eq!(row.status, Status::Busy);
    }

    #[test]
    fn test_detail_busy_has_no_waste() {
        let table = raw(
            &["Resource ID", "Hourly Cost", "CPU %", "Network (KB/s)"],
            &[&["i-1", "1.0", "80", "300"]],
        );
        let row = &detailed_table(&table, &thresholds())[0];
        assert!(approx(row.est_cost_day, 24.0));
        assert!(approx(row.waste_cost_day, 0.0));
    }

    #[test]
    fn test_detail_drops_rows_without_id() {
        let table = raw(
            &["Resource ID", "Hourly Cost"],
            &[&["i-1", "1"], &["", "2"], &["  ", "3"]],
        );
        let rows = detailed_table(&table, &thresholds());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].resource_id, "i-1");
    }

    #[test]
    fn test_detail_empty_input() {
        assert!(detailed_table(&RawTable::default(), &thresholds()).is_empty());
    }

    // ── analysis ──────────────────────────────────────────────────────────────

    #[test]
    fn test_analysis_sorted_by_waste_desc() {
        let table = raw(
            &["Resource ID", "Waste Cost", "Status"],
            &[&["a", "0.1", "Idle"], &["b", "0.9", "Idle"], &["c", "0.5", "Idle"]],
        );
        let ids: Vec<String> = minimal_table(&table, &thresholds())
            .into_iter()
            .filter_map(|r| r.resource_id)
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_analysis_trusts_source_status() {
        let table = raw(
            &["Resource ID", "Status", "Hourly Cost", "CPU %", "Network (KB/s)"],
            &[&["i-1", "Busy", "2", "1", "1"]],
        );
        let row = &minimal_table(&table, &thresholds())[0];
        assert_eq!(row.status, Status::Busy);
        assert!(approx(row.waste_cost, 0.0));
        assert!(approx(row.hourly_cost, 2.0));
    }

    #[test]
    fn test_analysis_instance_type_and_note() {
        let table = raw(
            &["Resource ID", "Details"],
            &[&["i-1", "Type: m5.large, Tags: Excluded: DoNotStop=True"]],
        );
        let row = &minimal_table(&table, &thresholds())[0];
        assert_eq!(row.instance_type, "m5.large");
        assert_eq!(row.note, EXCLUSION_NOTE);
    }

    #[test]
    fn test_cmp_desc_nan_last() {
        let mut values = vec![1.0, f64::NAN, 3.0, 2.0];
        values.sort_by(|a, b| cmp_desc_nan_last(*a, *b));
        assert_eq!(&values[..3], &[3.0, 2.0, 1.0]);
        assert!(values[3].is_nan());
    }

    // ── filter ────────────────────────────────────────────────────────────────

    fn detail(id: &str, rtype: Option<&str>, status: Status) -> DetailRow {
        DetailRow {
            date: None,
            resource_type: rtype.map(str::to_string),
            resource_id: id.to_string(),
            details: None,
            cpu: None,
            network_kbps: None,
            est_cost_day: 0.0,
            est_co2_day: 0.0,
            waste_cost_day: 0.0,
            waste_co2_day: 0.0,
            status,
        }
    }

    #[test]
    fn test_filter_empty_keeps_all() {
        let rows = vec![detail("a", None, Status::Idle), detail("b", None, Status::Busy)];
        assert_eq!(DetailFilter::default().apply(rows).len(), 2);
    }

    #[test]
    fn test_filter_by_status_and_type() {
        let rows = vec![
            detail("a", Some("EC2"), Status::Idle),
            detail("b", Some("EC2"), Status::Busy),
            detail("c", Some("EBS"), Status::Idle),
            detail("d", None, Status::Idle),
        ];
        let filter = DetailFilter {
            statuses: vec!["idle".to_string()],
            resource_types: vec!["EC2".to_string()],
        };
        let kept: Vec<String> = filter.apply(rows).into_iter().map(|r| r.resource_id).collect();
        assert_eq!(kept, vec!["a"]);
    }

    #[test]
    fn test_options_sorted_distinct() {
        let rows = vec![
            detail("a", Some("EC2"), Status::Idle),
            detail("b", Some("EBS"), Status::Busy),
            detail("c", Some("EC2"), Status::Idle),
            detail("d", None, Status::Idle),
        ];
        assert_eq!(status_options(&rows), vec!["Busy", "Idle"]);
        assert_eq!(resource_type_options(&rows), vec!["EBS", "EC2"]);
    }

    // ── is_daily_report ───────────────────────────────────────────────────────

    #[test]
    fn test_is_daily_report() {
        let daily = CanonicalTable::new(vec![CanonicalRecord {
            est_cost_day: Some(1.0),
            ..Default::default()
        }]);
        assert!(is_daily_report(&daily));

        let undated = CanonicalTable::new(vec![
            CanonicalRecord::default(),
            CanonicalRecord::default(),
        ]);
        assert!(!is_daily_report(&undated));
        assert!(!is_daily_report(&CanonicalTable::default()));
    }
}
