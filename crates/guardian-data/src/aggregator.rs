//! Summary views over a normalized table: KPIs, the daily waste trend,
//! waste breakdowns and the top-N ranking.
//!
//! Every figure is recomputed from per-record derivation; pre-aggregated
//! columns in the source are never summed directly.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Duration, NaiveDate};
use guardian_core::deriver::{
    derive_instance_type, derive_status, effective_hourly_co2, effective_hourly_cost,
    effective_waste_co2_hour_with_status, effective_waste_cost_hour_with_status, is_protected,
    IdleThresholds,
};
use guardian_core::models::{CanonicalRecord, CanonicalTable, Status};
use serde::Serialize;
use tracing::debug;

use crate::table::cmp_desc_nan_last;

/// Distinct days needed for a trend to count as complete.
pub const FULL_TREND_DAYS: usize = 30;
/// Distinct days needed for a trend to be worth reading.
pub const MIN_TREND_DAYS: usize = 7;

/// Per-record derived figures shared by every view.
struct Derived {
    status: Status,
    hourly_cost: f64,
    co2: f64,
    waste_cost: f64,
    waste_co2: f64,
}

impl Derived {
    fn of(record: &CanonicalRecord, thresholds: &IdleThresholds) -> Self {
        let status = derive_status(record, thresholds);
        Self {
            hourly_cost: effective_hourly_cost(record),
            co2: effective_hourly_co2(record),
            waste_cost: effective_waste_cost_hour_with_status(record, &status),
            waste_co2: effective_waste_co2_hour_with_status(record, &status),
            status,
        }
    }
}

// ── KPIs ──────────────────────────────────────────────────────────────────────

/// Headline totals. All money and CO₂ figures are hourly.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Kpis {
    pub rows: usize,
    pub hourly_cost_total: f64,
    pub waste_cost_total: f64,
    pub co2_total: f64,
    pub waste_co2_total: f64,
}

pub fn kpis(table: &CanonicalTable, thresholds: &IdleThresholds) -> Kpis {
    table.iter().fold(
        Kpis {
            rows: table.len(),
            ..Default::default()
        },
        |mut acc, record| {
            let d = Derived::of(record, thresholds);
            acc.hourly_cost_total += d.hourly_cost;
            acc.waste_cost_total += d.waste_cost;
            acc.co2_total += d.co2;
            acc.waste_co2_total += d.waste_co2;
            acc
        },
    )
}

// ── Trend ─────────────────────────────────────────────────────────────────────

/// Waste summed over one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub waste_cost: f64,
    pub waste_co2: f64,
}

/// Hourly waste summed per calendar day, oldest first.
///
/// Records without a date are left out; a table with no dates yields an
/// empty series. Every calendar day between the first and last dated record
/// gets a point, with zero waste on days that have no records.
pub fn daily_trend(table: &CanonicalTable, thresholds: &IdleThresholds) -> Vec<TrendPoint> {
    let mut by_day: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
    for record in table {
        let Some(ts) = record.date else { continue };
        let d = Derived::of(record, thresholds);
        let slot = by_day.entry(ts.date()).or_insert((0.0, 0.0));
        slot.0 += d.waste_cost;
        slot.1 += d.waste_co2;
    }

    let (Some(&first), Some(&last)) = (by_day.keys().next(), by_day.keys().next_back()) else {
        return Vec::new();
    };

    let points: Vec<TrendPoint> = first
        .iter_days()
        .take_while(|date| *date <= last)
        .map(|date| {
            let (waste_cost, waste_co2) = by_day.get(&date).copied().unwrap_or((0.0, 0.0));
            TrendPoint {
                date,
                waste_cost,
                waste_co2,
            }
        })
        .collect();
    debug!(
        "Daily trend spans {} days ({} with records)",
        points.len(),
        by_day.len()
    );
    points
}

/// Points in the `days` calendar days ending at `today`, `today` included.
/// A zero-day window is empty.
pub fn recent_window(points: &[TrendPoint], today: NaiveDate, days: u32) -> Vec<TrendPoint> {
    if days == 0 {
        return Vec::new();
    }
    let start = today - Duration::days(i64::from(days) - 1);
    points
        .iter()
        .filter(|p| p.date >= start && p.date <= today)
        .cloned()
        .collect()
}

/// How much history backs a trend series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendHealth {
    /// At least [`FULL_TREND_DAYS`] days.
    Complete,
    /// At least [`MIN_TREND_DAYS`] days.
    Partial,
    /// Some data, but too little to read a trend from.
    Sparse,
    Empty,
}

impl TrendHealth {
    pub fn message(self) -> &'static str {
        match self {
            TrendHealth::Complete => "Full 30-day history available.",
            TrendHealth::Partial => "Partial history: fewer than 30 days of reports.",
            TrendHealth::Sparse => "Sparse history: fewer than 7 days of reports; trend may mislead.",
            TrendHealth::Empty => "No dated records; trend unavailable.",
        }
    }
}

/// Grade the history behind a table by the distinct days that carry
/// records. Gap-filled trend days do not count.
pub fn trend_health(table: &CanonicalTable) -> TrendHealth {
    let days: BTreeSet<NaiveDate> = table.iter().filter_map(|r| r.date).map(|d| d.date()).collect();
    match days.len() {
        0 => TrendHealth::Empty,
        n if n >= FULL_TREND_DAYS => TrendHealth::Complete,
        n if n >= MIN_TREND_DAYS => TrendHealth::Partial,
        _ => TrendHealth::Sparse,
    }
}

// ── Breakdowns ────────────────────────────────────────────────────────────────

/// Hourly waste cost of one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    /// Group label; `None` for records missing the grouping field.
    pub key: Option<String>,
    pub waste_cost: f64,
}

/// Sum waste per key, keeping groups in first-seen order before a stable
/// descending sort.
fn breakdown_by<F>(table: &CanonicalTable, thresholds: &IdleThresholds, key_of: F) -> Vec<Breakdown>
where
    F: Fn(&CanonicalRecord, &Derived) -> Option<String>,
{
    let mut index: HashMap<Option<String>, usize> = HashMap::new();
    let mut groups: Vec<Breakdown> = Vec::new();
    for record in table {
        let d = Derived::of(record, thresholds);
        let key = key_of(record, &d);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(Breakdown {
                key,
                waste_cost: 0.0,
            });
            groups.len() - 1
        });
        groups[slot].waste_cost += d.waste_cost;
    }
    groups.sort_by(|a, b| cmp_desc_nan_last(a.waste_cost, b.waste_cost));
    groups
}

pub fn breakdown_by_type(table: &CanonicalTable, thresholds: &IdleThresholds) -> Vec<Breakdown> {
    breakdown_by(table, thresholds, |r, _| r.resource_type.clone())
}

pub fn breakdown_by_status(table: &CanonicalTable, thresholds: &IdleThresholds) -> Vec<Breakdown> {
    breakdown_by(table, thresholds, |_, d| Some(d.status.label().to_string()))
}

// ── Top-N ─────────────────────────────────────────────────────────────────────

/// One resource's waste summed across all its records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopResource {
    pub resource_id: Option<String>,
    pub instance_type: Option<String>,
    pub resource_type: Option<String>,
    pub status: Status,
    pub mean_hourly_cost: f64,
    pub waste_cost: f64,
    pub waste_co2: f64,
    #[serde(skip)]
    records: usize,
}

/// The `n` resources with the largest summed waste cost.
///
/// Records are grouped by resource id (records lacking one form a single
/// group). Ties keep first-seen order.
pub fn top_n_by_waste(table: &CanonicalTable, thresholds: &IdleThresholds, n: usize) -> Vec<TopResource> {
    let mut index: HashMap<Option<String>, usize> = HashMap::new();
    let mut groups: Vec<TopResource> = Vec::new();

    for record in table {
        let d = Derived::of(record, thresholds);
        let instance_type = Some(derive_instance_type(record)).filter(|s| !s.is_empty());
        let slot = *index.entry(record.resource_id.clone()).or_insert_with(|| {
            groups.push(TopResource {
                resource_id: record.resource_id.clone(),
                instance_type: None,
                resource_type: None,
                status: d.status.clone(),
                mean_hourly_cost: 0.0,
                waste_cost: 0.0,
                waste_co2: 0.0,
                records: 0,
            });
            groups.len() - 1
        });

        let group = &mut groups[slot];
        if group.instance_type.is_none() {
            group.instance_type = instance_type;
        }
        if group.resource_type.is_none() {
            group.resource_type = record.resource_type.clone();
        }
        // Running sum; divided by the record count below.
        group.mean_hourly_cost += d.hourly_cost;
        group.waste_cost += d.waste_cost;
        group.waste_co2 += d.waste_co2;
        group.records += 1;
    }

    for group in &mut groups {
        if group.records > 0 {
            group.mean_hourly_cost /= group.records as f64;
        }
    }

    groups.sort_by(|a, b| cmp_desc_nan_last(a.waste_cost, b.waste_cost));
    groups.truncate(n);
    groups
}

// ── Filters ───────────────────────────────────────────────────────────────────

/// Drop records tagged `DoNotStop=True`.
pub fn exclude_protected(table: &CanonicalTable) -> CanonicalTable {
    let kept: Vec<CanonicalRecord> = table
        .iter()
        .filter(|r| !is_protected(r))
        .cloned()
        .collect();
    debug!("Excluded {} protected records", table.len() - kept.len());
    CanonicalTable::new(kept)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn at(d: u32, h: u32) -> Option<NaiveDateTime> {
        day(d).and_hms_opt(h, 0, 0)
    }

    fn waste(id: &str, date: Option<NaiveDateTime>, waste_cost: f64) -> CanonicalRecord {
        CanonicalRecord {
            resource_id: Some(id.to_string()),
            date,
            waste_cost_hour: Some(waste_cost),
            waste_co2_hour: Some(waste_cost / 10.0),
            ..Default::default()
        }
    }

    fn t() -> IdleThresholds {
        IdleThresholds::default()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // ── kpis ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_kpis_from_derived_values() {
        let table = CanonicalTable::new(vec![
            // Idle by metrics, daily cost only: 1.0/h, all waste.
            CanonicalRecord {
                est_cost_day: Some(24.0),
                cpu: Some(1.0),
                network_kbps: Some(1.0),
                ..Default::default()
            },
            // Busy: cost but no waste.
            CanonicalRecord {
                hourly_cost: Some(2.0),
                co2_hour: Some(0.5),
                cpu: Some(60.0),
                network_kbps: Some(60.0),
                ..Default::default()
            },
        ]);
        let k = kpis(&table, &t());
        assert_eq!(k.rows, 2);
        assert!(approx(k.hourly_cost_total, 3.0));
        assert!(approx(k.waste_cost_total, 1.0));
        assert!(approx(k.co2_total, 0.5));
        assert!(approx(k.waste_co2_total, 0.0));
    }

    #[test]
    fn test_kpis_empty() {
        assert_eq!(kpis(&CanonicalTable::default(), &t()), Kpis::default());
    }

    // ── trend ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_daily_trend_sums_per_day() {
        let table = CanonicalTable::new(vec![
            waste("a", at(1, 9), 1.0),
            waste("b", at(2, 0), 3.0),
            waste("c", at(1, 17), 2.0),
            waste("d", None, 100.0),
        ]);
        let trend = daily_trend(&table, &t());
        let series: Vec<(NaiveDate, f64)> = trend.iter().map(|p| (p.date, p.waste_cost)).collect();
        assert_eq!(series, vec![(day(1), 3.0), (day(2), 3.0)]);
        assert!(approx(trend[0].waste_co2, 0.3));
    }

    #[test]
    fn test_daily_trend_fills_gap_days_with_zero() {
        let table = CanonicalTable::new(vec![waste("a", at(1, 6), 1.0), waste("b", at(3, 6), 2.0)]);
        let trend = daily_trend(&table, &t());
        let series: Vec<(NaiveDate, f64)> = trend.iter().map(|p| (p.date, p.waste_cost)).collect();
        assert_eq!(series, vec![(day(1), 1.0), (day(2), 0.0), (day(3), 2.0)]);
        assert_eq!(trend[1].waste_co2, 0.0);
    }

    #[test]
    fn test_daily_trend_no_dates() {
        let table = CanonicalTable::new(vec![waste("a", None, 1.0)]);
        assert!(daily_trend(&table, &t()).is_empty());
    }

    fn points_on(days: &[u32]) -> Vec<TrendPoint> {
        days.iter()
            .map(|&d| TrendPoint {
                date: day(d),
                waste_cost: 1.0,
                waste_co2: 0.0,
            })
            .collect()
    }

    #[test]
    fn test_recent_window_counts_today() {
        let points = points_on(&[1, 2, 3, 10, 11, 12]);
        let kept: Vec<NaiveDate> = recent_window(&points, day(11), 9)
            .into_iter()
            .map(|p| p.date)
            .collect();
        assert_eq!(kept, vec![day(3), day(10), day(11)]);
    }

    #[test]
    fn test_recent_window_thirty_days() {
        let today = day(31);
        let points: Vec<TrendPoint> = (0..40)
            .map(|i| TrendPoint {
                date: today - Duration::days(39 - i),
                waste_cost: 1.0,
                waste_co2: 0.0,
            })
            .collect();
        let kept = recent_window(&points, today, 30);
        assert_eq!(kept.len(), 30);
        assert_eq!(kept[0].date, day(2));
        assert_eq!(kept[29].date, today);
    }

    #[test]
    fn test_recent_window_zero_days() {
        assert!(recent_window(&points_on(&[1, 2]), day(2), 0).is_empty());
    }

    #[test]
    fn test_trend_health_levels() {
        let table = |n: u32| -> CanonicalTable {
            CanonicalTable::new(
                (0..n)
                    .map(|i| waste("a", at(1, 0).map(|ts| ts + Duration::days(i64::from(i))), 0.0))
                    .collect(),
            )
        };
        assert_eq!(trend_health(&table(0)), TrendHealth::Empty);
        assert_eq!(trend_health(&table(3)), TrendHealth::Sparse);
        assert_eq!(trend_health(&table(7)), TrendHealth::Partial);
        assert_eq!(trend_health(&table(30)), TrendHealth::Complete);
    }

    #[test]
    fn test_trend_health_ignores_gap_days() {
        // Two days of records 29 days apart: the filled trend has 30 points
        // but only two of them are backed by reports.
        let table = CanonicalTable::new(vec![waste("a", at(1, 0), 1.0), waste("a", at(30, 0), 1.0)]);
        assert_eq!(daily_trend(&table, &t()).len(), 30);
        assert_eq!(trend_health(&table), TrendHealth::Sparse);
    }

    #[test]
    fn test_trend_health_counts_days_outside_window() {
        // Health grades the whole history, not the windowed slice.
        let records: Vec<CanonicalRecord> = (1..=10).map(|d| waste("a", at(d, 0), 1.0)).collect();
        let table = CanonicalTable::new(records);
        let windowed = recent_window(&daily_trend(&table, &t()), day(10), 3);
        assert_eq!(windowed.len(), 3);
        assert_eq!(trend_health(&table), TrendHealth::Partial);
    }

    // ── breakdowns ────────────────────────────────────────────────────────────

    #[test]
    fn test_breakdown_by_type_sorted_desc() {
        let mut records = vec![
            waste("a", None, 1.0),
            waste("b", None, 5.0),
            waste("c", None, 2.0),
            waste("d", None, 0.5),
        ];
        records[0].resource_type = Some("EC2".to_string());
        records[1].resource_type = Some("EBS".to_string());
        records[2].resource_type = Some("EC2".to_string());

        let groups = breakdown_by_type(&CanonicalTable::new(records), &t());
        let keys: Vec<Option<&str>> = groups.iter().map(|g| g.key.as_deref()).collect();
        assert_eq!(keys, vec![Some("EBS"), Some("EC2"), None]);
        assert!(approx(groups[1].waste_cost, 3.0));
    }

    #[test]
    fn test_breakdown_by_status_uses_derived_status() {
        let table = CanonicalTable::new(vec![
            CanonicalRecord {
                hourly_cost: Some(4.0),
                ..Default::default()
            },
            CanonicalRecord {
                hourly_cost: Some(9.0),
                status: Some("Busy".to_string()),
                ..Default::default()
            },
        ]);
        let groups = breakdown_by_status(&table, &t());
        assert_eq!(groups[0].key.as_deref(), Some("Idle"));
        assert!(approx(groups[0].waste_cost, 4.0));
        assert_eq!(groups[1].key.as_deref(), Some("Busy"));
        assert!(approx(groups[1].waste_cost, 0.0));
    }

    #[test]
    fn test_breakdown_ties_keep_first_seen_order() {
        let mut records = vec![waste("a", None, 1.0), waste("b", None, 1.0)];
        records[0].resource_type = Some("Z".to_string());
        records[1].resource_type = Some("A".to_string());
        let groups = breakdown_by_type(&CanonicalTable::new(records), &t());
        assert_eq!(groups[0].key.as_deref(), Some("Z"));
    }

    // ── top-n ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_top_n_picks_largest() {
        let table = CanonicalTable::new(vec![
            waste("x", None, 10.0),
            waste("y", None, 25.0),
            waste("z", None, 5.0),
        ]);
        let top = top_n_by_waste(&table, &t(), 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].resource_id.as_deref(), Some("y"));
    }

    #[test]
    fn test_top_n_groups_by_resource() {
        let mut first = waste("i-1", at(1, 0), 2.0);
        first.hourly_cost = Some(1.0);
        let mut second = waste("i-1", at(2, 0), 3.0);
        second.hourly_cost = Some(3.0);
        second.instance_type = Some("t3.micro".to_string());
        second.resource_type = Some("EC2".to_string());
        let other = waste("i-2", at(1, 0), 4.0);

        let top = top_n_by_waste(&CanonicalTable::new(vec![first, other, second]), &t(), 5);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].resource_id.as_deref(), Some("i-1"));
        assert!(approx(top[0].waste_cost, 5.0));
        assert!(approx(top[0].waste_co2, 0.5));
        assert!(approx(top[0].mean_hourly_cost, 2.0));
        assert_eq!(top[0].instance_type.as_deref(), Some("t3.micro"));
        assert_eq!(top[0].resource_type.as_deref(), Some("EC2"));
    }

    #[test]
    fn test_top_n_ties_stable() {
        let table = CanonicalTable::new(vec![waste("b", None, 1.0), waste("a", None, 1.0)]);
        let ids: Vec<Option<String>> = top_n_by_waste(&table, &t(), 2)
            .into_iter()
            .map(|r| r.resource_id)
            .collect();
        assert_eq!(ids, vec![Some("b".to_string()), Some("a".to_string())]);
    }

    #[test]
    fn test_top_n_empty() {
        assert!(top_n_by_waste(&CanonicalTable::default(), &t(), 5).is_empty());
    }

    // ── exclude_protected ─────────────────────────────────────────────────────

    #[test]
    fn test_exclude_protected() {
        let mut tagged = waste("a", None, 1.0);
        tagged.details = Some("Tags: DoNotStop=true".to_string());
        let table = CanonicalTable::new(vec![tagged, waste("b", None, 1.0)]);
        let kept = exclude_protected(&table);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.records[0].resource_id.as_deref(), Some("b"));
    }
}
