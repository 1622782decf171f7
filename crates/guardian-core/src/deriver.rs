//! Per-record derivations: status, instance type and the effective hourly
//! cost / CO₂ / waste figures.
//!
//! Every numeric derivation follows the same precedence: an explicit hourly
//! value, else the explicit daily value ÷ 24, else a rule-based fallback.
//! All functions are pure and are recomputed on every read.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{CanonicalRecord, Status, HOURS_PER_PERIOD};

/// Display marker for resources protected from stopping.
pub const EXCLUSION_NOTE: &str = "(Excluded: DoNotStop=True)";

/// Substrings of `details` that mark a resource as idle.
const IDLE_HINTS: &[&str] = &[
    "stopped",
    "stop ",
    "unused",
    "idle",
    "powered off",
    "power off",
    "not running",
    "shut down",
    "shutdown",
    "terminated",
];

/// CPU and network levels below which a resource with telemetry is idle.
///
/// Both readings must be present and under their threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdleThresholds {
    /// Percent, in the same units as the `cpu` field.
    pub cpu_idle_pct: f64,
    /// KB/s, in the same units as the `network_kbps` field.
    pub network_idle_kbps: f64,
}

impl Default for IdleThresholds {
    fn default() -> Self {
        Self {
            cpu_idle_pct: 5.0,
            network_idle_kbps: 5.0,
        }
    }
}

// ── Status ────────────────────────────────────────────────────────────────────

/// One step of the status fallback chain. Returns `None` when it does not
/// apply so the next rule is tried.
type StatusRule = fn(&CanonicalRecord, &IdleThresholds) -> Option<Status>;

/// Status rules in priority order; the first that applies wins.
const STATUS_RULES: &[StatusRule] = &[
    storage_volume_rule,
    idle_hint_rule,
    low_utilisation_rule,
    no_telemetry_rule,
    busy_rule,
];

fn lower(s: Option<&str>) -> String {
    s.unwrap_or_default().to_lowercase()
}

fn storage_volume_rule(r: &CanonicalRecord, _: &IdleThresholds) -> Option<Status> {
    let rtype = r.resource_type.as_deref().unwrap_or_default().to_uppercase();
    if !(rtype.contains("EBS") || rtype.contains("VOLUME")) {
        return None;
    }
    let unattached = lower(r.details.as_deref()).contains("unattached")
        || rtype.to_lowercase().contains("unattached");
    Some(if unattached { Status::Idle } else { Status::Busy })
}

fn idle_hint_rule(r: &CanonicalRecord, _: &IdleThresholds) -> Option<Status> {
    let details = lower(r.details.as_deref());
    IDLE_HINTS
        .iter()
        .any(|hint| details.contains(hint))
        .then_some(Status::Idle)
}

fn low_utilisation_rule(r: &CanonicalRecord, t: &IdleThresholds) -> Option<Status> {
    match (r.cpu, r.network_kbps) {
        (Some(cpu), Some(net)) if cpu < t.cpu_idle_pct && net < t.network_idle_kbps => {
            Some(Status::Idle)
        }
        _ => None,
    }
}

/// No telemetry at all: assume waste until proven busy.
fn no_telemetry_rule(r: &CanonicalRecord, _: &IdleThresholds) -> Option<Status> {
    (r.cpu.is_none() && r.network_kbps.is_none()).then_some(Status::Idle)
}

fn busy_rule(_: &CanonicalRecord, _: &IdleThresholds) -> Option<Status> {
    Some(Status::Busy)
}

/// Classify a record from its resource type, details and metrics only,
/// ignoring any source-supplied status.
pub fn derive_status_from_rules(record: &CanonicalRecord, thresholds: &IdleThresholds) -> Status {
    STATUS_RULES
        .iter()
        .find_map(|rule| rule(record, thresholds))
        .unwrap_or(Status::Busy)
}

/// Status of a record: a non-empty source status is trusted, otherwise the
/// rule chain decides.
pub fn derive_status(record: &CanonicalRecord, thresholds: &IdleThresholds) -> Status {
    match record.status.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Status::from_label(s),
        _ => derive_status_from_rules(record, thresholds),
    }
}

// ── Instance type ─────────────────────────────────────────────────────────────

fn type_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Type:\s*([^,]+)").expect("regex is valid"))
}

fn size_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Size:\s*(\d+)\s*GB").expect("regex is valid"))
}

/// Instance type from the record, else parsed from `details`.
///
/// `"Type: t3.micro, State: running"` yields `t3.micro`; a volume's
/// `"Size: 8 GB"` yields `EBS 8GB`. Returns an empty string when nothing
/// can be found.
pub fn derive_instance_type(record: &CanonicalRecord) -> String {
    if let Some(it) = record.instance_type.as_deref().map(str::trim) {
        if !it.is_empty() {
            return it.to_string();
        }
    }

    let details = record.details.as_deref().unwrap_or_default();
    if let Some(m) = type_pattern().captures(details).and_then(|c| c.get(1)) {
        return m.as_str().trim().to_string();
    }
    if let Some(m) = size_pattern().captures(details).and_then(|c| c.get(1)) {
        return format!("EBS {}GB", m.as_str());
    }
    String::new()
}

// ── Effective hourly values ───────────────────────────────────────────────────

fn hourly_or_daily(hourly: Option<f64>, daily: Option<f64>) -> Option<f64> {
    hourly.or_else(|| daily.map(|d| d / HOURS_PER_PERIOD))
}

/// Hourly cost: explicit hourly, else daily ÷ 24, else 0.
pub fn effective_hourly_cost(record: &CanonicalRecord) -> f64 {
    hourly_or_daily(record.hourly_cost, record.est_cost_day).unwrap_or(0.0)
}

/// Hourly CO₂ (kg): explicit hourly, else daily ÷ 24, else 0.
pub fn effective_hourly_co2(record: &CanonicalRecord) -> f64 {
    hourly_or_daily(record.co2_hour, record.est_co2_day).unwrap_or(0.0)
}

/// Hourly waste cost for a record whose status is already known.
pub fn effective_waste_cost_hour_with_status(record: &CanonicalRecord, status: &Status) -> f64 {
    hourly_or_daily(record.waste_cost_hour, record.waste_cost_day).unwrap_or_else(|| {
        if status.is_idle() {
            effective_hourly_cost(record)
        } else {
            0.0
        }
    })
}

/// Hourly waste CO₂ for a record whose status is already known.
pub fn effective_waste_co2_hour_with_status(record: &CanonicalRecord, status: &Status) -> f64 {
    hourly_or_daily(record.waste_co2_hour, record.waste_co2_day).unwrap_or_else(|| {
        if status.is_idle() {
            effective_hourly_co2(record)
        } else {
            0.0
        }
    })
}

/// Hourly waste cost: explicit hourly, else daily ÷ 24, else the full
/// hourly cost when the record is idle, else 0.
pub fn effective_waste_cost_hour(record: &CanonicalRecord, thresholds: &IdleThresholds) -> f64 {
    effective_waste_cost_hour_with_status(record, &derive_status(record, thresholds))
}

/// Hourly waste CO₂, mirroring [`effective_waste_cost_hour`].
pub fn effective_waste_co2_hour(record: &CanonicalRecord, thresholds: &IdleThresholds) -> f64 {
    effective_waste_co2_hour_with_status(record, &derive_status(record, thresholds))
}

// ── Exclusion ─────────────────────────────────────────────────────────────────

/// [`EXCLUSION_NOTE`] when details carry the explicit exclusion annotation.
pub fn exclusion_note(record: &CanonicalRecord) -> &'static str {
    if lower(record.details.as_deref()).contains("excluded: donotstop=true") {
        EXCLUSION_NOTE
    } else {
        ""
    }
}

/// Whether the resource is tagged DoNotStop=True anywhere in its details.
pub fn is_protected(record: &CanonicalRecord) -> bool {
    lower(record.details.as_deref()).contains("donotstop=true")
}
