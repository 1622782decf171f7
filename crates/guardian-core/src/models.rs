use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

/// Fixed analysis window in hours. Daily figures are hourly × this value.
pub const HOURS_PER_PERIOD: f64 = 24.0;

/// Cell spellings that mean "no value" in an ingested CSV.
pub const MISSING_MARKERS: &[&str] = &[
    "", "N/A", "NA", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "<NA>", "#N/A",
];

/// Turn a raw CSV cell into a cell value, mapping missing markers to `None`.
///
/// Surrounding whitespace is kept for present values; only the marker check
/// is done on the trimmed text.
pub fn clean_cell(raw: &str) -> Option<String> {
    if MISSING_MARKERS.contains(&raw.trim()) {
        None
    } else {
        Some(raw.to_string())
    }
}

// ── RawTable ──────────────────────────────────────────────────────────────────

/// A table with arbitrary string column names, as read from a CSV snapshot.
///
/// Column names may repeat; rows are padded to the header width so every row
/// has exactly one cell per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Create an empty table with the given header.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<Option<String>>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Returns `true` when any column called `name` holds at least one value.
    pub fn column_has_values(&self, name: &str) -> bool {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.as_str() == name)
            .any(|(idx, _)| self.rows.iter().any(|row| row[idx].is_some()))
    }

    /// Set every cell of column `name` to `value`, appending the column when
    /// it does not exist yet. Only the first column with that name is touched.
    pub fn set_column(&mut self, name: &str, value: Option<String>) {
        let idx = match self.column_index(name) {
            Some(idx) => idx,
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(None);
                }
                self.columns.len() - 1
            }
        };
        for row in &mut self.rows {
            row[idx] = value.clone();
        }
    }

    /// Row-wise union of several tables.
    ///
    /// The result schema is the union of all input columns in order of first
    /// appearance. Repeated names inside one table are kept apart by their
    /// occurrence number, so a table with two `Date` columns contributes two
    /// union columns. Cells a table has no column for stay missing.
    pub fn concat(tables: &[RawTable]) -> RawTable {
        let mut union: Vec<(String, usize)> = Vec::new();
        let mut position: HashMap<(String, usize), usize> = HashMap::new();

        let mut layouts: Vec<Vec<usize>> = Vec::with_capacity(tables.len());
        for table in tables {
            let mut seen: HashMap<&str, usize> = HashMap::new();
            let mut layout = Vec::with_capacity(table.columns.len());
            for name in &table.columns {
                let nth = seen.entry(name.as_str()).or_insert(0);
                let key = (name.clone(), *nth);
                *nth += 1;
                let idx = *position.entry(key.clone()).or_insert_with(|| {
                    union.push(key);
                    union.len() - 1
                });
                layout.push(idx);
            }
            layouts.push(layout);
        }

        let mut merged = RawTable::new(union.into_iter().map(|(name, _)| name));
        let width = merged.columns.len();
        for (table, layout) in tables.iter().zip(&layouts) {
            for row in &table.rows {
                let mut out = vec![None; width];
                for (cell, &idx) in row.iter().zip(layout) {
                    out[idx] = cell.clone();
                }
                merged.rows.push(out);
            }
        }
        merged
    }
}

// ── Canonical schema ──────────────────────────────────────────────────────────

/// The fixed set of attributes every record is normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Date,
    ResourceId,
    ResourceType,
    Details,
    Status,
    InstanceType,
    Cpu,
    NetworkKbps,
    HourlyCost,
    Co2Hour,
    WasteCostHour,
    WasteCo2Hour,
    EstCostDay,
    EstCo2Day,
    WasteCostDay,
    WasteCo2Day,
}

impl CanonicalField {
    /// Every canonical field, in canonical column order.
    pub const ALL: [CanonicalField; 16] = [
        CanonicalField::Date,
        CanonicalField::ResourceId,
        CanonicalField::ResourceType,
        CanonicalField::Details,
        CanonicalField::Status,
        CanonicalField::InstanceType,
        CanonicalField::Cpu,
        CanonicalField::NetworkKbps,
        CanonicalField::HourlyCost,
        CanonicalField::Co2Hour,
        CanonicalField::WasteCostHour,
        CanonicalField::WasteCo2Hour,
        CanonicalField::EstCostDay,
        CanonicalField::EstCo2Day,
        CanonicalField::WasteCostDay,
        CanonicalField::WasteCo2Day,
    ];

    /// The canonical column name.
    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::Date => "date",
            CanonicalField::ResourceId => "resource_id",
            CanonicalField::ResourceType => "resource_type",
            CanonicalField::Details => "details",
            CanonicalField::Status => "status",
            CanonicalField::InstanceType => "instance_type",
            CanonicalField::Cpu => "cpu",
            CanonicalField::NetworkKbps => "network_kbps",
            CanonicalField::HourlyCost => "hourly_cost",
            CanonicalField::Co2Hour => "co2_hour",
            CanonicalField::WasteCostHour => "waste_cost_hour",
            CanonicalField::WasteCo2Hour => "waste_co2_hour",
            CanonicalField::EstCostDay => "est_cost_day",
            CanonicalField::EstCo2Day => "est_co2_day",
            CanonicalField::WasteCostDay => "waste_cost_day",
            CanonicalField::WasteCo2Day => "waste_co2_day",
        }
    }

    /// Whether values of this field are coerced to numbers.
    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            CanonicalField::Date
                | CanonicalField::ResourceId
                | CanonicalField::ResourceType
                | CanonicalField::Details
                | CanonicalField::Status
                | CanonicalField::InstanceType
        )
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One resource observation at one point in time, after normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalRecord {
    pub date: Option<NaiveDateTime>,
    pub resource_id: Option<String>,
    pub resource_type: Option<String>,
    pub instance_type: Option<String>,
    pub details: Option<String>,
    pub status: Option<String>,
    /// Average CPU utilisation, percent.
    pub cpu: Option<f64>,
    pub network_kbps: Option<f64>,
    pub hourly_cost: Option<f64>,
    pub co2_hour: Option<f64>,
    pub waste_cost_hour: Option<f64>,
    pub waste_co2_hour: Option<f64>,
    pub est_cost_day: Option<f64>,
    pub est_co2_day: Option<f64>,
    pub waste_cost_day: Option<f64>,
    pub waste_co2_day: Option<f64>,
}

impl CanonicalRecord {
    /// Text value of a string field; `None` for numeric and date fields.
    pub fn text(&self, field: CanonicalField) -> Option<&str> {
        match field {
            CanonicalField::ResourceId => self.resource_id.as_deref(),
            CanonicalField::ResourceType => self.resource_type.as_deref(),
            CanonicalField::Details => self.details.as_deref(),
            CanonicalField::Status => self.status.as_deref(),
            CanonicalField::InstanceType => self.instance_type.as_deref(),
            _ => None,
        }
    }

    /// Numeric value of a numeric field; `None` for text and date fields.
    pub fn number(&self, field: CanonicalField) -> Option<f64> {
        match field {
            CanonicalField::Cpu => self.cpu,
            CanonicalField::NetworkKbps => self.network_kbps,
            CanonicalField::HourlyCost => self.hourly_cost,
            CanonicalField::Co2Hour => self.co2_hour,
            CanonicalField::WasteCostHour => self.waste_cost_hour,
            CanonicalField::WasteCo2Hour => self.waste_co2_hour,
            CanonicalField::EstCostDay => self.est_cost_day,
            CanonicalField::EstCo2Day => self.est_co2_day,
            CanonicalField::WasteCostDay => self.waste_cost_day,
            CanonicalField::WasteCo2Day => self.waste_co2_day,
            _ => None,
        }
    }

    /// Render a field back to its cell text, in a form the normalizer parses
    /// to the same value.
    pub fn cell(&self, field: CanonicalField) -> Option<String> {
        match field {
            CanonicalField::Date => self
                .date
                .map(|d| d.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            f if f.is_numeric() => self.number(f).map(|v| v.to_string()),
            f => self.text(f).map(str::to_string),
        }
    }
}

/// A normalized table: exactly one value per canonical field per record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalTable {
    pub records: Vec<CanonicalRecord>,
}

impl CanonicalTable {
    pub fn new(records: Vec<CanonicalRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CanonicalRecord> {
        self.records.iter()
    }

    /// Convert back to a raw table whose header is the canonical field names.
    pub fn to_raw(&self) -> RawTable {
        let mut raw = RawTable::new(CanonicalField::ALL.iter().map(|f| f.name()));
        for record in &self.records {
            raw.push_row(CanonicalField::ALL.iter().map(|&f| record.cell(f)).collect());
        }
        raw
    }
}

impl From<Vec<CanonicalRecord>> for CanonicalTable {
    fn from(records: Vec<CanonicalRecord>) -> Self {
        Self::new(records)
    }
}

impl<'a> IntoIterator for &'a CanonicalTable {
    type Item = &'a CanonicalRecord;
    type IntoIter = std::slice::Iter<'a, CanonicalRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

// ── Status ────────────────────────────────────────────────────────────────────

/// Idle/Busy classification of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    Idle,
    Busy,
    /// A source-supplied label that is neither "Idle" nor "Busy". Counts as
    /// not idle when gating waste.
    Reported(String),
}

impl Status {
    /// Map a source label to a status. "idle"/"busy" match case-insensitively.
    pub fn from_label(label: &str) -> Status {
        let trimmed = label.trim();
        if trimmed.eq_ignore_ascii_case("idle") {
            Status::Idle
        } else if trimmed.eq_ignore_ascii_case("busy") {
            Status::Busy
        } else {
            Status::Reported(trimmed.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Status::Idle => "Idle",
            Status::Busy => "Busy",
            Status::Reported(s) => s,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Status::Idle)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}
