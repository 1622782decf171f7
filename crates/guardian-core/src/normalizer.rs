//! Schema reconciliation: maps arbitrary report headers onto the canonical
//! field set and coerces cell values to typed, possibly-missing values.

use tracing::debug;

use crate::models::{CanonicalField, CanonicalRecord, CanonicalTable, RawTable};
use crate::time_utils::parse_datetime;

/// Accepted source column names per canonical field, in priority order.
///
/// Each alias belongs to exactly one field, and every field lists its own
/// canonical name so that re-normalizing a canonical table is a no-op.
pub fn aliases(field: CanonicalField) -> &'static [&'static str] {
    match field {
        CanonicalField::Date => &["Date", "date", "timestamp", "run_date"],
        CanonicalField::ResourceId => &["Resource ID", "resource_id", "InstanceId", "VolumeId"],
        CanonicalField::ResourceType => &["Resource Type", "resource_type", "Type"],
        CanonicalField::Details => &["Details", "details"],
        CanonicalField::Status => &["Status", "status"],
        CanonicalField::InstanceType => &["Instance Type", "instance_type"],
        CanonicalField::Cpu => &[
            "CPU %",
            "Avg CPU (24h)",
            "CPU",
            "cpu",
            "cpu_percent",
            "Utilization %",
        ],
        CanonicalField::NetworkKbps => &[
            "Network (KB/s)",
            "Avg Network (24h) (KB/s)",
            "Avg Network (KB/s)",
            "Avg Network",
            "Network",
            "Net KB/s",
            "network_kbps",
        ],
        CanonicalField::HourlyCost => &[
            "Hourly Cost",
            "Hourly Cost ($)",
            "hourly_cost",
            "Cost (Hourly)",
            "Cost/hour",
            "Cost hr",
        ],
        CanonicalField::Co2Hour => &[
            "CO2 (kg)",
            "CO₂ (kg)",
            "co2_kg",
            "co2_hour",
            "Estimated CO2 Emissions (kg)",
            "Estimated CO₂ Emissions (kg)",
        ],
        CanonicalField::WasteCostHour => &[
            "Waste Cost",
            "waste_cost",
            "Waste Cost (Hourly)",
            "waste_cost_hour",
        ],
        // "Waste CO2 (kg)" is the daily column of the cost report, so it is
        // listed under waste_co2_day only.
        CanonicalField::WasteCo2Hour => &["Waste CO₂ (kg)", "waste_co2_kg", "waste_co2_hour"],
        CanonicalField::EstCostDay => &[
            "Est. Cost ($)",
            "Estimated Daily Cost",
            "daily_cost",
            "est_cost_day",
        ],
        CanonicalField::EstCo2Day => &["Est. CO2 (kg)", "co2_day", "est_co2_day"],
        CanonicalField::WasteCostDay => &[
            "Waste Cost ($)",
            "Estimated Cost Waste ($)",
            "waste_cost_day",
        ],
        CanonicalField::WasteCo2Day => &["Waste CO2 (kg)", "waste_co2_day"],
    }
}

/// Coerce a cell to a finite number. Anything else is missing.
pub fn coerce_number(cell: Option<&str>) -> Option<f64> {
    let s = cell?.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Column positions feeding each canonical field, in original column order.
///
/// For every field the first alias present in the header is renamed to the
/// canonical name; all columns that then carry the canonical name feed the
/// field.
fn resolve_columns(columns: &[String]) -> Vec<(CanonicalField, Vec<usize>)> {
    CanonicalField::ALL
        .iter()
        .map(|&field| {
            let picked = aliases(field)
                .iter()
                .find(|alias| columns.iter().any(|c| c == *alias));
            let sources: Vec<usize> = columns
                .iter()
                .enumerate()
                .filter(|(_, c)| Some(&c.as_str()) == picked || c.as_str() == field.name())
                .map(|(idx, _)| idx)
                .collect();
            (field, sources)
        })
        .collect()
}

/// First non-missing cell among `sources`, left to right.
fn coalesce<'a>(row: &'a [Option<String>], sources: &[usize]) -> Option<&'a str> {
    sources.iter().find_map(|&idx| row[idx].as_deref())
}

/// Map a raw table with arbitrary headers to the canonical table.
///
/// Never fails: absent fields are all-missing, unparsable dates and
/// numbers become missing.
pub fn normalize(raw: &RawTable) -> CanonicalTable {
    let layout = resolve_columns(raw.columns());

    let matched = layout.iter().filter(|(_, s)| !s.is_empty()).count();
    debug!(
        "normalize: {} rows, {} columns, {}/{} canonical fields matched",
        raw.len(),
        raw.columns().len(),
        matched,
        CanonicalField::ALL.len()
    );

    let records = raw
        .rows()
        .iter()
        .map(|row| {
            let mut record = CanonicalRecord::default();
            for (field, sources) in &layout {
                let cell = coalesce(row, sources);
                assign(&mut record, *field, cell);
            }
            record
        })
        .collect();

    CanonicalTable::new(records)
}

fn assign(record: &mut CanonicalRecord, field: CanonicalField, cell: Option<&str>) {
    let text = || cell.map(str::to_string);
    let number = || coerce_number(cell);
    match field {
        CanonicalField::Date => record.date = cell.and_then(parse_datetime),
        CanonicalField::ResourceId => record.resource_id = text(),
        CanonicalField::ResourceType => record.resource_type = text(),
        CanonicalField::Details => record.details = text(),
        CanonicalField::Status => record.status = text(),
        CanonicalField::InstanceType => record.instance_type = text(),
        CanonicalField::Cpu => record.cpu = number(),
        CanonicalField::NetworkKbps => record.network_kbps = number(),
        CanonicalField::HourlyCost => record.hourly_cost = number(),
        CanonicalField::Co2Hour => record.co2_hour = number(),
        CanonicalField::WasteCostHour => record.waste_cost_hour = number(),
        CanonicalField::WasteCo2Hour => record.waste_co2_hour = number(),
        CanonicalField::EstCostDay => record.est_cost_day = number(),
        CanonicalField::EstCo2Day => record.est_co2_day = number(),
        CanonicalField::WasteCostDay => record.waste_cost_day = number(),
        CanonicalField::WasteCo2Day => record.waste_co2_day = number(),
    }
}
