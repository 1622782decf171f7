//! Terminal rendering of the report views.
//!
//! Each view converts its data into a flat `Tabled` row type with
//! pre-formatted cells, then prints a markdown-style table.

use guardian_core::formatting::{
    format_currency, format_kg, format_number, format_optional, percentage,
};
use guardian_data::aggregator::{Breakdown, Kpis, TopResource, TrendPoint};
use guardian_data::table::{AnalysisRow, DetailRow};
use tabled::{settings::Style, Table, Tabled};

const NONE_LABEL: &str = "(none)";

/// Print `rows` under `title`, or a placeholder when there are none.
pub fn print_table<T: Tabled>(title: &str, rows: Vec<T>) {
    println!("\n{}", title);
    if rows.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table = Table::new(rows).with(Style::markdown()).to_string();
    println!("{}\n", table);
}

fn label(value: Option<&str>) -> String {
    value.unwrap_or(NONE_LABEL).to_string()
}

// ── KPIs ──────────────────────────────────────────────────────────────────────

#[derive(Tabled, Debug, Clone, PartialEq)]
pub struct KpiRow {
    #[tabled(rename = "Metric")]
    pub metric: &'static str,
    #[tabled(rename = "Value")]
    pub value: String,
}

pub fn kpi_rows(k: &Kpis) -> Vec<KpiRow> {
    vec![
        KpiRow {
            metric: "Resources",
            value: format_number(k.rows as f64, 0),
        },
        KpiRow {
            metric: "Hourly cost",
            value: format_currency(k.hourly_cost_total),
        },
        KpiRow {
            metric: "Hourly waste",
            value: format_currency(k.waste_cost_total),
        },
        KpiRow {
            metric: "Hourly CO2",
            value: format_kg(k.co2_total),
        },
        KpiRow {
            metric: "Hourly waste CO2",
            value: format_kg(k.waste_co2_total),
        },
        KpiRow {
            metric: "Waste share",
            value: format!("{}%", percentage(k.waste_cost_total, k.hourly_cost_total, 1)),
        },
    ]
}

// ── Breakdowns ────────────────────────────────────────────────────────────────

#[derive(Tabled, Debug, Clone, PartialEq)]
pub struct BreakdownRow {
    #[tabled(rename = "Group")]
    pub key: String,
    #[tabled(rename = "Waste/h")]
    pub waste_cost: String,
    #[tabled(rename = "Share")]
    pub share: String,
}

pub fn breakdown_rows(groups: &[Breakdown]) -> Vec<BreakdownRow> {
    let total: f64 = groups.iter().map(|g| g.waste_cost).sum();
    groups
        .iter()
        .map(|g| BreakdownRow {
            key: label(g.key.as_deref()),
            waste_cost: format_currency(g.waste_cost),
            share: format!("{}%", percentage(g.waste_cost, total, 1)),
        })
        .collect()
}

// ── Top-N ─────────────────────────────────────────────────────────────────────

#[derive(Tabled, Debug, Clone, PartialEq)]
pub struct TopRow {
    #[tabled(rename = "Resource")]
    pub resource_id: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Instance")]
    pub instance_type: String,
    #[tabled(rename = "Type")]
    pub resource_type: String,
    #[tabled(rename = "Avg cost/h")]
    pub mean_hourly_cost: String,
    #[tabled(rename = "Waste/h")]
    pub waste_cost: String,
    #[tabled(rename = "Waste CO2/h")]
    pub waste_co2: String,
}

pub fn top_rows(top: &[TopResource]) -> Vec<TopRow> {
    top.iter()
        .map(|t| TopRow {
            resource_id: label(t.resource_id.as_deref()),
            status: t.status.to_string(),
            instance_type: t.instance_type.clone().unwrap_or_default(),
            resource_type: label(t.resource_type.as_deref()),
            mean_hourly_cost: format_currency(t.mean_hourly_cost),
            waste_cost: format_currency(t.waste_cost),
            waste_co2: format_kg(t.waste_co2),
        })
        .collect()
}

// ── Trend ─────────────────────────────────────────────────────────────────────

#[derive(Tabled, Debug, Clone, PartialEq)]
pub struct TrendRow {
    #[tabled(rename = "Date")]
    pub date: String,
    #[tabled(rename = "Waste/h")]
    pub waste_cost: String,
    #[tabled(rename = "Waste CO2/h")]
    pub waste_co2: String,
}

pub fn trend_rows(points: &[TrendPoint]) -> Vec<TrendRow> {
    points
        .iter()
        .map(|p| TrendRow {
            date: p.date.format("%Y-%m-%d").to_string(),
            waste_cost: format_currency(p.waste_cost),
            waste_co2: format_kg(p.waste_co2),
        })
        .collect()
}

// ── Per-record tables ─────────────────────────────────────────────────────────

#[derive(Tabled, Debug, Clone, PartialEq)]
pub struct AnalysisTableRow {
    #[tabled(rename = "Resource")]
    pub resource_id: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Instance")]
    pub instance_type: String,
    #[tabled(rename = "Type")]
    pub resource_type: String,
    #[tabled(rename = "Cost/h")]
    pub hourly_cost: String,
    #[tabled(rename = "Waste/h")]
    pub waste_cost: String,
    #[tabled(rename = "Waste CO2/h")]
    pub waste_co2: String,
    #[tabled(rename = "Note")]
    pub note: &'static str,
}

pub fn analysis_table_rows(rows: &[AnalysisRow]) -> Vec<AnalysisTableRow> {
    rows.iter()
        .map(|r| AnalysisTableRow {
            resource_id: label(r.resource_id.as_deref()),
            status: r.status.to_string(),
            instance_type: r.instance_type.clone(),
            resource_type: label(r.resource_type.as_deref()),
            hourly_cost: format_currency(r.hourly_cost),
            waste_cost: format_currency(r.waste_cost),
            waste_co2: format_kg(r.waste_co2_kg),
            note: r.note,
        })
        .collect()
}

#[derive(Tabled, Debug, Clone, PartialEq)]
pub struct DetailTableRow {
    #[tabled(rename = "Date")]
    pub date: String,
    #[tabled(rename = "Type")]
    pub resource_type: String,
    #[tabled(rename = "Resource")]
    pub resource_id: String,
    #[tabled(rename = "Details")]
    pub details: String,
    #[tabled(rename = "CPU %")]
    pub cpu: String,
    #[tabled(rename = "Net KB/s")]
    pub network_kbps: String,
    #[tabled(rename = "Cost/day")]
    pub est_cost_day: String,
    #[tabled(rename = "CO2/day")]
    pub est_co2_day: String,
    #[tabled(rename = "Waste/day")]
    pub waste_cost_day: String,
    #[tabled(rename = "Waste CO2/day")]
    pub waste_co2_day: String,
    #[tabled(rename = "Status")]
    pub status: String,
}

pub fn detail_table_rows(rows: &[DetailRow]) -> Vec<DetailTableRow> {
    rows.iter()
        .map(|r| DetailTableRow {
            date: r
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            resource_type: label(r.resource_type.as_deref()),
            resource_id: r.resource_id.clone(),
            details: r.details.clone().unwrap_or_default(),
            cpu: format_optional(r.cpu, 1),
            network_kbps: format_optional(r.network_kbps, 1),
            est_cost_day: format_currency(r.est_cost_day),
            est_co2_day: format_kg(r.est_co2_day),
            waste_cost_day: format_currency(r.waste_cost_day),
            waste_co2_day: format_kg(r.waste_co2_day),
            status: r.status.to_string(),
        })
        .collect()
}
