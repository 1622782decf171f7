mod bootstrap;
mod views;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use guardian_core::error::GuardianError;
use guardian_core::models::{CanonicalTable, RawTable};
use guardian_core::normalizer::normalize;
use guardian_core::settings::Settings;
use guardian_core::IdleThresholds;
use guardian_data::aggregator::{
    breakdown_by_status, breakdown_by_type, daily_trend, exclude_protected, kpis, recent_window,
    top_n_by_waste, trend_health,
};
use guardian_data::merger::{merge_reports, ReportSource};
use guardian_data::reader::{read_csv_path, LocalReportStore};
use guardian_data::table::{
    analysis_rows, detail_rows, is_daily_report, resource_type_options, status_options,
    DetailFilter,
};
use guardian_data::writer::write_detail_csv;
use serde::Serialize;
use tracing::{info, warn};

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    info!("Cost Guardian v{} starting", env!("CARGO_PKG_VERSION"));
    info!("View: {}", settings.view);

    let thresholds = settings.thresholds();
    let report_dir = resolve_report_dir(&settings);

    let (raw, source) = load_snapshot(&settings, report_dir.as_ref())?;
    info!("Loaded {} rows from {}", raw.len(), source);

    let table = prepare(&raw, &settings);
    if !is_daily_report(&table) {
        warn!(
            "{} does not look like a daily cost report; daily figures are derived from hourly values",
            source
        );
    }

    match settings.view.as_str() {
        "overview" => show_overview(&table, &thresholds, &settings)?,
        "analysis" => show_analysis(&table, &thresholds, settings.json)?,
        "detail" => show_detail(&table, &thresholds, &settings)?,
        "trend" => {
            let history = load_history(&settings, report_dir.as_ref()).unwrap_or_else(|| table.clone());
            show_trend(&history, &thresholds, &settings)?;
        }
        "top" => show_top(&table, &thresholds, &settings)?,
        unknown => {
            eprintln!("Unknown view: {}", unknown);
        }
    }

    if let Some(path) = &settings.export {
        let filter = detail_filter(&settings);
        let rows = filter.apply(detail_rows(&table, &thresholds));
        write_detail_csv(path, &rows)
            .with_context(|| format!("exporting detail table to {}", path.display()))?;
        info!("Exported {} rows to {}", rows.len(), path.display());
    }

    Ok(())
}

// ── Loading ───────────────────────────────────────────────────────────────────

fn resolve_report_dir(settings: &Settings) -> Option<PathBuf> {
    if settings.input.is_some() {
        return None;
    }
    settings.report_dir.clone().or_else(|| {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        bootstrap::discover_report_dir(&cwd)
    })
}

/// Load the explicit input file, or the newest report in the report
/// directory. Returns the table and a label naming where it came from.
fn load_snapshot(settings: &Settings, report_dir: Option<&PathBuf>) -> Result<(RawTable, String)> {
    if let Some(input) = &settings.input {
        let table = read_csv_path(input)?;
        return Ok((table, input.display().to_string()));
    }

    let dir = report_dir.ok_or_else(|| {
        GuardianError::Config(
            "no --input or --report-dir given and no ./reports or ~/.cost-guardian/reports directory found"
                .to_string(),
        )
    })?;
    let store = LocalReportStore::new(dir);
    let latest = store.latest_report()?;
    let table = store.read_report(&latest)?;
    Ok((table, store.path_of(&latest).display().to_string()))
}

/// Merge historical snapshots when requested. `None` means the current
/// snapshot should be used for the trend.
fn load_history(settings: &Settings, report_dir: Option<&PathBuf>) -> Option<CanonicalTable> {
    if !settings.include_history {
        return None;
    }
    let Some(dir) = report_dir else {
        warn!("--include-history needs a report directory; using the current snapshot");
        return None;
    };

    let store = LocalReportStore::new(dir);
    let candidates = match store.list_candidates() {
        Ok(c) => c,
        Err(e) => {
            warn!("Cannot list reports for history: {}", e);
            return None;
        }
    };

    let outcome = merge_reports(&store, &candidates, settings.history_files as usize);
    info!(
        "Merged {} report files ({} skipped)",
        outcome.files_used,
        outcome.skipped.len()
    );
    if outcome.files_used == 0 {
        return None;
    }
    Some(prepare(&outcome.table, settings))
}

/// Normalize and apply the DoNotStop toggle.
fn prepare(raw: &RawTable, settings: &Settings) -> CanonicalTable {
    let table = normalize(raw);
    if settings.exclude_protected() {
        exclude_protected(&table)
    } else {
        table
    }
}

fn detail_filter(settings: &Settings) -> DetailFilter {
    DetailFilter {
        statuses: settings.statuses.clone(),
        resource_types: settings.resource_types.clone(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── Views ─────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Overview<'a> {
    kpis: &'a guardian_data::aggregator::Kpis,
    by_resource_type: &'a [guardian_data::aggregator::Breakdown],
    by_status: &'a [guardian_data::aggregator::Breakdown],
    top: &'a [guardian_data::aggregator::TopResource],
}

fn show_overview(table: &CanonicalTable, thresholds: &IdleThresholds, settings: &Settings) -> Result<()> {
    let k = kpis(table, thresholds);
    let by_type = breakdown_by_type(table, thresholds);
    let by_status = breakdown_by_status(table, thresholds);
    let top = top_n_by_waste(table, thresholds, settings.top_n);

    if settings.json {
        return print_json(&Overview {
            kpis: &k,
            by_resource_type: &by_type,
            by_status: &by_status,
            top: &top,
        });
    }

    views::print_table("Key figures", views::kpi_rows(&k));
    views::print_table("Waste by resource type", views::breakdown_rows(&by_type));
    views::print_table("Waste by status", views::breakdown_rows(&by_status));
    views::print_table(
        &format!("Top {} resources by waste", settings.top_n),
        views::top_rows(&top),
    );
    Ok(())
}

fn show_analysis(table: &CanonicalTable, thresholds: &IdleThresholds, json: bool) -> Result<()> {
    let rows = analysis_rows(table, thresholds);
    if json {
        return print_json(&rows);
    }
    views::print_table("Resource analysis", views::analysis_table_rows(&rows));
    Ok(())
}

fn show_detail(table: &CanonicalTable, thresholds: &IdleThresholds, settings: &Settings) -> Result<()> {
    let all = detail_rows(table, thresholds);
    let statuses = status_options(&all);
    let types = resource_type_options(&all);
    let rows = detail_filter(settings).apply(all);

    if settings.json {
        return print_json(&rows);
    }
    println!("Statuses: {}", statuses.join(", "));
    println!("Resource types: {}", types.join(", "));
    views::print_table("Detailed cloud report", views::detail_table_rows(&rows));
    Ok(())
}

fn show_trend(table: &CanonicalTable, thresholds: &IdleThresholds, settings: &Settings) -> Result<()> {
    let today = Utc::now().date_naive();
    let health = trend_health(table);
    let points = recent_window(&daily_trend(table, thresholds), today, settings.trend_days);

    if settings.json {
        return print_json(&points);
    }
    println!("{}", health.message());
    views::print_table(
        &format!("Daily waste, last {} days", settings.trend_days),
        views::trend_rows(&points),
    );
    Ok(())
}

fn show_top(table: &CanonicalTable, thresholds: &IdleThresholds, settings: &Settings) -> Result<()> {
    let top = top_n_by_waste(table, thresholds, settings.top_n);
    if settings.json {
        return print_json(&top);
    }
    views::print_table(
        &format!("Top {} resources by waste", settings.top_n),
        views::top_rows(&top),
    );
    Ok(())
}
