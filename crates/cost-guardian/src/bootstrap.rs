use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure `~/.cost-guardian/` and `~/.cost-guardian/logs/` exist.
pub fn ensure_directories() -> anyhow::Result<()> {
    let app_dir = home().join(".cost-guardian");
    std::fs::create_dir_all(&app_dir)?;
    std::fs::create_dir_all(app_dir.join("logs"))?;
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a CLI level name to an [`EnvFilter`] directive.
fn filter_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        other => other.to_lowercase(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Output goes to stderr so that stdout stays clean for tables and JSON.
/// When `log_file` is given, events are also appended there without ANSI
/// colours.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(filter_directive(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}

// ── Report-directory discovery ─────────────────────────────────────────────────

/// Locate a report directory when none was given.
///
/// Checks, in order, `./reports/` under `cwd` and `~/.cost-guardian/reports/`,
/// returning the first that exists.
pub fn discover_report_dir(cwd: &Path) -> Option<PathBuf> {
    let candidates = [
        cwd.join("reports"),
        home().join(".cost-guardian").join("reports"),
    ];
    candidates.into_iter().find(|p| p.is_dir())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    static HOME_LOCK: Mutex<()> = Mutex::new(());

    /// Run `f` with `HOME` pointed at `dir`, restoring it afterwards.
    fn with_home<T>(dir: &Path, f: impl FnOnce() -> T) -> T {
        let _guard = HOME_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let original_home = std::env::var_os("HOME");
        std::env::set_var("HOME", dir);
        let out = f();
        match original_home {
            Some(v) => std::env::set_var("HOME", v),
            None => std::env::remove_var("HOME"),
        }
        out
    }

    #[test]
    fn test_ensure_directories() {
        let tmp = TempDir::new().expect("tempdir");
        with_home(tmp.path(), ensure_directories).expect("ensure_directories should succeed");

        let app_dir = tmp.path().join(".cost-guardian");
        assert!(app_dir.is_dir(), ".cost-guardian dir must exist");
        assert!(app_dir.join("logs").is_dir(), "logs subdir must exist");
    }

    #[test]
    fn test_filter_directive_maps_names() {
        assert_eq!(filter_directive("DEBUG"), "debug");
        assert_eq!(filter_directive("warning"), "warn");
        assert_eq!(filter_directive("CRITICAL"), "error");
        assert_eq!(filter_directive("trace"), "trace");
    }

    #[test]
    fn test_discover_report_dir_prefers_cwd() {
        let tmp = TempDir::new().expect("tempdir");
        let local = tmp.path().join("reports");
        std::fs::create_dir_all(&local).expect("create reports dir");

        let found = with_home(tmp.path(), || discover_report_dir(tmp.path()));
        assert_eq!(found, Some(local));
    }

    #[test]
    fn test_discover_report_dir_falls_back_to_home() {
        let home_dir = TempDir::new().expect("tempdir");
        let cwd = TempDir::new().expect("tempdir");
        let reports = home_dir.path().join(".cost-guardian").join("reports");
        std::fs::create_dir_all(&reports).expect("create reports dir");

        let found = with_home(home_dir.path(), || discover_report_dir(cwd.path()));
        assert_eq!(found, Some(reports));
    }

    #[test]
    fn test_discover_report_dir_none() {
        let home_dir = TempDir::new().expect("tempdir");
        let cwd = TempDir::new().expect("tempdir");
        let found = with_home(home_dir.path(), || discover_report_dir(cwd.path()));
        assert!(found.is_none());
    }
}
