//! Handler for the `scan` subcommand.

use crate::pipeline::scan_archive;
use crate::scan::{ScanExecutor, ScanMode, CSV_HEADER};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Configuration for a one-shot archive scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Path to the compressed package archive.
    pub archive: PathBuf,
    /// Which artifact kind to extract and scan.
    pub mode: ScanMode,
    /// Scanner binary name or path.
    pub scanner: String,
    /// Offline vulnerability database directory, if scanning air-gapped.
    pub offline_db: Option<PathBuf>,
    /// CSV output destination (stdout if not set).
    pub output_file: Option<PathBuf>,
}

/// Resolve the scanner binary, searching `PATH` for bare names.
///
/// # Errors
///
/// Fails when the binary cannot be found, so the user learns about a
/// missing scanner before any extraction work happens.
pub fn resolve_scanner(scanner: &str) -> Result<PathBuf> {
    let candidate = Path::new(scanner);
    if candidate.components().count() > 1 {
        if candidate.is_file() {
            return Ok(candidate.to_path_buf());
        }
        anyhow::bail!("scanner binary not found at {}", candidate.display());
    }

    let path_var = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&path_var) {
        let full = dir.join(scanner);
        if full.is_file() {
            return Ok(full);
        }
    }
    anyhow::bail!("scanner binary {scanner:?} not found on PATH")
}

/// Run the scan command and return the process exit code.
///
/// Extracts the archive, scans every target, and writes one combined CSV
/// report. Per-target scanner failures do not abort the remaining targets;
/// they are logged and reflected in a non-zero exit code.
///
/// # Errors
///
/// Fails on archive-level problems (missing file, wrong envelope, corrupt
/// structure) and on output write failures.
pub fn run_scan(config: ScanConfig) -> Result<i32> {
    let scanner_bin = resolve_scanner(&config.scanner)?;
    let mut executor = ScanExecutor::new(scanner_bin);
    if let Some(db) = &config.offline_db {
        executor = executor.with_offline_db(db);
    }

    let outcome = scan_archive(&config.archive, config.mode, &executor)
        .with_context(|| format!("failed to scan {}", config.archive.display()))?;

    for failure in &outcome.failures {
        tracing::error!(context = %failure.context, error = %failure.error, "target scan failed");
    }

    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');
    for result in &outcome.results {
        for row in result.csv_rows() {
            csv.push_str(&row);
            csv.push('\n');
        }
    }

    match &config.output_file {
        Some(path) => std::fs::write(path, &csv)
            .with_context(|| format!("failed to write report to {}", path.display()))?,
        None => std::io::stdout()
            .write_all(csv.as_bytes())
            .context("failed to write report to stdout")?,
    }

    tracing::info!(
        targets = outcome.results.len(),
        failed = outcome.failures.len(),
        "scan complete"
    );

    Ok(i32::from(!outcome.failures.is_empty()))
}
