//! Scanner subprocess execution.
//!
//! [`ScanExecutor`] launches the external scanner once per target, captures
//! its JSON report from stdout, and maps every failure mode (launch failure,
//! non-zero exit, unparsable output, cancellation) to a `ScanProcess` error
//! carrying the target's display name, so the orchestrator can keep scanning
//! sibling targets.

use crate::error::{Result, ScanError};
use crate::scan::{ScanResult, ScanTarget};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Cloneable cancellation flag shared between the caller and in-flight scans.
///
/// Cancelling kills any running scanner subprocess; the executor then
/// returns a `ScanProcess` error for the interrupted target.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Invokes the external scanner subprocess per target.
#[derive(Debug, Clone)]
pub struct ScanExecutor {
    scanner_bin: PathBuf,
    offline_db: Option<PathBuf>,
    cancel: CancelToken,
}

impl ScanExecutor {
    /// Create an executor invoking the given scanner binary.
    pub fn new(scanner_bin: impl Into<PathBuf>) -> Self {
        Self {
            scanner_bin: scanner_bin.into(),
            offline_db: None,
            cancel: CancelToken::new(),
        }
    }

    /// Use an offline vulnerability database instead of the scanner's
    /// default cache.
    #[must_use]
    pub fn with_offline_db(mut self, path: impl Into<PathBuf>) -> Self {
        self.offline_db = Some(path.into());
        self
    }

    /// Tie subprocess lifetimes to the given cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Full argument list for one target:
    /// `<mode> [--offline-scan] [--cache-dir <db>] <target>`.
    #[must_use]
    pub fn build_args(&self, target: &ScanTarget) -> Vec<String> {
        let mut args = target.command();
        if let Some(db) = &self.offline_db {
            args.insert(1, "--offline-scan".to_string());
            args.insert(2, "--cache-dir".to_string());
            args.insert(3, db.display().to_string());
        }
        args
    }

    /// Scan one target and parse the scanner's JSON report.
    ///
    /// The report's artifact name is overridden with the target's display
    /// name, which is derived from the package contents rather than the
    /// scanner's view of the input path.
    ///
    /// # Errors
    ///
    /// `ScanProcess` (naming the target) on launch failure, non-zero exit,
    /// cancellation, or malformed output.
    pub fn scan(&self, target: &ScanTarget) -> Result<ScanResult> {
        let artifact = target.display_name().to_string();
        let args = self.build_args(target);

        if self.cancel.is_cancelled() {
            return Err(ScanError::scan_process(artifact, "scan cancelled"));
        }

        tracing::info!(
            artifact = %artifact,
            scanner = %self.scanner_bin.display(),
            args = ?args,
            "invoking scanner"
        );

        let mut child = Command::new(&self.scanner_bin)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ScanError::scan_process(
                    &artifact,
                    format!("failed to launch {}: {e}", self.scanner_bin.display()),
                )
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ScanError::scan_process(&artifact, "scanner stdout not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ScanError::scan_process(&artifact, "scanner stderr not captured"))?;

        // Drain both pipes on their own threads so a chatty scanner cannot
        // block on a full pipe, and so this thread stays free to poll the
        // cancel token.
        let stdout_reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });
        let stderr_reader = thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf);
            buf
        });

        // Reap with try_wait rather than a blocking wait: the child is only
        // touched from this thread, so cancellation can always kill it
        // between polls.
        let status = loop {
            if self.cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                let _ = stdout_reader.join();
                let _ = stderr_reader.join();
                return Err(ScanError::scan_process(artifact, "scan cancelled"));
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => thread::sleep(CANCEL_POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    return Err(ScanError::scan_process(
                        &artifact,
                        format!("failed to wait: {e}"),
                    ));
                }
            }
        };

        let output = stdout_reader
            .join()
            .map_err(|_| ScanError::scan_process(&artifact, "scanner output reader panicked"))?
            .map_err(|e| {
                ScanError::scan_process(&artifact, format!("failed to read scanner output: {e}"))
            })?;
        let stderr_buf = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            let detail = String::from_utf8_lossy(&stderr_buf);
            return Err(ScanError::scan_process(
                artifact,
                format!("{status}: {}", detail.trim()),
            ));
        }

        let mut result = ScanResult::from_report_json(&output).map_err(|e| {
            ScanError::scan_process(&artifact, format!("malformed scanner output: {e}"))
        })?;
        result.artifact_name = artifact;

        tracing::debug!(
            artifact = %result.artifact_name,
            findings = result.findings.len(),
            "scanner finished"
        );

        Ok(result)
    }
}
