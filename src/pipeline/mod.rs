//! Batch orchestration: versions → extraction → scanning → persistence.
//!
//! The orchestrator drives one package through the whole pipeline for a
//! window of historical versions. Each version is one failure-isolated unit:
//! a failure is captured into a [`BatchError`] and the batch continues, so
//! partial success is a valid terminal outcome and the caller can enumerate
//! exactly which versions failed and why.
//!
//! External collaborators (version listing, package retrieval, persistence)
//! are injected as traits, keeping the core deterministic and testable.

use crate::error::{Result, ScanError};
use crate::rootfs::extract_rootfs;
use crate::sbom::extract_sbom_targets;
use crate::scan::{ScanExecutor, ScanMode, ScanResult};
use crate::version::{select_window, DEFAULT_EXCLUDE};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};

// ============================================================================
// Collaborator contracts
// ============================================================================

/// One published release: its tags and publication date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub tags: Vec<String>,
    pub date: DateTime<Utc>,
}

/// Lists the published versions of a package (e.g. a registry API client).
pub trait VersionSource {
    fn package_versions(&self, org: &str, package: &str) -> anyhow::Result<Vec<VersionRecord>>;
}

/// Materializes the package archive for one version on local disk.
pub trait PackageProvider {
    fn fetch(&self, org: &str, package: &str, tag: &str) -> anyhow::Result<PathBuf>;
}

/// Durable storage for a batch of scan results plus package metadata.
pub trait ScanStore {
    fn insert_package_scans(&self, package: &PackageScanRecord) -> anyhow::Result<()>;
}

/// One persisted batch: package identity plus per-artifact results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageScanRecord {
    pub name: String,
    pub repository: String,
    pub tag: String,
    pub scans: Vec<ScanResult>,
}

/// Version source backed by a fixed list of records.
#[derive(Debug, Clone, Default)]
pub struct StaticVersionSource {
    records: Vec<VersionRecord>,
}

impl StaticVersionSource {
    #[must_use]
    pub fn new(records: Vec<VersionRecord>) -> Self {
        Self { records }
    }
}

impl VersionSource for StaticVersionSource {
    fn package_versions(&self, _org: &str, _package: &str) -> anyhow::Result<Vec<VersionRecord>> {
        Ok(self.records.clone())
    }
}

/// Package provider serving one archive already present on local disk,
/// whatever tag is asked for.
#[derive(Debug, Clone)]
pub struct LocalPackageProvider {
    path: PathBuf,
}

impl LocalPackageProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PackageProvider for LocalPackageProvider {
    fn fetch(&self, _org: &str, _package: &str, _tag: &str) -> anyhow::Result<PathBuf> {
        Ok(self.path.clone())
    }
}

// ============================================================================
// Aggregated batch failure
// ============================================================================

/// One captured failure: which unit failed, and how.
#[derive(Debug)]
pub struct BatchFailure {
    pub context: String,
    pub error: ScanError,
}

/// Composite error joining every failure captured across a batch.
///
/// `Display` lists every `(context, error)` pair so a log line or exit
/// message accounts for the whole batch.
#[derive(Debug, Default)]
pub struct BatchError {
    failures: Vec<BatchFailure>,
}

impl BatchError {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, context: impl Into<String>, error: ScanError) {
        self.failures.push(BatchFailure {
            context: context.into(),
            error,
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    #[must_use]
    pub fn failures(&self) -> &[BatchFailure] {
        &self.failures
    }

    /// Fold another batch's failures into this one.
    pub fn merge(&mut self, other: BatchError) {
        self.failures.extend(other.failures);
    }

    /// `Ok(())` when nothing failed, otherwise the error itself.
    pub fn into_result(self) -> std::result::Result<(), BatchError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} scan unit(s) failed", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {}: {}", failure.context, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchError {}

/// Error type of a full orchestration run: either a fatal precondition
/// failure (nothing was scanned) or the aggregate of per-unit failures from
/// a partially completed batch.
#[derive(Debug, thiserror::Error)]
pub enum OrchestrateError {
    #[error(transparent)]
    Fatal(#[from] ScanError),
    #[error(transparent)]
    Batch(#[from] BatchError),
}

// ============================================================================
// Batch loop
// ============================================================================

/// Run `per_version` for each version, capturing failures without stopping.
///
/// Returns `Ok(())` only when every unit succeeded; otherwise the
/// [`BatchError`] enumerates each failed version with its error.
pub fn run_batch<F>(versions: &[String], mut per_version: F) -> std::result::Result<(), BatchError>
where
    F: FnMut(&str) -> Result<()>,
{
    let mut batch = BatchError::new();
    for version in versions {
        if let Err(error) = per_version(version) {
            tracing::warn!(version = %version, error = %error, "version scan failed, continuing batch");
            batch.push(format!("version {version}"), error);
        }
    }
    batch.into_result()
}

// ============================================================================
// Single-archive scanning
// ============================================================================

/// Outcome of scanning one archive: per-target results plus per-target
/// failures that did not abort the run.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub results: Vec<ScanResult>,
    pub failures: Vec<BatchFailure>,
}

/// Extract one package archive per the scan mode and scan every target.
///
/// Targets are scanned in parallel; each owns a disjoint scratch path, and
/// a failing target never aborts its siblings. All extraction artifacts
/// live in a scoped temporary directory released when this function
/// returns, on every exit path.
///
/// # Errors
///
/// Archive-level and extraction errors are fatal for the archive; scanner
/// failures are captured per target in the returned outcome.
pub fn scan_archive(
    archive_path: &Path,
    mode: ScanMode,
    executor: &ScanExecutor,
) -> Result<ScanOutcome> {
    let archive = crate::archive::PackageArchive::open(archive_path)?;
    let scratch = tempfile::Builder::new()
        .prefix("bundle-scan-")
        .tempdir()
        .map_err(|e| ScanError::io(archive_path, e))?;

    let targets = match mode {
        ScanMode::Sbom => extract_sbom_targets(&archive, scratch.path())?,
        ScanMode::Rootfs => extract_rootfs(&archive, scratch.path())?,
    };

    tracing::info!(
        archive = %archive_path.display(),
        mode = mode.subcommand(),
        targets = targets.len(),
        "scanning extracted targets"
    );

    let scanned: Vec<_> = targets
        .par_iter()
        .map(|target| (target.display_name().to_string(), executor.scan(target)))
        .collect();

    let mut outcome = ScanOutcome::default();
    for (name, result) in scanned {
        match result {
            Ok(scan) => outcome.results.push(scan),
            Err(error) => outcome.failures.push(BatchFailure {
                context: format!("target {name}"),
                error,
            }),
        }
    }
    Ok(outcome)
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Drives the full batch for one package: resolve versions, select the scan
/// window, then extract, scan and persist per version with failure isolation.
pub struct Orchestrator<V, P, S> {
    org: String,
    package: String,
    mode: ScanMode,
    executor: ScanExecutor,
    version_source: V,
    provider: P,
    store: S,
    exclude: usize,
}

impl<V, P, S> Orchestrator<V, P, S>
where
    V: VersionSource,
    P: PackageProvider,
    S: ScanStore,
{
    pub fn new(
        org: impl Into<String>,
        package: impl Into<String>,
        mode: ScanMode,
        executor: ScanExecutor,
        version_source: V,
        provider: P,
        store: S,
    ) -> Self {
        Self {
            org: org.into(),
            package: package.into(),
            mode,
            executor,
            version_source,
            provider,
            store,
            exclude: DEFAULT_EXCLUDE,
        }
    }

    /// Override the number of newest versions excluded from the window.
    #[must_use]
    pub fn with_exclude(mut self, exclude: usize) -> Self {
        self.exclude = exclude;
        self
    }

    /// Run the batch over the `n`-version window.
    ///
    /// # Errors
    ///
    /// `Fatal` when version listing or window selection fails (nothing is
    /// scanned); `Batch` when one or more versions or targets failed while
    /// the rest completed and were persisted.
    pub fn run(&self, n: usize) -> std::result::Result<(), OrchestrateError> {
        let records = self
            .version_source
            .package_versions(&self.org, &self.package)
            .map_err(|e| ScanError::Collaborator(e.to_string()))?;
        let tags: Vec<String> = records.into_iter().flat_map(|r| r.tags).collect();
        let window = select_window(&tags, n, self.exclude).map_err(OrchestrateError::Fatal)?;

        tracing::info!(
            org = %self.org,
            package = %self.package,
            window = ?window,
            "starting batch scan"
        );

        // Per-target failures go into their own accumulator; run_batch owns
        // the version-level capture-and-continue policy.
        let mut target_failures = BatchError::new();
        let mut batch = match run_batch(&window, |tag| {
            self.scan_version(tag, &mut target_failures)
        }) {
            Ok(()) => BatchError::new(),
            Err(batch) => batch,
        };
        batch.merge(target_failures);
        batch.into_result().map_err(OrchestrateError::Batch)
    }

    /// One failure-isolated unit: fetch, extract, scan, persist.
    fn scan_version(&self, tag: &str, batch: &mut BatchError) -> Result<()> {
        let archive_path = self
            .provider
            .fetch(&self.org, &self.package, tag)
            .map_err(|e| ScanError::Collaborator(e.to_string()))?;

        let outcome = scan_archive(&archive_path, self.mode, &self.executor)?;
        for failure in outcome.failures {
            batch.push(format!("version {tag}: {}", failure.context), failure.error);
        }

        let record = PackageScanRecord {
            name: self.package.clone(),
            repository: self.org.clone(),
            tag: tag.to_string(),
            scans: outcome.results,
        };
        self.store
            .insert_package_scans(&record)
            .map_err(|e| ScanError::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_batch_isolates_failures() {
        let versions: Vec<String> = ["1.0.0", "1.1.0", "1.2.0"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        let mut seen = Vec::new();

        let result = run_batch(&versions, |v| {
            seen.push(v.to_string());
            if v == "1.1.0" {
                Err(ScanError::malformed("truncated archive"))
            } else {
                Ok(())
            }
        });

        // All three versions were attempted despite the middle failure.
        assert_eq!(seen, versions);
        let batch = result.unwrap_err();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.failures()[0].context, "version 1.1.0");
    }

    #[test]
    fn run_batch_with_no_failures_is_ok() {
        let versions = vec!["0.1.0".to_string()];
        assert!(run_batch(&versions, |_| Ok(())).is_ok());
    }

    #[test]
    fn batch_error_display_enumerates_failures() {
        let mut batch = BatchError::new();
        batch.push("version 1.0.0", ScanError::malformed("bad tar"));
        batch.push(
            "version 1.1.0: target app",
            ScanError::scan_process("app", "exit status 1"),
        );

        let msg = batch.to_string();
        assert!(msg.starts_with("2 scan unit(s) failed"), "{msg}");
        assert!(msg.contains("version 1.0.0"), "{msg}");
        assert!(msg.contains("version 1.1.0: target app"), "{msg}");
    }

    #[test]
    fn empty_batch_error_converts_to_ok() {
        assert!(BatchError::new().into_result().is_ok());
    }

    #[test]
    fn merge_folds_failures_together() {
        let mut version_failures = BatchError::new();
        version_failures.push("version 1.0.0", ScanError::malformed("bad tar"));

        let mut target_failures = BatchError::new();
        target_failures.push(
            "version 1.1.0: target app",
            ScanError::scan_process("app", "exit status 1"),
        );

        version_failures.merge(target_failures);
        assert_eq!(version_failures.len(), 2);
        assert_eq!(version_failures.failures()[0].context, "version 1.0.0");
        assert_eq!(
            version_failures.failures()[1].context,
            "version 1.1.0: target app"
        );
    }

    #[test]
    fn local_provider_ignores_coordinates() {
        let provider = LocalPackageProvider::new("/tmp/pkg.tar.zst");
        let path = provider.fetch("acme", "app", "1.0.0").unwrap();
        assert_eq!(path, PathBuf::from("/tmp/pkg.tar.zst"));
    }

    #[test]
    fn static_version_source_returns_records() {
        let source = StaticVersionSource::new(vec![VersionRecord {
            tags: vec!["1.0.0".to_string()],
            date: Utc::now(),
        }]);
        let records = source.package_versions("acme", "app").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tags, vec!["1.0.0"]);
    }
}
