//! Unified error types for bundle-scan.
//!
//! Every failure in the extraction and scan pipeline maps to one variant of
//! [`ScanError`], carrying enough context (archive path, entry name, version
//! tag, target display name) for the caller to present an actionable message.
//!
//! Errors local to one scan target or one version are captured into a
//! [`BatchError`](crate::pipeline::BatchError) by the orchestrator; errors
//! that invalidate the whole input abort immediately.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for bundle-scan operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ScanError {
    /// The package archive does not exist or cannot be opened.
    #[error("package archive not found at {path}: {source}")]
    ArchiveNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archive is not the expected compression envelope.
    #[error("failed to decompress {path}: {message}")]
    Decompression { path: PathBuf, message: String },

    /// Tar structure corrupt or a mandatory entry missing.
    #[error("malformed package archive: {context}")]
    MalformedArchive { context: String },

    /// An SBOM document could not be parsed from its native format.
    #[error("failed to decode SBOM {entry}: {message}")]
    Decode { entry: String, message: String },

    /// An SBOM document could not be re-encoded into the canonical format.
    #[error("failed to encode SBOM {entry}: {message}")]
    Encode { entry: String, message: String },

    /// The scanner subprocess failed or returned unparsable output for one
    /// target. Carries the target's display name so the orchestrator can
    /// report which target failed while continuing with its siblings.
    #[error("scanner failed for {artifact}: {message}")]
    ScanProcess { artifact: String, message: String },

    /// A version tag could not be parsed as a semantic version.
    #[error("invalid semantic version: {0}")]
    InvalidVersion(String),

    /// The selection window is narrower than the exclusion count.
    #[error("window size {n} must be at least the exclude count {exclude}")]
    InvalidWindow { n: usize, exclude: usize },

    /// Fewer versions are available than the window requires.
    #[error("not enough versions: have {have}, need {need}")]
    InsufficientVersions { have: usize, need: usize },

    /// IO errors with path context.
    #[error("io error at {path:?}: {source}")]
    Io {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    /// The persistence collaborator rejected a batch of scan results.
    #[error("failed to store scan results: {0}")]
    Store(String),

    /// A version-source or package-provider collaborator failed.
    #[error("collaborator error: {0}")]
    Collaborator(String),
}

impl ScanError {
    /// Create a malformed-archive error with context.
    pub fn malformed(context: impl Into<String>) -> Self {
        Self::MalformedArchive {
            context: context.into(),
        }
    }

    /// Create a decode error naming the offending entry.
    pub fn decode(entry: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            entry: entry.into(),
            message: message.to_string(),
        }
    }

    /// Create an encode error naming the offending entry.
    pub fn encode(entry: impl Into<String>, message: impl ToString) -> Self {
        Self::Encode {
            entry: entry.into(),
            message: message.to_string(),
        }
    }

    /// Create a scan-process error carrying the target's display name.
    pub fn scan_process(artifact: impl Into<String>, message: impl ToString) -> Self {
        Self::ScanProcess {
            artifact: artifact.into(),
            message: message.to_string(),
        }
    }

    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: Some(path.into()),
            source,
        }
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            path: None,
            source: err,
        }
    }
}

/// Convenient Result type for bundle-scan operations.
pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_process_error_names_the_target() {
        let err = ScanError::scan_process("ghcr.io/acme/app:1.2.3", "exit status 1");
        let display = err.to_string();
        assert!(display.contains("ghcr.io/acme/app:1.2.3"), "{display}");
        assert!(display.contains("exit status 1"), "{display}");
    }

    #[test]
    fn io_error_keeps_path_context() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ScanError::io("/tmp/pkg.tar.zst", io);
        assert!(err.to_string().contains("pkg.tar.zst"));
    }

    #[test]
    fn malformed_archive_display() {
        let err = ScanError::malformed("missing mandatory entry sboms.tar");
        assert!(err.to_string().contains("sboms.tar"));
    }
}
