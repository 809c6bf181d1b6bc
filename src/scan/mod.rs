//! Scan targets and scanner invocation.
//!
//! A [`ScanTarget`] is one unit handed to the external vulnerability scanner:
//! either a normalized SBOM file or a reconstructed root filesystem
//! directory. The set of target kinds is closed and every dispatch site
//! matches it exhaustively.

mod executor;
mod results;

pub use executor::{CancelToken, ScanExecutor};
pub use results::{ScanResult, VulnerabilityFinding, CSV_HEADER};

use clap::ValueEnum;
use std::path::{Path, PathBuf};

/// Which kind of scan a run performs. Chosen once per run, never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScanMode {
    /// Scan normalized SBOM documents extracted from the package.
    Sbom,
    /// Scan root filesystems reconstructed from the package's image layers.
    Rootfs,
}

impl ScanMode {
    /// Scanner subcommand name for this mode.
    #[must_use]
    pub fn subcommand(&self) -> &'static str {
        match self {
            Self::Sbom => "sbom",
            Self::Rootfs => "rootfs",
        }
    }
}

/// One unit to be scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTarget {
    /// A normalized SBOM document on disk.
    Sbom {
        artifact_name: String,
        sbom_path: PathBuf,
    },
    /// A reconstructed root filesystem directory.
    RootFs {
        artifact_name: String,
        rootfs_dir: PathBuf,
    },
}

impl ScanTarget {
    /// Scanner invocation arguments for this target: the scan-mode
    /// subcommand followed by the target path.
    #[must_use]
    pub fn command(&self) -> Vec<String> {
        match self {
            Self::Sbom { sbom_path, .. } => {
                vec!["sbom".to_string(), sbom_path.display().to_string()]
            }
            Self::RootFs { rootfs_dir, .. } => {
                vec!["rootfs".to_string(), rootfs_dir.display().to_string()]
            }
        }
    }

    /// Human-readable name identifying the scanned artifact.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::Sbom { artifact_name, .. } | Self::RootFs { artifact_name, .. } => artifact_name,
        }
    }

    /// Filesystem path this target points at.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Sbom { sbom_path, .. } => sbom_path,
            Self::RootFs { rootfs_dir, .. } => rootfs_dir,
        }
    }
}
