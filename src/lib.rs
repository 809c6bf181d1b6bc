//! **A library for extracting and scanning the contents of compressed deployment packages.**
//!
//! `bundle-scan` takes a zstd- or gzip-compressed tar archive that bundles an
//! OCI image layout plus per-image SBOM documents, extracts the artifacts a
//! vulnerability scanner can consume, and drives an external scanner (such as
//! Trivy) against each one. It powers both a command-line interface and a
//! Rust library for embedding package scanning into larger services.
//!
//! ## Key Features
//!
//! - **Archive extraction**: Opens zstd and gzip package envelopes, locates
//!   the embedded SBOM tar and OCI image layout, and unpacks them safely.
//! - **SBOM normalization**: Decodes Syft, CycloneDX, and SPDX JSON documents
//!   and re-encodes them as canonical CycloneDX, stored content-addressed by
//!   SHA-256 digest.
//! - **Root filesystem reconstruction**: Squashes OCI image layers in order,
//!   honoring whiteout and opaque-directory markers, into per-image
//!   directories ready for filesystem scanning.
//! - **Scanner orchestration**: Runs the scanner per target in parallel with
//!   cancellation support, parses its JSON report, and aggregates findings
//!   into CSV rows.
//! - **Batch scanning**: Selects a semantic-version window of historical
//!   releases and scans each with failure isolation, so one broken version
//!   never sinks the batch.
//!
//! ## Core Concepts & Modules
//!
//! - **[`archive`]**: The compressed package envelope and selective entry
//!   extraction.
//! - **[`sbom`]**: Format detection, decoding, canonical encoding, and the
//!   content-addressed store.
//! - **[`rootfs`]**: OCI image layout parsing and layer squashing.
//! - **[`scan`]**: Scan targets, the scanner subprocess executor, and report
//!   parsing.
//! - **[`version`]**: Semantic-version window selection.
//! - **[`pipeline`]**: The batch orchestrator tying everything together
//!   behind injectable collaborator traits.
//!
//! ## Getting Started: Scanning one archive
//!
//! ```no_run
//! use bundle_scan::pipeline::scan_archive;
//! use bundle_scan::scan::{ScanExecutor, ScanMode};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let executor = ScanExecutor::new("trivy");
//!     let outcome = scan_archive(Path::new("package.tar.zst"), ScanMode::Sbom, &executor)?;
//!
//!     for result in &outcome.results {
//!         println!("{}: {} findings", result.artifact_name, result.findings.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod error;
pub mod pipeline;
pub mod rootfs;
pub mod sbom;
pub mod scan;
pub mod version;

pub use error::{Result, ScanError};
pub use pipeline::{scan_archive, Orchestrator, ScanOutcome};
pub use scan::{ScanExecutor, ScanMode, ScanResult, ScanTarget};
