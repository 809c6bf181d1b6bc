//! SBOM extraction and normalization.
//!
//! The package archive carries one auxiliary tar of per-image SBOM documents
//! in their native formats. [`SbomNormalizer`] re-encodes each document into
//! the canonical interchange format (CycloneDX JSON) and persists it under a
//! content-derived name; [`extract_sbom_targets`] drives the whole batch for
//! one archive.
//!
//! Normalization is all-or-nothing per archive: a single undecodable entry
//! fails the batch, because a caller cannot safely scan an incomplete
//! package.

pub mod decode;
pub mod detect;
pub mod encode;
pub mod model;
pub mod store;

pub use decode::decode;
pub use detect::{detect_format, probe_subject_tag};
pub use encode::encode_cyclonedx;
pub use model::{Component, SbomDocument, SbomFormat};
pub use store::ContentStore;

use crate::archive::{require_entry, PackageArchive, SBOM_TAR_ENTRY};
use crate::error::{Result, ScanError};
use crate::scan::ScanTarget;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Normalizes native-format SBOM documents into content-addressed canonical
/// files under a scratch directory.
#[derive(Debug, Clone)]
pub struct SbomNormalizer {
    store: ContentStore,
}

impl SbomNormalizer {
    pub fn new(scratch: impl Into<PathBuf>) -> Self {
        Self {
            store: ContentStore::new(scratch),
        }
    }

    /// Normalize one raw SBOM document.
    ///
    /// The artifact name is the subject tag probed from the document's own
    /// metadata, falling back to `entry_name` verbatim. The stored file
    /// keeps the source entry's permission bits. Re-running on identical
    /// content yields the same path with no additional write.
    ///
    /// # Errors
    ///
    /// `Decode`/`Encode` naming the entry, or `Io` on write failure.
    pub fn normalize(&self, raw: &[u8], entry_name: &str, mode: u32) -> Result<ScanTarget> {
        let doc = decode(raw, entry_name)?;
        let artifact_name = doc
            .subject
            .clone()
            .unwrap_or_else(|| entry_name.to_string());

        let encoded = encode_cyclonedx(&doc, entry_name)?;
        let (sbom_path, written) = self.store.write(&encoded, mode)?;

        tracing::info!(
            artifact = %artifact_name,
            entry = entry_name,
            format = doc.format.name(),
            components = doc.component_count(),
            written,
            "normalized SBOM"
        );

        Ok(ScanTarget::Sbom {
            artifact_name,
            sbom_path,
        })
    }
}

/// Extract and normalize every SBOM document embedded in the archive.
///
/// Reads the mandatory `sboms.tar` entry, iterates its `*.json` members, and
/// normalizes each into the scratch directory. Any entry failure fails the
/// whole batch (no partial SBOM sets).
///
/// # Errors
///
/// `MalformedArchive` if `sboms.tar` is missing or its structure is corrupt;
/// `Decode`/`Encode`/`Io` from per-entry normalization.
pub fn extract_sbom_targets(archive: &PackageArchive, scratch: &Path) -> Result<Vec<ScanTarget>> {
    let entries = archive.find_entries([SBOM_TAR_ENTRY])?;
    let sbom_tar = require_entry(&entries, SBOM_TAR_ENTRY)?;

    let normalizer = SbomNormalizer::new(scratch);
    let mut targets = Vec::new();

    let mut inner = tar::Archive::new(sbom_tar.data.as_slice());
    let inner_entries = inner
        .entries()
        .map_err(|e| ScanError::malformed(format!("failed to read header in sbom tar: {e}")))?;

    for entry in inner_entries {
        let mut entry = entry
            .map_err(|e| ScanError::malformed(format!("failed to read header in sbom tar: {e}")))?;
        let name = entry
            .path()
            .map_err(|e| ScanError::malformed(format!("invalid sbom entry path: {e}")))?
            .to_string_lossy()
            .into_owned();

        if !name.ends_with(".json") {
            continue;
        }

        let mode = entry.header().mode().unwrap_or(0o644);
        let mut raw = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut raw)
            .map_err(|e| ScanError::malformed(format!("truncated sbom entry {name}: {e}")))?;

        targets.push(normalizer.normalize(&raw, &name, mode)?);
    }

    tracing::info!(
        archive = %archive.path().display(),
        targets = targets.len(),
        "extracted SBOM targets"
    );

    Ok(targets)
}
