//! SBOM format detection and subject-tag probing.
//!
//! Detection is marker-based: each JSON dialect carries an unambiguous
//! top-level field. The subject probe is best-effort: absence of a tag is
//! never an error, the caller falls back to the entry name.

use super::model::SbomFormat;
use serde::Deserialize;

/// Detect the native format of an SBOM document from its top-level markers.
///
/// Returns `None` when the content is not valid JSON or matches no known
/// dialect.
#[must_use]
pub fn detect_format(raw: &[u8]) -> Option<SbomFormat> {
    #[derive(Deserialize)]
    struct Markers {
        #[serde(rename = "bomFormat")]
        bom_format: Option<String>,
        #[serde(rename = "spdxVersion")]
        spdx_version: Option<String>,
        artifacts: Option<serde_json::Value>,
    }

    let markers: Markers = serde_json::from_slice(raw).ok()?;
    if markers.bom_format.as_deref() == Some("CycloneDX") {
        Some(SbomFormat::CycloneDxJson)
    } else if markers.spdx_version.is_some() {
        Some(SbomFormat::SpdxJson)
    } else if markers.artifacts.is_some() {
        Some(SbomFormat::SyftJson)
    } else {
        None
    }
}

/// Best-effort probe for a human-meaningful subject tag in the document's
/// own metadata (the Syft `source.metadata.tags` header). Returns `None` on
/// any parse failure or when no tag is recorded.
#[must_use]
pub fn probe_subject_tag(raw: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct Header {
        source: Option<Source>,
    }
    #[derive(Deserialize)]
    struct Source {
        metadata: Option<Metadata>,
    }
    #[derive(Deserialize)]
    struct Metadata {
        #[serde(default)]
        tags: Vec<String>,
    }

    let header: Header = serde_json::from_slice(raw).ok()?;
    header
        .source?
        .metadata?
        .tags
        .into_iter()
        .find(|t| !t.is_empty())
}
