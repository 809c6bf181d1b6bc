//! Canonical interchange encoding.
//!
//! All native dialects are re-encoded as CycloneDX 1.5 JSON with default
//! encoder settings. Field order is fixed by the serde structs, so the
//! encoding is deterministic and identical documents always hash to
//! identical content-addressed names.

use super::model::SbomDocument;
use crate::error::{Result, ScanError};
use serde::Serialize;

const SPEC_VERSION: &str = "1.5";

#[derive(Debug, Serialize)]
struct CanonicalBom<'a> {
    #[serde(rename = "bomFormat")]
    bom_format: &'static str,
    #[serde(rename = "specVersion")]
    spec_version: &'static str,
    version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<CanonicalMetadata<'a>>,
    components: Vec<CanonicalComponent<'a>>,
}

#[derive(Debug, Serialize)]
struct CanonicalMetadata<'a> {
    component: CanonicalSubject<'a>,
}

#[derive(Debug, Serialize)]
struct CanonicalSubject<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct CanonicalComponent<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purl: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    licenses: Vec<CanonicalLicenseChoice<'a>>,
}

#[derive(Debug, Serialize)]
struct CanonicalLicenseChoice<'a> {
    license: CanonicalLicense<'a>,
}

#[derive(Debug, Serialize)]
struct CanonicalLicense<'a> {
    name: &'a str,
}

/// Encode a decoded SBOM document as canonical CycloneDX JSON.
///
/// # Errors
///
/// `Encode` (naming `entry_name`) if serialization fails.
pub fn encode_cyclonedx(doc: &SbomDocument, entry_name: &str) -> Result<Vec<u8>> {
    let bom = CanonicalBom {
        bom_format: "CycloneDX",
        spec_version: SPEC_VERSION,
        version: 1,
        metadata: doc.subject.as_deref().map(|name| CanonicalMetadata {
            component: CanonicalSubject {
                kind: "container",
                name,
            },
        }),
        components: doc
            .components
            .iter()
            .map(|c| CanonicalComponent {
                kind: c.kind.as_deref().unwrap_or("library"),
                name: &c.name,
                version: c.version.as_deref(),
                purl: c.purl.as_deref(),
                licenses: c
                    .licenses
                    .iter()
                    .map(|l| CanonicalLicenseChoice {
                        license: CanonicalLicense { name: l },
                    })
                    .collect(),
            })
            .collect(),
    };

    serde_json::to_vec(&bom).map_err(|e| ScanError::encode(entry_name, e))
}
