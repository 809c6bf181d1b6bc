//! Decoders for the supported native SBOM dialects.
//!
//! Each decoder maps the dialect's serde shape into the intermediate
//! [`SbomDocument`] model. Unknown fields are ignored throughout; only
//! finding-relevant identity data survives the conversion.

use super::detect::{detect_format, probe_subject_tag};
use super::model::{Component, SbomDocument, SbomFormat};
use crate::error::{Result, ScanError};
use serde::Deserialize;

/// Decode a raw SBOM document from its detected native format.
///
/// # Errors
///
/// `Decode` (naming `entry_name`) when the content is not valid JSON, when
/// no supported dialect matches, or when the dialect-specific structure is
/// invalid.
pub fn decode(raw: &[u8], entry_name: &str) -> Result<SbomDocument> {
    let format = detect_format(raw).ok_or_else(|| {
        ScanError::decode(entry_name, "unknown SBOM format (expected syft, CycloneDX, or SPDX JSON)")
    })?;

    let mut doc = match format {
        SbomFormat::SyftJson => decode_syft(raw, entry_name)?,
        SbomFormat::CycloneDxJson => decode_cyclonedx(raw, entry_name)?,
        SbomFormat::SpdxJson => decode_spdx(raw, entry_name)?,
    };
    if doc.subject.is_none() {
        doc.subject = probe_subject_tag(raw);
    }

    tracing::debug!(
        entry = entry_name,
        format = doc.format.name(),
        components = doc.component_count(),
        "decoded SBOM document"
    );

    Ok(doc)
}

// ---------------------------------------------------------------------------
// Syft JSON
// ---------------------------------------------------------------------------

/// Syft license entries appear either as bare strings or as objects with a
/// `value` field, depending on the schema version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SyftLicense {
    Plain(String),
    Object { value: String },
}

impl SyftLicense {
    fn into_string(self) -> String {
        match self {
            Self::Plain(s) | Self::Object { value: s } => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SyftDocument {
    #[serde(default)]
    artifacts: Vec<SyftArtifact>,
    source: Option<SyftSource>,
}

#[derive(Debug, Deserialize)]
struct SyftArtifact {
    name: String,
    version: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    purl: Option<String>,
    #[serde(default)]
    licenses: Vec<SyftLicense>,
}

#[derive(Debug, Deserialize)]
struct SyftSource {
    metadata: Option<SyftSourceMetadata>,
}

#[derive(Debug, Deserialize)]
struct SyftSourceMetadata {
    #[serde(default)]
    tags: Vec<String>,
}

fn decode_syft(raw: &[u8], entry_name: &str) -> Result<SbomDocument> {
    let syft: SyftDocument =
        serde_json::from_slice(raw).map_err(|e| ScanError::decode(entry_name, e))?;

    let mut doc = SbomDocument::new(SbomFormat::SyftJson);
    doc.subject = syft
        .source
        .and_then(|s| s.metadata)
        .and_then(|m| m.tags.into_iter().find(|t| !t.is_empty()));
    doc.components = syft
        .artifacts
        .into_iter()
        .map(|a| Component {
            name: a.name,
            version: a.version.filter(|v| !v.is_empty()),
            purl: a.purl.filter(|p| !p.is_empty()),
            kind: a.kind,
            licenses: a.licenses.into_iter().map(SyftLicense::into_string).collect(),
        })
        .collect();
    Ok(doc)
}

// ---------------------------------------------------------------------------
// CycloneDX JSON
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CdxDocument {
    metadata: Option<CdxMetadata>,
    #[serde(default)]
    components: Vec<CdxComponent>,
}

#[derive(Debug, Deserialize)]
struct CdxMetadata {
    component: Option<CdxSubject>,
}

#[derive(Debug, Deserialize)]
struct CdxSubject {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CdxComponent {
    name: String,
    version: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    purl: Option<String>,
    #[serde(default)]
    licenses: Vec<CdxLicenseChoice>,
}

/// CycloneDX license choices: `{"license": {"id"|"name": ...}}` or
/// `{"expression": "..."}`.
#[derive(Debug, Deserialize)]
struct CdxLicenseChoice {
    license: Option<CdxLicense>,
    expression: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CdxLicense {
    id: Option<String>,
    name: Option<String>,
}

impl CdxLicenseChoice {
    fn into_string(self) -> Option<String> {
        if let Some(expr) = self.expression {
            return Some(expr);
        }
        let license = self.license?;
        license.id.or(license.name)
    }
}

fn decode_cyclonedx(raw: &[u8], entry_name: &str) -> Result<SbomDocument> {
    let cdx: CdxDocument =
        serde_json::from_slice(raw).map_err(|e| ScanError::decode(entry_name, e))?;

    let mut doc = SbomDocument::new(SbomFormat::CycloneDxJson);
    doc.subject = cdx
        .metadata
        .and_then(|m| m.component)
        .and_then(|c| c.name)
        .filter(|n| !n.is_empty());
    doc.components = cdx
        .components
        .into_iter()
        .map(|c| Component {
            name: c.name,
            version: c.version.filter(|v| !v.is_empty()),
            purl: c.purl.filter(|p| !p.is_empty()),
            kind: c.kind,
            licenses: c
                .licenses
                .into_iter()
                .filter_map(CdxLicenseChoice::into_string)
                .collect(),
        })
        .collect();
    Ok(doc)
}

// ---------------------------------------------------------------------------
// SPDX JSON
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SpdxDocument {
    name: Option<String>,
    #[serde(default)]
    packages: Vec<SpdxPackage>,
}

#[derive(Debug, Deserialize)]
struct SpdxPackage {
    name: String,
    #[serde(rename = "versionInfo")]
    version_info: Option<String>,
    #[serde(rename = "licenseConcluded")]
    license_concluded: Option<String>,
    #[serde(rename = "externalRefs", default)]
    external_refs: Vec<SpdxExternalRef>,
}

#[derive(Debug, Deserialize)]
struct SpdxExternalRef {
    #[serde(rename = "referenceType")]
    reference_type: String,
    #[serde(rename = "referenceLocator")]
    reference_locator: String,
}

fn decode_spdx(raw: &[u8], entry_name: &str) -> Result<SbomDocument> {
    let spdx: SpdxDocument =
        serde_json::from_slice(raw).map_err(|e| ScanError::decode(entry_name, e))?;

    let mut doc = SbomDocument::new(SbomFormat::SpdxJson);
    doc.subject = spdx.name.filter(|n| !n.is_empty());
    doc.components = spdx
        .packages
        .into_iter()
        .map(|p| {
            let purl = p
                .external_refs
                .into_iter()
                .find(|r| r.reference_type == "purl")
                .map(|r| r.reference_locator);
            let licenses = p
                .license_concluded
                .filter(|l| !l.is_empty() && l != "NOASSERTION")
                .map(|l| vec![l])
                .unwrap_or_default();
            Component {
                name: p.name,
                version: p.version_info.filter(|v| !v.is_empty()),
                purl,
                kind: None,
                licenses,
            }
        })
        .collect();
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_syft_document() {
        let raw = br#"{
            "artifacts": [
                {"name": "curl", "version": "8.5.0", "type": "apk",
                 "purl": "pkg:apk/alpine/curl@8.5.0",
                 "licenses": [{"value": "MIT"}]},
                {"name": "zlib", "version": "1.3", "licenses": ["Zlib"]}
            ],
            "source": {"metadata": {"tags": ["docker.io/appropriate/curl:latest"]}}
        }"#;

        let doc = decode(raw, "sbom-curl.json").unwrap();
        assert_eq!(doc.format, SbomFormat::SyftJson);
        assert_eq!(doc.subject.as_deref(), Some("docker.io/appropriate/curl:latest"));
        assert_eq!(doc.component_count(), 2);
        assert_eq!(doc.components[0].licenses, vec!["MIT"]);
        assert_eq!(doc.components[1].licenses, vec!["Zlib"]);
    }

    #[test]
    fn decode_cyclonedx_document() {
        let raw = br#"{
            "bomFormat": "CycloneDX",
            "specVersion": "1.5",
            "metadata": {"component": {"type": "container", "name": "ghcr.io/acme/app:1.0"}},
            "components": [
                {"type": "library", "name": "openssl", "version": "3.0.7",
                 "purl": "pkg:apk/alpine/openssl@3.0.7",
                 "licenses": [{"license": {"id": "Apache-2.0"}}]},
                {"type": "library", "name": "busybox",
                 "licenses": [{"expression": "GPL-2.0-only"}]}
            ]
        }"#;

        let doc = decode(raw, "bom.json").unwrap();
        assert_eq!(doc.format, SbomFormat::CycloneDxJson);
        assert_eq!(doc.subject.as_deref(), Some("ghcr.io/acme/app:1.0"));
        assert_eq!(doc.component_count(), 2);
        assert_eq!(doc.components[0].licenses, vec!["Apache-2.0"]);
        assert_eq!(doc.components[1].licenses, vec!["GPL-2.0-only"]);
    }

    #[test]
    fn decode_spdx_document() {
        let raw = br#"{
            "spdxVersion": "SPDX-2.3",
            "name": "alpine-3.19",
            "packages": [
                {"name": "musl", "versionInfo": "1.2.4",
                 "licenseConcluded": "MIT",
                 "externalRefs": [{"referenceCategory": "PACKAGE-MANAGER",
                                   "referenceType": "purl",
                                   "referenceLocator": "pkg:apk/alpine/musl@1.2.4"}]},
                {"name": "scanelf", "licenseConcluded": "NOASSERTION"}
            ]
        }"#;

        let doc = decode(raw, "doc.spdx.json").unwrap();
        assert_eq!(doc.format, SbomFormat::SpdxJson);
        assert_eq!(doc.subject.as_deref(), Some("alpine-3.19"));
        assert_eq!(doc.component_count(), 2);
        assert_eq!(
            doc.components[0].purl.as_deref(),
            Some("pkg:apk/alpine/musl@1.2.4")
        );
        assert!(doc.components[1].licenses.is_empty());
    }

    #[test]
    fn decode_error_names_the_entry() {
        let err = decode(b"not json", "broken.json").unwrap_err();
        match err {
            ScanError::Decode { entry, .. } => assert_eq!(entry, "broken.json"),
            other => panic!("expected Decode, got {other:?}"),
        }
    }
}
