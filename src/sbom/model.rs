//! Normalized in-memory SBOM model.
//!
//! Every native SBOM dialect is decoded into this intermediate
//! representation before being re-encoded into the canonical interchange
//! format. The model deliberately keeps only the fields the downstream
//! scanner cares about: component identity, version, purl, and licensing.

/// Native SBOM dialects this pipeline can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbomFormat {
    /// Syft's own JSON output format.
    SyftJson,
    /// CycloneDX JSON (also the canonical interchange format).
    CycloneDxJson,
    /// SPDX JSON.
    SpdxJson,
}

impl SbomFormat {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SyftJson => "syft-json",
            Self::CycloneDxJson => "cyclonedx-json",
            Self::SpdxJson => "spdx-json",
        }
    }
}

/// One software component in the inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub version: Option<String>,
    pub purl: Option<String>,
    /// Component type, e.g. "library" or "operating-system".
    pub kind: Option<String>,
    pub licenses: Vec<String>,
}

impl Component {
    /// Create a component with just a name; remaining fields default empty.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            purl: None,
            kind: None,
            licenses: Vec::new(),
        }
    }
}

/// A decoded SBOM document: subject metadata plus the component inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SbomDocument {
    /// Format the document was decoded from.
    pub format: SbomFormat,
    /// Human-meaningful subject identifier (an image tag when present).
    pub subject: Option<String>,
    pub components: Vec<Component>,
}

impl SbomDocument {
    #[must_use]
    pub fn new(format: SbomFormat) -> Self {
        Self {
            format,
            subject: None,
            components: Vec::new(),
        }
    }

    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names() {
        assert_eq!(SbomFormat::SyftJson.name(), "syft-json");
        assert_eq!(SbomFormat::CycloneDxJson.name(), "cyclonedx-json");
        assert_eq!(SbomFormat::SpdxJson.name(), "spdx-json");
    }

    #[test]
    fn named_component_defaults() {
        let c = Component::named("openssl");
        assert_eq!(c.name, "openssl");
        assert!(c.version.is_none());
        assert!(c.licenses.is_empty());
    }
}
