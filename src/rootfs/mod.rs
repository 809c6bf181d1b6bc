//! Root filesystem reconstruction from OCI image layers.
//!
//! For filesystem-level scanning each image in the package is flattened into
//! a directory: layers apply in manifest order, later layers override
//! earlier ones, and OCI whiteout markers delete shadowed paths instead of
//! creating files. Signature and attestation pseudo-images (cosign `.sig` /
//! `.att` reference tags) are never scannable and are skipped silently.

use crate::archive::{PackageArchive, BLOBS_PREFIX, IMAGE_INDEX_ENTRY};
use crate::error::{Result, ScanError};
use crate::scan::ScanTarget;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Reference-tag suffix marking a cosign signature.
pub const SIGNATURE_SUFFIX: &str = ".sig";
/// Reference-tag suffix marking a cosign attestation.
pub const ATTESTATION_SUFFIX: &str = ".att";

/// OCI whiteout file prefix: `.wh.<name>` deletes `<name>` from lower layers.
const WHITEOUT_PREFIX: &str = ".wh.";
/// OCI opaque marker: clears the containing directory's lower-layer contents.
const OPAQUE_MARKER: &str = ".wh..wh..opq";

/// OCI image index (`index.json`).
#[derive(Debug, Deserialize)]
pub struct ImageIndex {
    #[serde(rename = "schemaVersion", default)]
    pub schema_version: u32,
    #[serde(default)]
    pub manifests: Vec<ManifestDescriptor>,
}

/// Descriptor of one image manifest in the index.
#[derive(Debug, Deserialize)]
pub struct ManifestDescriptor {
    #[serde(rename = "mediaType", default)]
    pub media_type: String,
    pub digest: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    annotations: Annotations,
}

#[derive(Debug, Default, Deserialize)]
struct Annotations {
    #[serde(rename = "org.opencontainers.image.base.name")]
    base_name: Option<String>,
}

impl ManifestDescriptor {
    /// The original image reference, falling back to a digest-derived name
    /// when the index carries no annotation.
    #[must_use]
    pub fn reference(&self) -> String {
        self.annotations
            .base_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.digest.replace(':', "-"))
    }
}

/// One image manifest blob: config plus ordered layer list.
#[derive(Debug, Deserialize)]
pub struct ImageManifest {
    pub config: BlobDescriptor,
    #[serde(default)]
    pub layers: Vec<BlobDescriptor>,
}

/// Digest reference to a blob in the same archive.
#[derive(Debug, Deserialize)]
pub struct BlobDescriptor {
    pub digest: String,
    #[serde(rename = "mediaType", default)]
    pub media_type: String,
}

/// Whether an image reference denotes scannable content rather than a
/// signature or attestation.
#[must_use]
pub fn scannable_image(reference: &str) -> bool {
    !reference.ends_with(SIGNATURE_SUFFIX) && !reference.ends_with(ATTESTATION_SUFFIX)
}

/// Substitute characters unsafe for filesystem paths so each image gets an
/// isolated, readable directory name (`/` becomes `-`, `:` becomes `_`).
#[must_use]
pub fn replace_path_chars(reference: &str) -> String {
    reference.replace('/', "-").replace(':', "_")
}

/// Reconstruct the flattened root filesystem of every scannable image in the
/// archive.
///
/// The OCI `images/` subtree is materialized into `scratch` in one streaming
/// pass; each image is then squashed into `scratch/rootfs/<name>`. The
/// caller owns `scratch` (typically a `tempfile::TempDir`), so the whole
/// tree is released when the scratch directory is dropped.
///
/// # Errors
///
/// `MalformedArchive` when the image index is missing, a manifest or layer
/// digest does not resolve to a blob in the archive, or a layer is corrupt.
pub fn extract_rootfs(archive: &PackageArchive, scratch: &Path) -> Result<Vec<ScanTarget>> {
    archive.unpack_prefix("images/", scratch)?;

    let index_path = scratch.join(IMAGE_INDEX_ENTRY);
    let index_bytes = std::fs::read(&index_path)
        .map_err(|_| ScanError::malformed(format!("missing mandatory entry {IMAGE_INDEX_ENTRY}")))?;
    let index: ImageIndex = serde_json::from_slice(&index_bytes)
        .map_err(|e| ScanError::malformed(format!("invalid image index: {e}")))?;

    let mut targets = Vec::new();
    for descriptor in &index.manifests {
        let reference = descriptor.reference();
        if !scannable_image(&reference) {
            tracing::debug!(reference = %reference, "skipping signature/attestation image");
            continue;
        }

        let manifest_bytes = read_blob(scratch, &descriptor.digest, "manifest")?;
        let manifest: ImageManifest = serde_json::from_slice(&manifest_bytes).map_err(|e| {
            ScanError::malformed(format!("invalid manifest {}: {e}", descriptor.digest))
        })?;

        // Config blob must resolve even though squashing never reads it;
        // a manifest pointing at absent blobs means a corrupt package.
        blob_path(scratch, &manifest.config.digest, "config")?;

        let rootfs_dir = scratch.join("rootfs").join(replace_path_chars(&reference));
        std::fs::create_dir_all(&rootfs_dir).map_err(|e| ScanError::io(&rootfs_dir, e))?;

        for layer in &manifest.layers {
            let layer_file = blob_path(scratch, &layer.digest, "layer")?;
            apply_layer(&layer_file, &rootfs_dir).map_err(|e| {
                ScanError::malformed(format!(
                    "failed to apply layer {} for {reference}: {e}",
                    layer.digest
                ))
            })?;
        }

        tracing::info!(
            reference = %reference,
            layers = manifest.layers.len(),
            dir = %rootfs_dir.display(),
            "reconstructed root filesystem"
        );

        targets.push(ScanTarget::RootFs {
            artifact_name: reference,
            rootfs_dir,
        });
    }

    Ok(targets)
}

/// Resolve a `sha256:<hex>` digest to its blob path under the unpacked OCI
/// subtree, failing when the blob is absent. `kind` names the blob's role
/// (manifest, config, layer) in the error.
fn blob_path(scratch: &Path, digest: &str, kind: &str) -> Result<PathBuf> {
    let hex = digest
        .strip_prefix("sha256:")
        .ok_or_else(|| ScanError::malformed(format!("unsupported digest algorithm: {digest}")))?;
    let path = scratch.join(BLOBS_PREFIX).join(hex);
    if !path.exists() {
        return Err(ScanError::malformed(format!(
            "{kind} digest {digest} does not resolve to a blob in the archive"
        )));
    }
    Ok(path)
}

fn read_blob(scratch: &Path, digest: &str, kind: &str) -> Result<Vec<u8>> {
    let path = blob_path(scratch, digest, kind)?;
    std::fs::read(&path).map_err(|e| ScanError::io(&path, e))
}

/// Streaming reader over a layer blob, sniffing gzip/zstd/plain tar.
fn layer_reader(path: &Path) -> std::io::Result<Box<dyn Read>> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 4];
    let read = file.read(&mut magic)?;
    let file = File::open(path)?;

    if read >= 2 && magic[..2] == [0x1f, 0x8b] {
        Ok(Box::new(GzDecoder::new(file)))
    } else if read >= 4 && magic == [0x28, 0xb5, 0x2f, 0xfd] {
        Ok(Box::new(zstd::stream::read::Decoder::new(file)?))
    } else {
        Ok(Box::new(file))
    }
}

/// Apply one layer onto `dest` with OCI whiteout semantics: `.wh.<name>`
/// removes the shadowed path, `.wh..wh..opq` clears the directory's existing
/// contents, everything else unpacks normally (later entries override).
fn apply_layer(layer_file: &Path, dest: &Path) -> std::io::Result<()> {
    let mut archive = tar::Archive::new(layer_reader(layer_file)?);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let rel = entry.path()?.into_owned();

        let file_name = rel
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if file_name == OPAQUE_MARKER {
            let dir = dest.join(rel.parent().unwrap_or(Path::new("")));
            clear_directory(&dir)?;
            continue;
        }

        if let Some(hidden) = file_name.strip_prefix(WHITEOUT_PREFIX) {
            let victim = dest.join(rel.parent().unwrap_or(Path::new(""))).join(hidden);
            remove_path(&victim)?;
            continue;
        }

        entry.unpack_in(dest)?;
    }
    Ok(())
}

/// Remove a file or directory tree, ignoring paths that never existed.
fn remove_path(path: &Path) -> std::io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn clear_directory(dir: &Path) -> std::io::Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    for entry in entries {
        remove_path(&entry?.path())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_layer(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn write_layer(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, build_layer(entries)).unwrap();
        path
    }

    #[test]
    fn scannable_image_rejects_signatures_and_attestations() {
        assert!(scannable_image("quay.io/argoproj/argocd:v2.9.6"));
        assert!(!scannable_image(
            "quay.io/argoproj/argocd:sha256-2dafd800fb617ba5b16ae429e388ca140f66f88171463d23d158b372bb2fae08.att"
        ));
        assert!(!scannable_image(
            "quay.io/argoproj/argocd:sha256-2dafd800fb617ba5b16ae429e388ca140f66f88171463d23d158b372bb2fae08.sig"
        ));
    }

    #[test]
    fn path_chars_are_replaced() {
        assert_eq!(
            replace_path_chars("ghcr.io/stefanprodan/podinfo:6.4.0"),
            "ghcr.io-stefanprodan-podinfo_6.4.0"
        );
        assert_eq!(
            replace_path_chars("ghcr.io/argoproj/argocd:v2.9.6"),
            "ghcr.io-argoproj-argocd_v2.9.6"
        );
    }

    #[test]
    fn later_layers_override_earlier_ones() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("rootfs");
        std::fs::create_dir_all(&dest).unwrap();

        let lower = write_layer(dir.path(), "lower.tar", &[("etc/issue", b"v1")]);
        let upper = write_layer(dir.path(), "upper.tar", &[("etc/issue", b"v2")]);

        apply_layer(&lower, &dest).unwrap();
        apply_layer(&upper, &dest).unwrap();

        assert_eq!(std::fs::read(dest.join("etc/issue")).unwrap(), b"v2");
    }

    #[test]
    fn whiteout_deletes_shadowed_path() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("rootfs");
        std::fs::create_dir_all(&dest).unwrap();

        let lower = write_layer(
            dir.path(),
            "lower.tar",
            &[("usr/bin/tool", b"bin"), ("usr/bin/keep", b"keep")],
        );
        let upper = write_layer(dir.path(), "upper.tar", &[("usr/bin/.wh.tool", b"")]);

        apply_layer(&lower, &dest).unwrap();
        apply_layer(&upper, &dest).unwrap();

        assert!(!dest.join("usr/bin/tool").exists());
        assert!(dest.join("usr/bin/keep").exists());
        assert!(!dest.join("usr/bin/.wh.tool").exists(), "marker must not materialize");
    }

    #[test]
    fn opaque_marker_clears_directory_contents() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("rootfs");
        std::fs::create_dir_all(&dest).unwrap();

        let lower = write_layer(
            dir.path(),
            "lower.tar",
            &[("opt/app/old.cfg", b"old"), ("opt/app/stale.cfg", b"stale")],
        );
        let upper = write_layer(
            dir.path(),
            "upper.tar",
            &[("opt/app/.wh..wh..opq", b""), ("opt/app/new.cfg", b"new")],
        );

        apply_layer(&lower, &dest).unwrap();
        apply_layer(&upper, &dest).unwrap();

        assert!(!dest.join("opt/app/old.cfg").exists());
        assert!(!dest.join("opt/app/stale.cfg").exists());
        assert_eq!(std::fs::read(dest.join("opt/app/new.cfg")).unwrap(), b"new");
    }

    #[test]
    fn whiteout_for_absent_path_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("rootfs");
        std::fs::create_dir_all(&dest).unwrap();

        let layer = write_layer(dir.path(), "layer.tar", &[("var/.wh.nothing", b"")]);
        apply_layer(&layer, &dest).unwrap();
    }

    #[test]
    fn missing_blob_error_names_the_blob_kind() {
        let dir = tempfile::tempdir().unwrap();

        let err = blob_path(dir.path(), "sha256:deadbeef", "config").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("config digest sha256:deadbeef"), "{msg}");

        let err = blob_path(dir.path(), "sha256:deadbeef", "layer").unwrap_err();
        assert!(err.to_string().contains("layer digest"), "{err}");
    }

    #[test]
    fn descriptor_reference_prefers_annotation() {
        let json = br#"{
            "mediaType": "application/vnd.oci.image.manifest.v1+json",
            "digest": "sha256:abc123",
            "size": 10,
            "annotations": {"org.opencontainers.image.base.name": "ghcr.io/acme/app:1.0"}
        }"#;
        let d: ManifestDescriptor = serde_json::from_slice(json).unwrap();
        assert_eq!(d.reference(), "ghcr.io/acme/app:1.0");
    }

    #[test]
    fn descriptor_reference_falls_back_to_digest() {
        let json = br#"{"digest": "sha256:abc123"}"#;
        let d: ManifestDescriptor = serde_json::from_slice(json).unwrap();
        assert_eq!(d.reference(), "sha256-abc123");
    }
}
