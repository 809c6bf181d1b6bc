//! Package archive decoding.
//!
//! A package archive is a compressed tar stream (zstd or gzip envelope)
//! containing OCI-layout content plus one auxiliary tar of SBOM documents.
//! [`PackageArchive`] locates named entries by streaming the decompressed
//! tar, so the full decompressed size is never buffered and scanning stops
//! as soon as every requested entry has been found.

use crate::error::{Result, ScanError};
use flate2::read::GzDecoder;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Fixed entry name of the auxiliary tar holding per-image SBOM documents.
pub const SBOM_TAR_ENTRY: &str = "sboms.tar";

/// Entry name of the OCI image index inside the package.
pub const IMAGE_INDEX_ENTRY: &str = "images/index.json";

/// Prefix under which all OCI blobs (manifests, configs, layers) live.
pub const BLOBS_PREFIX: &str = "images/blobs/sha256/";

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compression envelope of a package archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Zstd,
    Gzip,
}

/// One extracted tar entry: raw bytes plus the entry's permission bits.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub data: Vec<u8>,
    pub mode: u32,
}

/// Handle to a package archive on disk.
///
/// Opening only sniffs the compression envelope; entry lookups re-stream the
/// archive, so the handle is cheap and the underlying file is never held open
/// between calls.
#[derive(Debug, Clone)]
pub struct PackageArchive {
    path: PathBuf,
    compression: Compression,
}

impl PackageArchive {
    /// Open a package archive, verifying it exists and carries a known
    /// compression envelope.
    ///
    /// # Errors
    ///
    /// `ArchiveNotFound` if the file cannot be opened, `Decompression` if the
    /// leading bytes match neither zstd nor gzip or the envelope fails to
    /// produce any output.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = File::open(&path).map_err(|source| ScanError::ArchiveNotFound {
            path: path.clone(),
            source,
        })?;

        let mut magic = [0u8; 4];
        let read = file.read(&mut magic).map_err(|e| ScanError::io(&path, e))?;

        let compression = if read >= 4 && magic == ZSTD_MAGIC {
            Compression::Zstd
        } else if read >= 2 && magic[..2] == GZIP_MAGIC {
            Compression::Gzip
        } else {
            return Err(ScanError::Decompression {
                path,
                message: "unrecognized compression envelope (expected zstd or gzip)".to_string(),
            });
        };

        let archive = Self { path, compression };
        archive.probe()?;
        Ok(archive)
    }

    /// Path of the underlying archive file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Detected compression envelope.
    #[must_use]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Decompress a small prefix to confirm the envelope is not just a
    /// matching magic number on garbage.
    fn probe(&self) -> Result<()> {
        let mut reader = self.reader()?;
        let mut buf = [0u8; 512];
        reader
            .read(&mut buf)
            .map_err(|e| ScanError::Decompression {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// Build a fresh streaming decompressor over the archive file.
    fn reader(&self) -> Result<Box<dyn Read>> {
        let file = File::open(&self.path).map_err(|source| ScanError::ArchiveNotFound {
            path: self.path.clone(),
            source,
        })?;
        match self.compression {
            Compression::Zstd => {
                let decoder =
                    zstd::stream::read::Decoder::new(file).map_err(|e| ScanError::Decompression {
                        path: self.path.clone(),
                        message: e.to_string(),
                    })?;
                Ok(Box::new(decoder))
            }
            Compression::Gzip => Ok(Box::new(GzDecoder::new(file))),
        }
    }

    /// Stream the archive and collect the requested entries.
    ///
    /// Returns a partial mapping: names that do not exist in the archive are
    /// simply absent from the result. Scanning stops once every requested
    /// name has been seen. Use [`require_entry`] to turn a missing mandatory
    /// entry into an error.
    ///
    /// # Errors
    ///
    /// `MalformedArchive` on corrupt tar headers or truncated entry data.
    pub fn find_entries<'a, I>(&self, names: I) -> Result<IndexMap<String, ArchiveEntry>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut wanted: HashSet<&str> = names.into_iter().collect();
        let mut found = IndexMap::new();

        let mut tar = tar::Archive::new(self.reader()?);
        let entries = tar
            .entries()
            .map_err(|e| self.malformed("failed to read package tar", &e))?;

        for entry in entries {
            let mut entry = entry.map_err(|e| self.malformed("failed to read tar header", &e))?;
            let name = entry
                .path()
                .map_err(|e| self.malformed("invalid entry path", &e))?
                .to_string_lossy()
                .into_owned();

            if wanted.remove(name.as_str()) {
                let mode = entry.header().mode().unwrap_or(0o644);
                let mut data = Vec::with_capacity(entry.size() as usize);
                entry
                    .read_to_end(&mut data)
                    .map_err(|e| self.malformed(&format!("truncated entry {name}"), &e))?;
                found.insert(name, ArchiveEntry { data, mode });
            }

            if wanted.is_empty() {
                break;
            }
        }

        tracing::debug!(
            archive = %self.path.display(),
            found = found.len(),
            missing = wanted.len(),
            "collected archive entries"
        );

        Ok(found)
    }

    /// Unpack every entry under `prefix` into `dest`, preserving relative
    /// paths. Used to materialize the OCI `images/` subtree for root
    /// filesystem extraction.
    ///
    /// # Errors
    ///
    /// `MalformedArchive` on corrupt tar structure; `Io` on write failures.
    pub fn unpack_prefix(&self, prefix: &str, dest: &Path) -> Result<usize> {
        let mut tar = tar::Archive::new(self.reader()?);
        let entries = tar
            .entries()
            .map_err(|e| self.malformed("failed to read package tar", &e))?;

        let mut count = 0usize;
        for entry in entries {
            let mut entry = entry.map_err(|e| self.malformed("failed to read tar header", &e))?;
            let matches = entry
                .path()
                .map_err(|e| self.malformed("invalid entry path", &e))?
                .to_string_lossy()
                .starts_with(prefix);
            if !matches {
                continue;
            }
            // unpack_in refuses paths escaping dest, so hostile entry names
            // cannot traverse outside the scratch tree.
            let unpacked = entry
                .unpack_in(dest)
                .map_err(|e| ScanError::io(dest, e))?;
            if unpacked {
                count += 1;
            }
        }

        tracing::debug!(
            archive = %self.path.display(),
            prefix,
            entries = count,
            "unpacked archive subtree"
        );

        Ok(count)
    }

    fn malformed(&self, context: &str, err: &dyn std::fmt::Display) -> ScanError {
        ScanError::malformed(format!("{}: {context}: {err}", self.path.display()))
    }
}

/// Look up a mandatory entry in a [`find_entries`](PackageArchive::find_entries)
/// result, failing with `MalformedArchive` when absent.
pub fn require_entry<'a>(
    entries: &'a IndexMap<String, ArchiveEntry>,
    name: &str,
) -> Result<&'a ArchiveEntry> {
    entries
        .get(name)
        .ok_or_else(|| ScanError::malformed(format!("missing mandatory entry {name}")))
}
