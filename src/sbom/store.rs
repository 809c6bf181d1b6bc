//! Content-addressed scratch storage for normalized SBOMs.
//!
//! Files are named by the SHA-256 of their bytes, so identical content
//! always maps to the same path and hostile entry names from the archive
//! can never influence where a document lands on disk.

use crate::error::{Result, ScanError};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Digest-keyed file store rooted at a scratch directory.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a given content would be stored under.
    #[must_use]
    pub fn path_for(&self, bytes: &[u8]) -> PathBuf {
        let digest = Sha256::digest(bytes);
        self.root.join(hex::encode(digest))
    }

    /// Write `bytes` under their digest name with the given permission bits.
    ///
    /// Returns the stored path and whether a write actually happened: if the
    /// file already exists the write is skipped, which also makes concurrent
    /// writers of identical content safe. The write itself goes through a
    /// temp file plus rename, so readers never observe a partial file.
    ///
    /// # Errors
    ///
    /// `Io` with the target path on any filesystem failure.
    pub fn write(&self, bytes: &[u8], mode: u32) -> Result<(PathBuf, bool)> {
        let path = self.path_for(bytes);
        if path.exists() {
            return Ok((path, false));
        }

        std::fs::create_dir_all(&self.root).map_err(|e| ScanError::io(&self.root, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)
            .map_err(|e| ScanError::io(&self.root, e))?;
        tmp.write_all(bytes).map_err(|e| ScanError::io(&path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(mode & 0o777);
            std::fs::set_permissions(tmp.path(), perms).map_err(|e| ScanError::io(&path, e))?;
        }
        #[cfg(not(unix))]
        let _ = mode;

        tmp.persist(&path)
            .map_err(|e| ScanError::io(&path, e.error))?;

        Ok((path, true))
    }
}
