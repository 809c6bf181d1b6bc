//! Semantic-version window selection.
//!
//! Picks which historical releases to scan: the newest `exclude` versions
//! are dropped entirely (unreleased or still-moving tags), then the oldest
//! `n - exclude` of what remains are selected, ascending.

use crate::error::{Result, ScanError};
use semver::Version;

/// Default number of most-recent versions excluded from scanning.
pub const DEFAULT_EXCLUDE: usize = 2;

/// Select the scan window from a list of version tags.
///
/// Every input must parse as a semantic version. After sorting ascending,
/// the `exclude` newest versions are removed from consideration and the
/// oldest `n - exclude` of the remainder are returned in ascending order,
/// in canonical string form.
///
/// # Errors
///
/// `InvalidVersion` naming the first unparsable tag, `InvalidWindow` when
/// `n < exclude`, `InsufficientVersions` when fewer than `n` versions are
/// available.
pub fn select_window(versions: &[String], n: usize, exclude: usize) -> Result<Vec<String>> {
    if n < exclude {
        return Err(ScanError::InvalidWindow { n, exclude });
    }

    let mut parsed = Vec::with_capacity(versions.len());
    for v in versions {
        let version =
            Version::parse(v).map_err(|_| ScanError::InvalidVersion(v.clone()))?;
        parsed.push(version);
    }
    parsed.sort();

    if parsed.len() < n {
        return Err(ScanError::InsufficientVersions {
            have: parsed.len(),
            need: n,
        });
    }

    Ok(parsed
        .iter()
        .take(n - exclude)
        .map(Version::to_string)
        .collect())
}

/// [`select_window`] with the default exclusion count of two.
pub fn select_window_default(versions: &[String], n: usize) -> Result<Vec<String>> {
    select_window(versions, n, DEFAULT_EXCLUDE)
}
