//! Expected-file-set reconciliation
//!
//! Every path the fixture declares (the primary output, symlink targets,
//! dependency outputs) accumulates into an [`ExpectedFileSet`], together
//! with all ancestor directory prefixes. Reconciliation demands exact set
//! equality with the recursive listing of the output directory.

use std::collections::BTreeSet;
use std::path::Path;

use walkdir::WalkDir;

use crate::VerifyError;

/// The set of paths the generator is expected to have produced.
///
/// Paths are relative to the output root; directories carry a trailing `/`.
/// Adding `a/b/c` also adds `a/` and `a/b/`, so fixtures never need to
/// declare intermediate directories.
#[derive(Debug, Clone, Default)]
pub struct ExpectedFileSet {
    paths: BTreeSet<String>,
}

impl ExpectedFileSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `path` expected, along with every strict ancestor directory.
    pub fn add(&mut self, path: &str) {
        self.paths.insert(path.to_string());
        for ancestor in Path::new(path).ancestors().skip(1) {
            if let Some(dir) = ancestor.to_str() {
                if !dir.is_empty() {
                    self.paths.insert(format!("{dir}/"));
                }
            }
        }
    }

    /// Returns `true` if `path` has been declared.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Number of declared paths, ancestors included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns `true` if nothing has been declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Compare against the actual output listing.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::MissingExpectedFile`] for the first declared
    /// path absent from `actual`, then [`VerifyError::UnexpectedFiles`] for
    /// everything present but undeclared.
    pub fn reconcile(&self, actual: &BTreeSet<String>) -> Result<(), VerifyError> {
        for path in &self.paths {
            if !actual.contains(path) {
                return Err(VerifyError::MissingExpectedFile { path: path.clone() });
            }
        }
        let surplus: Vec<String> = actual.difference(&self.paths).cloned().collect();
        if !surplus.is_empty() {
            return Err(VerifyError::UnexpectedFiles { paths: surplus });
        }
        Ok(())
    }
}

/// Recursively list an output directory.
///
/// Files (and symlinks) are listed as relative paths; directories as
/// relative paths with a trailing `/`. The root itself is not listed.
///
/// # Errors
///
/// Returns [`VerifyError::Io`] when the directory cannot be walked.
pub fn list_output_files(outdir: &Path) -> Result<BTreeSet<String>, VerifyError> {
    let mut listing = BTreeSet::new();
    for entry in WalkDir::new(outdir).min_depth(1) {
        let entry = entry.map_err(|e| VerifyError::Io {
            path: outdir.display().to_string(),
            source: e.to_string(),
        })?;
        let rel = entry
            .path()
            .strip_prefix(outdir)
            .unwrap_or_else(|_| entry.path())
            .display()
            .to_string();
        if entry.file_type().is_dir() {
            listing.insert(format!("{rel}/"));
        } else {
            listing.insert(rel);
        }
    }
    Ok(listing)
}
