//! Served-root fixtures backed by temporary directories.
//!
//! Each fixture creates a scratch directory containing a `files` root plus room for
//! siblings, so traversal tests can place content next to the root that must stay
//! unreachable.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

const ROOT_NAME: &str = "files";

/// Temporary directory tree holding a served root and its siblings.
pub struct ServedRoot {
    scratch: TempDir,
    root: PathBuf,
}

impl ServedRoot {
    /// Create a fresh scratch directory with an empty `files` root inside it.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("sluice-root-")
            .tempdir()
            .context("failed to create scratch directory")?;
        let root = scratch.path().join(ROOT_NAME);
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create served root '{}'", root.display()))?;
        Ok(Self { scratch, root })
    }

    /// Path of the served root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Directory that contains the served root.
    #[must_use]
    pub fn scratch(&self) -> &Path {
        self.scratch.path()
    }

    /// Write a file under the served root, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories or the file cannot be written.
    pub fn write_file(&self, relative: &str, contents: &[u8]) -> Result<PathBuf> {
        write_under(&self.root, relative, contents)
    }

    /// Write a file of `size` deterministic bytes under the served root and
    /// return the bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_sized(&self, relative: &str, size: usize) -> Result<Vec<u8>> {
        let contents = patterned_bytes(size);
        self.write_file(relative, &contents)?;
        Ok(contents)
    }

    /// Write a file next to the served root (for example `files2/x` or
    /// `secret.txt`), outside the tree that may be served.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_outside(&self, relative: &str, contents: &[u8]) -> Result<PathBuf> {
        write_under(self.scratch.path(), relative, contents)
    }
}

/// Deterministic, non-repeating-per-chunk byte pattern of the requested length.
#[must_use]
pub fn patterned_bytes(size: usize) -> Vec<u8> {
    (0..size)
        .map(|index| {
            let mixed = index.wrapping_mul(31) ^ (index >> 8) ^ (index >> 16);
            u8::try_from(mixed & 0xff).unwrap_or_default()
        })
        .collect()
}

fn write_under(base: &Path, relative: &str, contents: &[u8]) -> Result<PathBuf> {
    let target = base.join(relative);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create '{}'", parent.display()))?;
    }
    fs::write(&target, contents)
        .with_context(|| format!("failed to write fixture '{}'", target.display()))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn served_root_layout_keeps_siblings_outside() -> Result<()> {
        let served = ServedRoot::new()?;
        let inside = served.write_file("nested/a.txt", b"a")?;
        let outside = served.write_outside("files2/x", b"x")?;

        assert!(inside.starts_with(served.path()));
        assert!(!outside.starts_with(served.path()));
        assert!(outside.starts_with(served.scratch()));
        Ok(())
    }

    #[test]
    fn patterned_bytes_are_deterministic() {
        let first = patterned_bytes(70_000);
        assert_eq!(first.len(), 70_000);
        assert_eq!(first, patterned_bytes(70_000));
        assert_ne!(first[..32 * 1024], first[32 * 1024..64 * 1024]);
    }
}
