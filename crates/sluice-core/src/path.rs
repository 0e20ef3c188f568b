//! Confinement of requested names to the served root.
//!
//! # Design
//! - Normalise `.`/`..` lexically first so a traversal attempt is rejected
//!   before the filesystem is ever consulted.
//! - Canonicalise the joined path to defeat symlinks, then compare on whole
//!   path components so `files` never matches a sibling such as `files2`.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{TransferError, TransferResult};

const FIELD_FILE: &str = "file";

/// Resolves requested file names against a fixed, canonical root directory.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Build a resolver for `root`, canonicalising it once up front.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Io`] when the root cannot be canonicalised
    /// (for example because it does not exist).
    pub fn new(root: impl AsRef<Path>) -> TransferResult<Self> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .map_err(|source| TransferError::io("canonicalize_root", root, source))?;
        Ok(Self { root })
    }

    /// Canonical root this resolver confines names to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `requested` to an absolute path inside the root.
    ///
    /// Files that do not exist yet resolve to their normalised location; the
    /// transfer engine reports them as not found when it tries to open them.
    ///
    /// # Errors
    ///
    /// - [`TransferError::InvalidInput`] for empty names or names containing NUL.
    /// - [`TransferError::PathEscape`] when the name leaves the root lexically
    ///   or through a symlink.
    /// - [`TransferError::Io`] when canonicalisation fails for a reason other
    ///   than a missing file.
    pub fn resolve(&self, requested: &str) -> TransferResult<PathBuf> {
        if requested.is_empty() {
            return Err(TransferError::InvalidInput {
                field: FIELD_FILE,
                reason: "empty",
                value: None,
            });
        }
        if requested.contains('\0') {
            return Err(TransferError::InvalidInput {
                field: FIELD_FILE,
                reason: "contains_nul",
                value: Some(requested.escape_default().to_string()),
            });
        }

        let relative = normalize(requested)?;
        let joined = self.root.join(&relative);
        let resolved = match joined.canonicalize() {
            Ok(path) => path,
            Err(err) if err.kind() == io::ErrorKind::NotFound => joined,
            Err(source) => return Err(TransferError::io("canonicalize", joined, source)),
        };

        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(escape(requested))
        }
    }
}

/// Resolve `requested` under `root` without keeping a resolver around.
///
/// # Errors
///
/// See [`PathResolver::new`] and [`PathResolver::resolve`].
pub fn resolve(root: impl AsRef<Path>, requested: &str) -> TransferResult<PathBuf> {
    PathResolver::new(root)?.resolve(requested)
}

fn normalize(requested: &str) -> TransferResult<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(requested).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            // Leading separators are re-rooted under the served root.
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(escape(requested));
                }
            }
            Component::Prefix(_) => return Err(escape(requested)),
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(TransferError::InvalidInput {
            field: FIELD_FILE,
            reason: "no_file_component",
            value: Some(requested.to_string()),
        });
    }
    Ok(relative)
}

fn escape(requested: &str) -> TransferError {
    TransferError::PathEscape {
        requested: requested.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sluice_test_support::ServedRoot;

    #[test]
    fn resolves_plain_and_nested_names() -> Result<()> {
        let served = ServedRoot::new()?;
        served.write_file("report.pdf", b"pdf")?;
        served.write_file("docs/a/b.txt", b"b")?;
        let resolver = PathResolver::new(served.path())?;

        let report = resolver.resolve("report.pdf")?;
        assert_eq!(report, resolver.root().join("report.pdf"));
        assert!(report.is_absolute());

        let nested = resolver.resolve("docs/./a/../a/b.txt")?;
        assert_eq!(nested, resolver.root().join("docs/a/b.txt"));
        Ok(())
    }

    #[test]
    fn empty_names_are_invalid_input() -> Result<()> {
        let served = ServedRoot::new()?;
        let resolver = PathResolver::new(served.path())?;
        for name in ["", ".", "./", "a/.."] {
            let err = resolver.resolve(name).err();
            assert!(
                matches!(err, Some(TransferError::InvalidInput { .. })),
                "{name:?} should be invalid, got {err:?}"
            );
        }
        Ok(())
    }

    #[test]
    fn traversal_segments_escaping_the_root_are_rejected() -> Result<()> {
        let served = ServedRoot::new()?;
        served.write_outside("secret.txt", b"secret")?;
        let resolver = PathResolver::new(served.path())?;
        for name in [
            "../secret.txt",
            "../../etc/passwd",
            "a/../../secret.txt",
            "./../files/../secret.txt",
        ] {
            let err = resolver.resolve(name).err();
            assert!(
                matches!(err, Some(TransferError::PathEscape { .. })),
                "{name:?} should escape, got {err:?}"
            );
        }
        Ok(())
    }

    #[test]
    fn sibling_sharing_a_name_prefix_is_unreachable() -> Result<()> {
        let served = ServedRoot::new()?;
        served.write_outside("files2/x", b"x")?;
        served.write_outside("files-secret/y", b"y")?;
        let resolver = PathResolver::new(served.path())?;
        assert!(matches!(
            resolver.resolve("../files2/x"),
            Err(TransferError::PathEscape { .. })
        ));
        assert!(matches!(
            resolver.resolve("../files-secret/y"),
            Err(TransferError::PathEscape { .. })
        ));
        Ok(())
    }

    #[test]
    fn leading_separator_is_rerooted() -> Result<()> {
        let served = ServedRoot::new()?;
        served.write_file("etc/passwd", b"not really")?;
        let resolver = PathResolver::new(served.path())?;
        assert_eq!(
            resolver.resolve("/etc/passwd")?,
            resolver.root().join("etc/passwd")
        );
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_pointing_outside_are_rejected() -> Result<()> {
        let served = ServedRoot::new()?;
        let outside = served.write_outside("secret.txt", b"secret")?;
        std::os::unix::fs::symlink(&outside, served.path().join("link.txt"))?;
        let resolver = PathResolver::new(served.path())?;
        assert!(matches!(
            resolver.resolve("link.txt"),
            Err(TransferError::PathEscape { .. })
        ));
        Ok(())
    }

    #[test]
    fn missing_files_resolve_inside_the_root() -> Result<()> {
        let served = ServedRoot::new()?;
        let path = resolve(served.path(), "missing.bin")?;
        assert!(path.ends_with("files/missing.bin"));
        Ok(())
    }

    #[test]
    fn missing_root_is_an_io_error() {
        let err = PathResolver::new("/definitely/not/a/sluice/root").err();
        assert!(matches!(err, Some(TransferError::Io { .. })));
    }
}
