//! Reading project sources from disk.

use std::fs;
use std::path::{Path, PathBuf};

use dmkit_foundation::{Error, Result};
use dmkit_language::SourceReader;
use tracing::trace;

/// A [`SourceReader`] that resolves project paths against a root directory.
///
/// Project paths always use `/`. Text that is not valid UTF-8 (older
/// projects are often saved as Windows-1252) is decoded lossily.
#[derive(Clone, Debug)]
pub struct FsReader {
    root: PathBuf,
}

impl FsReader {
    /// Creates a reader rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory project paths are resolved against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `path` lives on disk.
    #[must_use]
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl SourceReader for FsReader {
    fn read(&self, path: &str) -> Result<String> {
        let full = self.resolve(path);
        trace!(path = %full.display(), "reading source");
        let bytes = fs::read(&full).map_err(|e| Error::io(path, e.to_string()))?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }
}
