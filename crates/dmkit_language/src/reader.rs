//! Source readers and the shared file cache.
//!
//! The front end never touches the filesystem directly. Text comes from a
//! [`SourceReader`]; a [`FileCache`] sits in front of it so every path is read
//! at most once, even when a background preload and the preprocessor ask for
//! the same file at the same time.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};

use dmkit_foundation::{Error, ErrorKind, Result};
use tracing::{debug, trace};

/// Supplies raw source text by path.
pub trait SourceReader: Send + Sync {
    /// Reads the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an `Io` error if the file cannot be read.
    fn read(&self, path: &str) -> Result<String>;
}

/// A reader backed by an in-memory map of path to text.
#[derive(Clone, Debug, Default)]
pub struct MemoryReader {
    files: HashMap<String, String>,
}

impl MemoryReader {
    /// Creates an empty reader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file.
    pub fn insert(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }

    /// Builder method to add a file.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }
}

impl SourceReader for MemoryReader {
    fn read(&self, path: &str) -> Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::io(path, "no such file"))
    }
}

type Slot = Arc<OnceLock<std::result::Result<Arc<str>, String>>>;

/// Deduplicating, memoizing front for a [`SourceReader`].
pub struct FileCache {
    reader: Arc<dyn SourceReader>,
    entries: Mutex<HashMap<String, Slot>>,
}

impl FileCache {
    /// Creates a cache in front of `reader`.
    #[must_use]
    pub fn new(reader: Arc<dyn SourceReader>) -> Self {
        Self {
            reader,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, path: &str) -> Slot {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(path.to_string()).or_default())
    }

    /// Reads `path`, waiting on an in-flight read of the same path if there
    /// is one.
    ///
    /// # Errors
    ///
    /// Returns an `Io` error if the underlying reader fails. Failures are
    /// cached like successes.
    pub fn read(&self, path: &str) -> Result<Arc<str>> {
        let slot = self.slot(path);
        let result = slot.get_or_init(|| match self.reader.read(path) {
            Ok(text) => Ok(Arc::from(text)),
            Err(Error {
                kind: ErrorKind::Io { message, .. },
                ..
            }) => Err(message),
            Err(e) => Err(e.to_string()),
        });
        result.clone().map_err(|message| Error::io(path, message))
    }

    /// Returns true if `path` has finished reading, successfully or not.
    #[must_use]
    pub fn is_cached(&self, path: &str) -> bool {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(path).is_some_and(|slot| slot.get().is_some())
    }

    /// Starts reading `paths` and everything they `#include` on a background
    /// thread.
    ///
    /// Failures are dropped; the preprocessor repeats the read and reports
    /// the error itself. The returned handle may be joined or dropped.
    pub fn preload(self: &Arc<Self>, paths: Vec<String>) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        thread::spawn(move || {
            let mut queue = paths;
            let mut seen: HashSet<String> = queue.iter().cloned().collect();
            let mut loaded = 0usize;
            while let Some(path) = queue.pop() {
                let text = match cache.read(&path) {
                    Ok(text) => text,
                    Err(e) => {
                        trace!(path = %path, error = %e, "preload failed");
                        continue;
                    }
                };
                loaded += 1;
                for target in scan_includes(&path, &text) {
                    if seen.insert(target.clone()) {
                        queue.push(target);
                    }
                }
            }
            debug!(files = loaded, "preload finished");
        })
    }
}

impl std::fmt::Debug for FileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("FileCache")
            .field("entries", &entries.len())
            .finish_non_exhaustive()
    }
}

/// Finds the `.dm`/`.dme` targets of the `#include` lines in `text`.
///
/// This is a line scan, not a preprocess: includes inside inactive
/// conditional blocks are reported too.
#[must_use]
pub fn scan_includes(file: &str, text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for line in text.lines() {
        if !line.starts_with("#include") {
            continue;
        }
        let mut quoted = line.split('"');
        let (Some(_), Some(target), Some(_)) = (quoted.next(), quoted.next(), quoted.next())
        else {
            continue;
        };
        let joined = join_path(file, target);
        if is_source_file(&joined) {
            out.push(joined);
        }
    }
    out
}

/// Resolves `relative` against the directory of `base_file`.
///
/// Backslashes become forward slashes, and `.` and `..` segments are folded.
#[must_use]
pub fn join_path(base_file: &str, relative: &str) -> String {
    let relative = relative.replace('\\', "/");
    let dir = base_file.rfind('/').map_or("", |i| &base_file[..i]);
    let combined = if dir.is_empty() {
        relative
    } else {
        format!("{dir}/{relative}")
    };

    let absolute = combined.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in combined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute { format!("/{joined}") } else { joined }
}

/// Returns true for files the preprocessor actually includes.
#[must_use]
pub fn is_source_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    matches!(
        name.rsplit_once('.').map(|(_, ext)| ext),
        Some("dm" | "dme")
    )
}
