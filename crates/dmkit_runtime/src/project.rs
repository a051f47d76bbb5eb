//! Loading projects and converting maps on disk.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use dmkit_foundation::{Error, LoadConfig, MapConfig, Result};
use dmkit_language::{Environment, Progress};
use dmkit_map::{Dmm, MapFormat};
use tracing::info;

use crate::reader::FsReader;

/// Loads the project whose environment file is `dme`.
///
/// Include paths are resolved against the directory holding `dme`.
///
/// # Errors
///
/// Returns an `Io` error if `dme` has no file name or cannot be read, and
/// any error raised while loading.
pub fn load_environment(dme: &Path, config: &LoadConfig) -> Result<Environment> {
    let entry = dme
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::io(dme.display().to_string(), "not a file path"))?;
    let root = dme.parent().unwrap_or_else(|| Path::new(""));
    let reader = Arc::new(FsReader::new(root));

    let mut report = |progress: Progress| {
        info!(percent = progress.fraction * 100.0, "{}", progress.message);
    };
    Environment::load(
        reader,
        entry,
        config,
        Some(&mut report as &mut dyn FnMut(Progress)),
    )
}

/// Reads a map file as text.
///
/// # Errors
///
/// Returns an `Io` error if the file cannot be read.
pub fn read_map(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::io(path.display().to_string(), e.to_string()))
}

/// Re-serializes the map at `path`, in `format` or else the format it was
/// written in.
///
/// # Errors
///
/// Returns an `Io` error if the map cannot be read, and any parse or
/// serialization error.
pub fn convert_map(
    env: &Environment,
    path: &Path,
    format: Option<MapFormat>,
    config: &MapConfig,
) -> Result<String> {
    let text = read_map(path)?;
    let name = path.display().to_string();
    let dmm = Dmm::parse(&env.types, &name, &text)?;
    let format = format.unwrap_or_else(|| dmm.format());
    let (x, y, z) = dmm.size();
    info!(map = %name, x, y, z, from = %dmm.format(), to = %format, "converting map");
    dmm.serialize(format, config)
}

/// Writes `text` to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns an `Io` error if the file cannot be created or written.
pub fn save_text(path: &Path, text: &str) -> Result<()> {
    let io_error = |e: std::io::Error| Error::io(path.display().to_string(), e.to_string());
    let file = File::create(path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(text.as_bytes()).map_err(io_error)?;
    writer.flush().map_err(io_error)?;
    Ok(())
}
