//! Filesystem access and command-line support for dmkit.
//!
//! This crate provides:
//! - [`FsReader`] - A [`SourceReader`](dmkit_language::SourceReader) over a
//!   project directory
//! - [`load_environment`] / [`convert_map`] - The operations behind the
//!   `dmkit` binary

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod project;
pub mod reader;

pub use project::{convert_map, load_environment, read_map, save_text};
pub use reader::FsReader;
