//! Core types, values, errors, and configuration for dmkit.
//!
//! This crate provides:
//! - [`Value`] - Constant values produced by the evaluator
//! - [`SourcePos`] - File/line/column positions carried by tokens and errors
//! - [`Error`] - Categorized errors with source positions
//! - [`LoadConfig`] / [`MapConfig`] - Loader and map codec settings

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod pos;
pub mod render;
pub mod value;

pub use config::{LoadConfig, MapConfig};
pub use error::{Error, ErrorContext, ErrorKind, ResourceLimit, Result};
pub use pos::SourcePos;
pub use render::{TEXT_MACROS, format_number, render, render_string};
pub use value::{DeferredNew, List, Typepath, Value};
