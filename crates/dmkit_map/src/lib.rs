//! Tile maps for dmkit.
//!
//! This crate provides:
//! - [`Instance`] - A placed object: a type path plus variable overrides
//! - [`Tile`] / [`Coord`] - One grid cell and its position
//! - [`Dmm`] - The whole grid, with undo/redo over four primitive edits
//! - [`MapFormat`] - Parsing and the standard, TGM and maphash writers
//! - [`is_loader_compatible`] - Values that simplified map loaders can read

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod appearance;
pub mod codec;
pub mod compat;
pub mod dmm;
pub mod instance;
pub mod keys;
pub mod tile;


pub use appearance::{Appearance, parse_color};
pub use codec::{MapFormat, maphash_key};
pub use compat::is_loader_compatible;
pub use dmm::{Dmm, Edit};
pub use instance::{INSTANCE_VAR_DEFAULT, INSTANCE_VAR_KEEP, Instance, InstanceId};
pub use keys::{compare_keys, key_to_number, number_to_key};
pub use tile::{Coord, Tile};
