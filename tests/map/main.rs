//! Integration tests for Layer 2: Map
//!
//! Tests for editing a grid with undo/redo and for reading and writing the
//! three map formats.

mod editing;
mod formats;
