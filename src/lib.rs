//! dmkit - DM language front end and tile map codec
//!
//! This crate re-exports all layers of the dmkit system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: dmkit_runtime    - Filesystem reader, `dmkit` CLI
//! Layer 2: dmkit_map        - Instances, tiles, undo history, map formats
//! Layer 1: dmkit_language   - Lexer, preprocessor, parser, type tree, evaluator
//! Layer 0: dmkit_foundation - Core types (Value, SourcePos, Error, config)
//! ```

pub use dmkit_foundation as foundation;
pub use dmkit_language as language;
pub use dmkit_map as map;
pub use dmkit_runtime as runtime;
