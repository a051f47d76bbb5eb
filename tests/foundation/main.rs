//! Integration tests for Layer 0: Foundation
//!
//! Tests for core types: Value rendering, SourcePos, Error, and configuration.

mod config;
mod errors;
mod values;
