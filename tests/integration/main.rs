//! Cross-layer integration tests for dmkit
//!
//! Tests that load a project from disk and carry its maps through every
//! layer: reader, environment, map model and codec.

mod pipeline;
