//! Integration tests for Layer 1: Language
//!
//! Tests for the front end: lexing, preprocessing, the type tree, and
//! constant evaluation, driven through the public loading API.

mod evaluation;
mod lexing;
mod loading;
