//! Integration tests for configuration builders

use dmkit_foundation::{LoadConfig, MapConfig};

#[test]
fn load_config_builders() {
    let config = LoadConfig::default()
        .with_stddef(false)
        .with_preload(false)
        .with_max_include_depth(8)
        .with_max_expansion_depth(16);
    assert!(!config.include_stddef);
    assert!(!config.preload_includes);
    assert_eq!(config.max_include_depth, 8);
    assert_eq!(config.max_expansion_depth, 16);
}

#[test]
fn bare_config_skips_builtins() {
    let config = LoadConfig::bare();
    assert!(!config.include_stddef);
    assert_eq!(config.max_include_depth, LoadConfig::default().max_include_depth);
}

#[test]
fn map_config_builders() {
    let config = MapConfig::default().with_key_seed(42).with_maphash_attempts(5);
    assert_eq!(config.key_seed, 42);
    assert_eq!(config.maphash_attempts, 5);
    assert_eq!(MapConfig::default().maphash_attempts, 10_000);
}
