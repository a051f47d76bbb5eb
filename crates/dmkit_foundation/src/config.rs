//! Configuration for environment loading and map serialization.

/// Default maximum `#include` nesting depth.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 64;

/// Default maximum macro expansion depth.
pub const DEFAULT_MAX_EXPANSION_DEPTH: usize = 128;

/// Default number of hash attempts per maphash signature.
pub const DEFAULT_MAPHASH_ATTEMPTS: u32 = 10_000;

/// Configuration for loading an environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadConfig {
    /// Process the builtin library before the environment.
    pub include_stddef: bool,

    /// Start reading `.dm`/`.dme` include targets as soon as they are seen.
    pub preload_includes: bool,

    /// Maximum `#include` nesting depth.
    pub max_include_depth: usize,

    /// Maximum nesting of macro expansions.
    pub max_expansion_depth: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            include_stddef: true,
            preload_includes: true,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            max_expansion_depth: DEFAULT_MAX_EXPANSION_DEPTH,
        }
    }
}

impl LoadConfig {
    /// Creates a configuration that processes only the given sources: no
    /// builtin library and no preloading.
    #[must_use]
    pub fn bare() -> Self {
        Self {
            include_stddef: false,
            preload_includes: false,
            ..Self::default()
        }
    }

    /// Builder method to include or skip the builtin library.
    #[must_use]
    pub fn with_stddef(mut self, include: bool) -> Self {
        self.include_stddef = include;
        self
    }

    /// Builder method to enable/disable include preloading.
    #[must_use]
    pub fn with_preload(mut self, preload: bool) -> Self {
        self.preload_includes = preload;
        self
    }

    /// Builder method to set the include depth budget.
    #[must_use]
    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    /// Builder method to set the macro expansion depth budget.
    #[must_use]
    pub fn with_max_expansion_depth(mut self, depth: usize) -> Self {
        self.max_expansion_depth = depth;
        self
    }
}

/// Configuration for the map serializers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapConfig {
    /// Seed for the shuffled key pool of the standard and TGM formats.
    pub key_seed: u64,

    /// Hash attempts per signature before maphash gives up.
    pub maphash_attempts: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            key_seed: 0x00D1_7EC7_0000_0000,
            maphash_attempts: DEFAULT_MAPHASH_ATTEMPTS,
        }
    }
}

impl MapConfig {
    /// Builder method to set the key pool seed.
    #[must_use]
    pub fn with_key_seed(mut self, seed: u64) -> Self {
        self.key_seed = seed;
        self
    }

    /// Builder method to set the maphash attempt limit.
    #[must_use]
    pub fn with_maphash_attempts(mut self, attempts: u32) -> Self {
        self.maphash_attempts = attempts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_defaults() {
        let config = LoadConfig::default();
        assert!(config.include_stddef);
        assert!(config.preload_includes);
        assert_eq!(config.max_include_depth, 64);
        assert_eq!(config.max_expansion_depth, 128);
    }

    #[test]
    fn load_builder_chain() {
        let config = LoadConfig::bare()
            .with_max_include_depth(4)
            .with_max_expansion_depth(8);
        assert!(!config.include_stddef);
        assert!(!config.preload_includes);
        assert_eq!(config.max_include_depth, 4);
        assert_eq!(config.max_expansion_depth, 8);
    }

    #[test]
    fn map_builder_chain() {
        let config = MapConfig::default().with_key_seed(7).with_maphash_attempts(3);
        assert_eq!(config.key_seed, 7);
        assert_eq!(config.maphash_attempts, 3);
    }
}
