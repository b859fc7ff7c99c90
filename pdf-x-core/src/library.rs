//! Process-wide engine state.
//!
//! The engine must be initialized with [`init_library`] before documents are
//! loaded and torn down with [`destroy_library`]. Callers that share the
//! engine between several clients are expected to count their users and call
//! these exactly once per 0→1 and 1→0 transition.

use crate::core::chunk_manager::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CACHED_CHUNKS};
use crate::core::xref::DEFAULT_OBJECT_CACHE_SIZE;
use std::sync::{PoisonError, RwLock};

/// Engine tuning, fixed at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bytes requested from the file access adapter per read
    pub chunk_size: usize,

    /// Chunks kept in memory per document
    pub max_cached_chunks: usize,

    /// Deepest nesting of form XObjects and Type3 glyphs while rendering
    pub max_form_depth: usize,

    /// Parsed objects kept per document
    pub max_object_cache: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_cached_chunks: DEFAULT_MAX_CACHED_CHUNKS,
            max_form_depth: 12,
            max_object_cache: DEFAULT_OBJECT_CACHE_SIZE,
        }
    }
}

static ENGINE: RwLock<Option<EngineConfig>> = RwLock::new(None);

/// Initializes the engine. Re-initializing replaces the configuration.
pub fn init_library(config: EngineConfig) {
    let mut engine = ENGINE.write().unwrap_or_else(PoisonError::into_inner);
    if engine.is_some() {
        log::warn!("engine initialized twice, replacing configuration");
    }
    *engine = Some(config);
    log::debug!("engine initialized: {:?}", config);
}

/// Tears the engine down. Documents loaded earlier stay usable; new loads
/// fail with `NotInitialized`.
pub fn destroy_library() {
    let mut engine = ENGINE.write().unwrap_or_else(PoisonError::into_inner);
    if engine.take().is_none() {
        log::warn!("engine destroyed while not initialized");
    } else {
        log::debug!("engine destroyed");
    }
}

pub fn is_initialized() -> bool {
    ENGINE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}

/// The active configuration, `None` when the engine is not initialized.
pub fn config() -> Option<EngineConfig> {
    *ENGINE.read().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.chunk_size, 65536);
        assert_eq!(config.max_cached_chunks, 10);
        assert_eq!(config.max_form_depth, 12);
        assert_eq!(config.max_object_cache, 1024);
    }
}
