//! Engine configuration applied when the library is first acquired.

use pdf_x_core::library::EngineConfig;
use std::env;
use std::str::FromStr;

/// Bytes fetched from the byte source per engine read.
pub const ENV_CHUNK_SIZE: &str = "PDFX_CHUNK_SIZE";

/// Chunks cached per open document.
pub const ENV_MAX_CACHED_CHUNKS: &str = "PDFX_MAX_CACHED_CHUNKS";

/// Deepest form XObject / Type3 glyph nesting rendered.
pub const ENV_MAX_FORM_DEPTH: &str = "PDFX_MAX_FORM_DEPTH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RendererConfig {
    pub engine: EngineConfig,
}

impl RendererConfig {
    /// Reads overrides from the process environment. Unparsable or zero
    /// values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`RendererConfig::from_env`], with a custom variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut engine = EngineConfig::default();
        override_with(&lookup, ENV_CHUNK_SIZE, &mut engine.chunk_size);
        override_with(&lookup, ENV_MAX_CACHED_CHUNKS, &mut engine.max_cached_chunks);
        override_with(&lookup, ENV_MAX_FORM_DEPTH, &mut engine.max_form_depth);
        RendererConfig { engine }
    }
}

fn override_with<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, value: &mut T)
where
    T: FromStr + PartialEq + Default,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(parsed) if parsed != T::default() => *value = parsed,
        _ => log::warn!("ignoring {}={:?}", key, raw),
    }
}
