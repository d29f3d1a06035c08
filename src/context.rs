//! Context Provider
//!
//! Trait seam for vector-search context retrieval. Entirely optional and
//! best-effort: failures are treated as "no context", never fatal.

use crate::error::Result;

/// Opaque knowledge-base context provider.
pub trait ContextProvider {
    /// Retrieve context relevant to `query`, at most `top_k` fragments,
    /// joined into a single text block. Empty string means nothing relevant.
    fn get_context(&self, query: &str, top_k: usize) -> Result<String>;
}
