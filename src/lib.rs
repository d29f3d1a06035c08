//! Insight Agent
//!
//! A natural-language analytics agent: validates untrusted request text,
//! resolves it against a schema catalog, generates schema-constrained SQL,
//! executes it through a correction-and-retry loop, and composes insights
//! from the results.

pub mod agent;
pub mod backend;
pub mod context;
pub mod error;
pub mod execution_loop;
pub mod insights;
pub mod intent;
pub mod llm;
pub mod schema;
pub mod schema_loader;
pub mod security;
pub mod sql_generator;

pub use agent::{AgentResponse, InsightAgent};
pub use error::{AgentError, Result};

/// Install a tracing subscriber honoring `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
