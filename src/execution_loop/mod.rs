//! Execution Loop
//!
//! Error classification, query correction, and bounded retry.

pub mod corrector;
pub mod error_classifier;
pub mod retry;

pub use corrector::{Correction, QueryCorrector};
pub use error_classifier::{ErrorCategory, ErrorClassifier, SqlErrorRecord};
pub use retry::{AuditEntry, RetryExecutor, RetryOutcome};
