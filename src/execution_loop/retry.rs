//! Retry Executor
//!
//! Bounded execute -> classify -> correct -> re-execute loop with a full
//! audit trail. Blocking backend calls, sequential attempts, no backoff.

use crate::backend::{QueryBackend, Row};
use crate::execution_loop::corrector::QueryCorrector;
use crate::execution_loop::error_classifier::{ErrorCategory, ErrorClassifier};
use crate::schema::SchemaCatalog;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One line of the retry audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

impl AuditEntry {
    fn now(message: String) -> Self {
        Self {
            at: Utc::now(),
            message,
        }
    }
}

/// Outcome of a retried execution, successful or not.
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub success: bool,
    pub rows: Option<Vec<Row>>,
    /// The SQL of the final attempt, corrected or not.
    pub final_sql: String,
    pub audit: Vec<AuditEntry>,
}

pub struct RetryExecutor {
    max_attempts: usize,
    classifier: ErrorClassifier,
    corrector: QueryCorrector,
}

impl RetryExecutor {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            classifier: ErrorClassifier::new(),
            corrector: QueryCorrector::new(),
        }
    }

    /// Execute `sql`, correcting and retrying on classified failures.
    ///
    /// A produced correction replaces the current SQL for the next attempt.
    /// Unclassifiable errors are retried as-is until the budget runs out;
    /// a classified error with no available correction is terminal.
    pub fn execute_with_retry(
        &self,
        backend: &dyn QueryBackend,
        catalog: &SchemaCatalog,
        sql: &str,
    ) -> RetryOutcome {
        let mut audit = Vec::new();
        let mut current = sql.to_string();
        let mut corrections_applied = 0usize;

        for attempt in 1..=self.max_attempts {
            info!("Executing query (attempt {}/{})", attempt, self.max_attempts);

            match backend.execute(&current) {
                Ok(rows) => {
                    if corrections_applied > 0 {
                        audit.push(AuditEntry::now(format!(
                            "Query succeeded after {} correction(s)",
                            corrections_applied
                        )));
                    }
                    return RetryOutcome {
                        success: true,
                        rows: Some(rows),
                        final_sql: current,
                        audit,
                    };
                }
                Err(err) => {
                    warn!("Query failed: {}", err.message);
                    audit.push(AuditEntry::now(format!(
                        "Attempt {} failed: {}",
                        attempt,
                        truncate(&err.message, 100)
                    )));

                    let record = self.classifier.analyze(&err.message, &current);
                    let correction = self.corrector.correct(catalog, &record);

                    match correction {
                        Some(correction) if attempt < self.max_attempts => {
                            audit.push(AuditEntry::now(format!(
                                "Applied correction: {} (confidence: {:.0}%)",
                                correction.category.as_str(),
                                correction.confidence * 100.0
                            )));
                            current = correction.corrected_sql;
                            corrections_applied += 1;
                        }
                        None if record.category == ErrorCategory::Unknown
                            && attempt < self.max_attempts =>
                        {
                            // Possibly transient; retry the same query.
                            audit.push(AuditEntry::now(
                                "Unclassifiable error, retrying".to_string(),
                            ));
                        }
                        // Terminal: no correction available, or budget spent.
                        _ => break,
                    }
                }
            }
        }

        audit.push(AuditEntry::now("Unable to correct query".to_string()));
        RetryOutcome {
            success: false,
            rows: None,
            final_sql: current,
            audit,
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ExecutionError;
    use crate::schema::TableSchema;
    use std::sync::Mutex;

    fn catalog() -> SchemaCatalog {
        let mut catalog = SchemaCatalog::new();
        catalog.add_table(TableSchema::new(
            "sales",
            vec![("transaction_id", "STRING"), ("amount", "DECIMAL")],
            None,
        ));
        catalog
    }

    /// Backend scripted with a sequence of responses.
    struct ScriptedBackend {
        responses: Mutex<Vec<Result<Vec<Row>, ExecutionError>>>,
        executed: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<Result<Vec<Row>, ExecutionError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                executed: Mutex::new(Vec::new()),
            }
        }

        fn executed(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    impl QueryBackend for ScriptedBackend {
        fn execute(&self, sql: &str) -> Result<Vec<Row>, ExecutionError> {
            self.executed.lock().unwrap().push(sql.to_string());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Err(ExecutionError::new("script exhausted"))
            } else {
                responses.remove(0)
            }
        }
    }

    #[test]
    fn test_success_after_one_correction() {
        let backend = ScriptedBackend::new(vec![
            Err(ExecutionError::new("column 'transactoin_id' does not exist")),
            Ok(vec![Row::new()]),
        ]);

        let outcome = RetryExecutor::new(3).execute_with_retry(
            &backend,
            &catalog(),
            "SELECT transactoin_id FROM sales",
        );

        assert!(outcome.success);
        assert!(outcome.audit.len() >= 2);
        assert_eq!(
            outcome.audit.last().unwrap().message,
            "Query succeeded after 1 correction(s)"
        );
        assert_eq!(backend.executed()[1], "SELECT transaction_id FROM sales");
        assert_eq!(outcome.final_sql, "SELECT transaction_id FROM sales");
    }

    #[test]
    fn test_unclassifiable_error_burns_full_budget() {
        let backend = ScriptedBackend::new(vec![
            Err(ExecutionError::new("connection reset by peer")),
            Err(ExecutionError::new("connection reset by peer")),
            Err(ExecutionError::new("connection reset by peer")),
        ]);

        let outcome = RetryExecutor::new(3).execute_with_retry(
            &backend,
            &catalog(),
            "SELECT amount FROM sales",
        );

        assert!(!outcome.success);
        assert_eq!(backend.executed().len(), 3);
        assert_eq!(
            outcome.audit.last().unwrap().message,
            "Unable to correct query"
        );
    }

    #[test]
    fn test_classified_uncorrectable_is_terminal() {
        let backend = ScriptedBackend::new(vec![Err(ExecutionError::new(
            "cannot cast DATE to INT",
        ))]);

        let outcome = RetryExecutor::new(3).execute_with_retry(
            &backend,
            &catalog(),
            "SELECT amount FROM sales",
        );

        assert!(!outcome.success);
        // Type mismatch has no rewrite strategy; one attempt only.
        assert_eq!(backend.executed().len(), 1);
        assert_eq!(
            outcome.audit.last().unwrap().message,
            "Unable to correct query"
        );
    }

    #[test]
    fn test_clean_success_has_empty_audit() {
        let backend = ScriptedBackend::new(vec![Ok(vec![])]);
        let outcome = RetryExecutor::new(3).execute_with_retry(
            &backend,
            &catalog(),
            "SELECT amount FROM sales",
        );

        assert!(outcome.success);
        assert!(outcome.audit.is_empty());
        assert_eq!(outcome.rows.unwrap().len(), 0);
    }
}
