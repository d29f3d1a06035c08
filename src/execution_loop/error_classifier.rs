//! Error Classifier
//!
//! Maps raw backend error strings onto a fixed taxonomy via ordered pattern
//! matching. No raw backend error leaves the execution loop unclassified.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    ColumnNotFound,
    TableNotFound,
    SyntaxError,
    TypeMismatch,
    AggregateError,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::ColumnNotFound => "column_not_found",
            ErrorCategory::TableNotFound => "table_not_found",
            ErrorCategory::SyntaxError => "syntax_error",
            ErrorCategory::TypeMismatch => "type_mismatch",
            ErrorCategory::AggregateError => "aggregate_error",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

/// A classified execution failure, paired with the SQL that caused it.
#[derive(Debug, Clone)]
pub struct SqlErrorRecord {
    pub message: String,
    pub category: ErrorCategory,
    pub sql: String,
}

lazy_static! {
    /// Ordered pattern sets; the first matching category wins.
    static ref ERROR_PATTERNS: Vec<(ErrorCategory, Vec<Regex>)> = vec![
        (
            ErrorCategory::ColumnNotFound,
            compile(&[
                r"column '?(\w+)'? (does not exist|not found|cannot be resolved)",
                r"Unknown column '?(\w+)'?",
                r"no such column: (\w+)",
            ]),
        ),
        (
            ErrorCategory::TableNotFound,
            compile(&[
                r"table '?(\w+)'? (does not exist|not found|cannot be resolved)",
                r"Unknown table '?(\w+)'?",
                r"no such table: (\w+)",
            ]),
        ),
        (
            ErrorCategory::SyntaxError,
            compile(&[
                r"syntax error near '?(.+?)'?",
                r"ParseException",
                r"mismatched input",
            ]),
        ),
        (
            ErrorCategory::TypeMismatch,
            compile(&[r"type mismatch", r"cannot cast", r"incompatible types"]),
        ),
        (
            ErrorCategory::AggregateError,
            compile(&[
                r"not a GROUP BY expression",
                r"must appear in the GROUP BY clause",
            ]),
        ),
    ];
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).expect("static error pattern"))
        .collect()
}

pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, message: &str) -> ErrorCategory {
        for (category, patterns) in ERROR_PATTERNS.iter() {
            if patterns.iter().any(|p| p.is_match(message)) {
                return *category;
            }
        }
        ErrorCategory::Unknown
    }

    pub fn analyze(&self, message: &str, sql: &str) -> SqlErrorRecord {
        SqlErrorRecord {
            message: message.to_string(),
            category: self.classify(message),
            sql: sql.to_string(),
        }
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_categories() {
        let c = ErrorClassifier::new();
        assert_eq!(
            c.classify("column 'amont' does not exist"),
            ErrorCategory::ColumnNotFound
        );
        assert_eq!(
            c.classify("Unknown column 'foo'"),
            ErrorCategory::ColumnNotFound
        );
        assert_eq!(
            c.classify("Unknown table 'slaes'"),
            ErrorCategory::TableNotFound
        );
        assert_eq!(
            c.classify("org.apache.spark.sql.catalyst.parser.ParseException: line 1"),
            ErrorCategory::SyntaxError
        );
        assert_eq!(c.classify("cannot cast DATE to INT"), ErrorCategory::TypeMismatch);
        assert_eq!(
            c.classify("expression 'region' is not a GROUP BY expression"),
            ErrorCategory::AggregateError
        );
        assert_eq!(c.classify("connection reset by peer"), ErrorCategory::Unknown);
    }

    #[test]
    fn test_first_matching_category_wins() {
        // Mentions both a column pattern and a syntax pattern; column is
        // checked first.
        let c = ErrorClassifier::new();
        assert_eq!(
            c.classify("column 'x' does not exist; mismatched input"),
            ErrorCategory::ColumnNotFound
        );
    }
}
