//! Query Corrector
//!
//! Category-specific rewrite strategies for failed queries: nearest-identifier
//! substitution against the schema catalog, textual syntax patches, and
//! GROUP BY repair. A strategy that proposes nothing is terminal for that
//! classification.

use crate::execution_loop::error_classifier::{ErrorCategory, SqlErrorRecord};
use crate::schema::SchemaCatalog;
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A proposed rewrite of a failing query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correction {
    pub original_sql: String,
    pub corrected_sql: String,
    pub category: ErrorCategory,
    /// In [0, 1]; fixed per strategy.
    pub confidence: f64,
}

lazy_static! {
    static ref COLUMN_RE: Regex = Regex::new(r"(?i)column '?(\w+)'?").unwrap();
    static ref TABLE_RE: Regex = Regex::new(r"(?i)table '?(\w+)'?").unwrap();
    static ref FROM_RE: Regex = Regex::new(r"(?i)FROM\s+(\w+)").unwrap();
    static ref SELECT_LIST_RE: Regex = Regex::new(r"(?is)SELECT\s+(.*?)\s+FROM").unwrap();
    static ref MISSING_COMMA_RE: Regex = Regex::new(r"(?i)(\w+)\s+(\w+)\s+FROM").unwrap();
    static ref DOUBLE_QUOTED_RE: Regex = Regex::new(r#""([^"]+)""#).unwrap();
    static ref GROUP_BY_CLAUSE_RE: Regex =
        Regex::new(r"(?is)GROUP BY\s.*?(?P<tail>ORDER BY|LIMIT|$)").unwrap();
    static ref ORDER_BY_RE: Regex = Regex::new(r"(?i)ORDER BY").unwrap();
    static ref LIMIT_RE: Regex = Regex::new(r"(?i)LIMIT").unwrap();
}

const AGGREGATE_NAMES: &[&str] = &["COUNT", "SUM", "AVG", "MIN", "MAX"];

pub struct QueryCorrector;

impl QueryCorrector {
    pub fn new() -> Self {
        Self
    }

    /// Dispatch to the strategy for the record's category.
    pub fn correct(
        &self,
        catalog: &SchemaCatalog,
        record: &SqlErrorRecord,
    ) -> Option<Correction> {
        info!("Attempting to correct SQL error: {}", record.category.as_str());
        match record.category {
            ErrorCategory::ColumnNotFound => self.correct_column_name(catalog, record),
            ErrorCategory::TableNotFound => self.correct_table_name(catalog, record),
            ErrorCategory::SyntaxError => self.correct_syntax(record),
            ErrorCategory::AggregateError => self.correct_group_by(record),
            // No automatic rewrite for type mismatches; surfaced as-is.
            ErrorCategory::TypeMismatch => None,
            ErrorCategory::Unknown => None,
        }
    }

    fn correct_column_name(
        &self,
        catalog: &SchemaCatalog,
        record: &SqlErrorRecord,
    ) -> Option<Correction> {
        let wrong_column = COLUMN_RE.captures(&record.message)?.get(1)?.as_str();
        let table_name = FROM_RE.captures(&record.sql)?.get(1)?.as_str();
        let columns = catalog.table_columns(table_name)?;

        let similar = find_similar_string(wrong_column, columns)?;
        let corrected_sql = record.sql.replace(wrong_column, &similar);

        Some(Correction {
            original_sql: record.sql.clone(),
            corrected_sql,
            category: ErrorCategory::ColumnNotFound,
            confidence: 0.8,
        })
    }

    fn correct_table_name(
        &self,
        catalog: &SchemaCatalog,
        record: &SqlErrorRecord,
    ) -> Option<Correction> {
        let wrong_table = TABLE_RE.captures(&record.message)?.get(1)?.as_str();
        let tables = catalog.table_names();

        let similar = find_similar_string(wrong_table, &tables)?;
        let word_re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(wrong_table))).ok()?;
        let corrected_sql = word_re.replace_all(&record.sql, similar.as_str()).to_string();

        Some(Correction {
            original_sql: record.sql.clone(),
            corrected_sql,
            category: ErrorCategory::TableNotFound,
            confidence: 0.8,
        })
    }

    /// Small fixed set of textual rewrites; the first one that changes the
    /// text wins.
    fn correct_syntax(&self, record: &SqlErrorRecord) -> Option<Correction> {
        let sql = &record.sql;

        let mut corrected = sql.clone();
        if let Some(caps) = MISSING_COMMA_RE.captures(sql) {
            // Keywords are not identifiers; "SELECT col FROM" is fine as-is.
            if !caps[1].eq_ignore_ascii_case("select") {
                corrected = MISSING_COMMA_RE.replace(sql, "$1, $2 FROM").to_string();
            }
        }
        if corrected == *sql {
            corrected = DOUBLE_QUOTED_RE.replace_all(sql, "'$1'").to_string();
        }
        if corrected == *sql {
            let upper = sql.to_uppercase();
            if upper.contains("COUNT") && !upper.contains("GROUP BY") {
                corrected = format!("{} GROUP BY 1", sql.trim_end());
            }
        }

        if corrected == *sql {
            debug!("No syntax rewrite applied");
            return None;
        }

        Some(Correction {
            original_sql: sql.clone(),
            corrected_sql: corrected,
            category: ErrorCategory::SyntaxError,
            confidence: 0.6,
        })
    }

    /// Rebuild GROUP BY from the non-aggregated SELECT-list expressions.
    fn correct_group_by(&self, record: &SqlErrorRecord) -> Option<Correction> {
        let select_list = SELECT_LIST_RE
            .captures(&record.sql)?
            .get(1)?
            .as_str()
            .to_string();

        let non_aggregate: Vec<String> = select_list
            .split(',')
            .map(str::trim)
            .filter(|expr| {
                let upper = expr.to_uppercase();
                !AGGREGATE_NAMES.iter().any(|agg| upper.contains(agg))
            })
            .map(str::to_string)
            .collect();

        if non_aggregate.is_empty() {
            return None;
        }
        let group_by_clause = format!("GROUP BY {}", non_aggregate.iter().join(", "));

        let sql = &record.sql;
        let upper = sql.to_uppercase();
        let corrected = if upper.contains("GROUP BY") {
            GROUP_BY_CLAUSE_RE
                .replace(sql, format!("{} $tail", group_by_clause))
                .to_string()
        } else if upper.contains("ORDER BY") {
            ORDER_BY_RE
                .replace(sql, format!("{} ORDER BY", group_by_clause))
                .to_string()
        } else if upper.contains("LIMIT") {
            LIMIT_RE
                .replace(sql, format!("{} LIMIT", group_by_clause))
                .to_string()
        } else {
            format!("{} {}", sql.trim_end(), group_by_clause)
        };

        if corrected == *sql {
            return None;
        }

        Some(Correction {
            original_sql: sql.clone(),
            corrected_sql: corrected,
            category: ErrorCategory::AggregateError,
            confidence: 0.7,
        })
    }
}

impl Default for QueryCorrector {
    fn default() -> Self {
        Self::new()
    }
}

/// Closest candidate by Levenshtein distance, accepted only when the distance
/// is at most half the target's length. No minimum-length floor, so very
/// short identifiers can over-correct.
fn find_similar_string(target: &str, candidates: &[String]) -> Option<String> {
    let target_lower = target.to_lowercase();
    let best = candidates
        .iter()
        .map(|c| (c, strsim::levenshtein(&target_lower, &c.to_lowercase())))
        .min_by_key(|(_, d)| *d)?;

    let max_distance = target.len() / 2;
    if best.1 <= max_distance {
        Some(best.0.clone())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution_loop::error_classifier::ErrorClassifier;
    use crate::schema::TableSchema;

    fn catalog() -> SchemaCatalog {
        let mut catalog = SchemaCatalog::new();
        catalog.add_table(TableSchema::new(
            "sales",
            vec![
                ("transaction_id", "STRING"),
                ("customer_id", "STRING"),
                ("amount", "DECIMAL"),
                ("region", "STRING"),
            ],
            None,
        ));
        catalog
    }

    fn record(message: &str, sql: &str) -> SqlErrorRecord {
        ErrorClassifier::new().analyze(message, sql)
    }

    #[test]
    fn test_column_typo_corrected() {
        let correction = QueryCorrector::new()
            .correct(
                &catalog(),
                &record(
                    "column 'transactoin_id' does not exist",
                    "SELECT transactoin_id FROM sales",
                ),
            )
            .unwrap();

        assert_eq!(correction.confidence, 0.8);
        assert!(correction.corrected_sql.contains("transaction_id"));
        assert!(!correction.corrected_sql.contains("transactoin_id"));
    }

    #[test]
    fn test_column_too_different_not_corrected() {
        let correction = QueryCorrector::new().correct(
            &catalog(),
            &record(
                "column 'zzzzzzzzzzzz' does not exist",
                "SELECT zzzzzzzzzzzz FROM sales",
            ),
        );
        assert!(correction.is_none());
    }

    #[test]
    fn test_table_typo_corrected() {
        let correction = QueryCorrector::new()
            .correct(
                &catalog(),
                &record("Unknown table 'slaes'", "SELECT amount FROM slaes"),
            )
            .unwrap();

        assert_eq!(correction.corrected_sql, "SELECT amount FROM sales");
    }

    #[test]
    fn test_syntax_missing_comma() {
        let correction = QueryCorrector::new()
            .correct(
                &catalog(),
                &record(
                    "mismatched input 'FROM'",
                    "SELECT amount region FROM sales",
                ),
            )
            .unwrap();

        assert_eq!(correction.confidence, 0.6);
        assert_eq!(correction.corrected_sql, "SELECT amount, region FROM sales");
    }

    #[test]
    fn test_syntax_double_quotes_converted() {
        let correction = QueryCorrector::new()
            .correct(
                &catalog(),
                &record(
                    "syntax error near '\"US\"'",
                    "SELECT amount FROM sales WHERE region = \"US\"",
                ),
            )
            .unwrap();

        assert!(correction.corrected_sql.ends_with("region = 'US'"));
    }

    #[test]
    fn test_group_by_rebuilt_from_select_list() {
        let correction = QueryCorrector::new()
            .correct(
                &catalog(),
                &record(
                    "expression 'region' is not a GROUP BY expression",
                    "SELECT region, SUM(amount) AS amount_sum FROM sales",
                ),
            )
            .unwrap();

        assert_eq!(correction.confidence, 0.7);
        assert!(
            correction.corrected_sql.ends_with("GROUP BY region"),
            "got: {}",
            correction.corrected_sql
        );
    }

    #[test]
    fn test_group_by_inserted_before_order_by() {
        let correction = QueryCorrector::new()
            .correct(
                &catalog(),
                &record(
                    "expression 'region' is not a GROUP BY expression",
                    "SELECT region, SUM(amount) AS amount_sum FROM sales ORDER BY amount_sum DESC",
                ),
            )
            .unwrap();

        assert!(
            correction
                .corrected_sql
                .contains("GROUP BY region ORDER BY"),
            "got: {}",
            correction.corrected_sql
        );
    }

    #[test]
    fn test_type_mismatch_is_noop() {
        let correction = QueryCorrector::new().correct(
            &catalog(),
            &record("cannot cast DATE to INT", "SELECT amount FROM sales"),
        );
        assert!(correction.is_none());
    }
}
