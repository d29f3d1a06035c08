//! SQL Generator
//!
//! Deterministic compiler from a `GenerationIntent` to SQL text. Every
//! identifier is checked against the schema catalog before emission;
//! generation is refused outright rather than emitting an unverified query.

use crate::intent::{AggregateFunc, AggregateTarget, FilterValue, GenerationIntent};
use crate::schema::SchemaCatalog;
use itertools::Itertools;
use tracing::{error, info};

/// Alias used for the `COUNT(*)` default aggregation.
pub const COUNT_ALL_ALIAS: &str = "count_all";

pub struct SqlGenerator;

impl SqlGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate SQL for the intent, or `None` if any referenced table or
    /// column is unknown. `None` is a definitive rejection, not a retryable
    /// error.
    pub fn generate(&self, catalog: &SchemaCatalog, intent: &GenerationIntent) -> Option<String> {
        let table_name = match &intent.table_name {
            Some(name) => name,
            None => {
                error!("Intent has no table name");
                return None;
            }
        };
        let table = match catalog.get_table(table_name) {
            Some(t) => t,
            None => {
                error!("Table {} not found in schema", table_name);
                return None;
            }
        };

        // Explicit columns must all exist, even when aggregations override
        // the select list.
        if let Some(cols) = &intent.columns {
            for col in cols {
                if !catalog.column_exists(table_name, col) {
                    error!("Column {} not found in table {}", col, table_name);
                    return None;
                }
            }
        }

        let select_parts = if !intent.aggregations.is_empty() {
            let mut parts = Vec::new();
            for (target, func) in &intent.aggregations {
                match target {
                    AggregateTarget::Star => {
                        if *func != AggregateFunc::Count {
                            error!("{}(*) is not a valid aggregation", func.as_sql());
                            return None;
                        }
                        parts.push(format!("COUNT(*) AS {}", COUNT_ALL_ALIAS));
                    }
                    AggregateTarget::Column(col) => {
                        if !catalog.column_exists(table_name, col) {
                            error!("Column {} not found in table {}", col, table_name);
                            return None;
                        }
                        parts.push(format!(
                            "{}({}) AS {}_{}",
                            func.as_sql(),
                            col,
                            col,
                            func.suffix()
                        ));
                    }
                }
            }
            parts
        } else if let Some(cols) = &intent.columns {
            cols.clone()
        } else {
            table.columns.clone()
        };

        let mut sql = format!("SELECT {} FROM {}", select_parts.iter().join(", "), table_name);

        if !intent.filters.is_empty() {
            let mut where_parts = Vec::new();
            for (col, value) in &intent.filters {
                if !catalog.column_exists(table_name, col) {
                    error!("Column {} not found in table {}", col, table_name);
                    return None;
                }
                where_parts.push(render_predicate(col, value));
            }
            sql.push_str(&format!(" WHERE {}", where_parts.iter().join(" AND ")));
        }

        if !intent.group_by.is_empty() {
            for col in &intent.group_by {
                if !catalog.column_exists(table_name, col) {
                    error!("Column {} not found in table {}", col, table_name);
                    return None;
                }
            }
            sql.push_str(&format!(" GROUP BY {}", intent.group_by.iter().join(", ")));
        }

        if !intent.order_by.is_empty() {
            let mut order_parts = Vec::new();
            for (col, direction) in &intent.order_by {
                if !catalog.column_exists(table_name, col) {
                    error!("Column {} not found in table {}", col, table_name);
                    return None;
                }
                order_parts.push(format!("{} {}", col, direction.as_sql()));
            }
            sql.push_str(&format!(" ORDER BY {}", order_parts.iter().join(", ")));
        } else if intent.descending_hint && has_count_star(intent) {
            // The alias is generator-owned, never user input.
            sql.push_str(&format!(" ORDER BY {} DESC", COUNT_ALL_ALIAS));
        }

        if let Some(limit) = intent.limit {
            if limit == 0 {
                error!("Invalid limit value: {}", limit);
                return None;
            }
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        info!("Generated SQL: {}", sql);
        Some(sql)
    }
}

impl Default for SqlGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn has_count_star(intent: &GenerationIntent) -> bool {
    intent
        .aggregations
        .iter()
        .any(|(t, f)| *t == AggregateTarget::Star && *f == AggregateFunc::Count)
}

fn render_predicate(col: &str, value: &FilterValue) -> String {
    match value {
        FilterValue::Null => format!("{} IS NULL", col),
        FilterValue::List(items) => {
            let rendered = items.iter().map(render_scalar).join(", ");
            format!("{} IN ({})", col, rendered)
        }
        scalar => format!("{} = {}", col, render_scalar(scalar)),
    }
}

fn render_scalar(value: &FilterValue) -> String {
    match value {
        // Single quotes are escaped by doubling.
        FilterValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        FilterValue::Number(n) => format!("{}", n),
        FilterValue::Null => "NULL".to_string(),
        FilterValue::List(items) => items.iter().map(render_scalar).join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::OrderDirection;
    use crate::schema::TableSchema;

    fn catalog() -> SchemaCatalog {
        let mut catalog = SchemaCatalog::new();
        catalog.add_table(TableSchema::new(
            "sales",
            vec![
                ("transaction_id", "STRING"),
                ("customer_id", "STRING"),
                ("amount", "DECIMAL"),
                ("date", "DATE"),
                ("region", "STRING"),
            ],
            None,
        ));
        catalog
    }

    fn intent_for(table: &str) -> GenerationIntent {
        GenerationIntent {
            table_name: Some(table.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_select_all_columns() {
        let sql = SqlGenerator::new()
            .generate(&catalog(), &intent_for("sales"))
            .unwrap();
        assert_eq!(
            sql,
            "SELECT transaction_id, customer_id, amount, date, region FROM sales"
        );
    }

    #[test]
    fn test_filter_with_quote_escaping() {
        let mut intent = intent_for("sales");
        intent.filters.push((
            "region".to_string(),
            FilterValue::Text("O'Brien's".to_string()),
        ));

        let sql = SqlGenerator::new().generate(&catalog(), &intent).unwrap();
        assert!(sql.contains("WHERE region = 'O''Brien''s'"), "got: {}", sql);
    }

    #[test]
    fn test_in_and_null_filters() {
        let mut intent = intent_for("sales");
        intent.filters.push((
            "region".to_string(),
            FilterValue::List(vec![
                FilterValue::Text("US".to_string()),
                FilterValue::Text("EU".to_string()),
            ]),
        ));
        intent.filters.push(("date".to_string(), FilterValue::Null));

        let sql = SqlGenerator::new().generate(&catalog(), &intent).unwrap();
        assert!(sql.contains("region IN ('US', 'EU')"), "got: {}", sql);
        assert!(sql.contains("date IS NULL"), "got: {}", sql);
        assert!(sql.contains(" AND "), "got: {}", sql);
    }

    #[test]
    fn test_aggregation_with_group_by() {
        let mut intent = intent_for("sales");
        intent.aggregations.push((
            AggregateTarget::Column("amount".to_string()),
            AggregateFunc::Sum,
        ));
        intent.group_by.push("region".to_string());

        let sql = SqlGenerator::new().generate(&catalog(), &intent).unwrap();
        assert!(sql.contains("SUM(amount) AS amount_sum"), "got: {}", sql);
        assert!(sql.contains("GROUP BY region"), "got: {}", sql);
        assert!(!sql.contains("WHERE"), "got: {}", sql);
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let mut intent = intent_for("sales");
        intent.columns = Some(vec!["nonexistent_column".to_string()]);
        assert!(SqlGenerator::new().generate(&catalog(), &intent).is_none());
    }

    #[test]
    fn test_unknown_table_is_rejected() {
        assert!(SqlGenerator::new()
            .generate(&catalog(), &intent_for("orders"))
            .is_none());
    }

    #[test]
    fn test_unknown_group_by_and_order_by_rejected() {
        let mut intent = intent_for("sales");
        intent.group_by.push("no_such".to_string());
        assert!(SqlGenerator::new().generate(&catalog(), &intent).is_none());

        let mut intent = intent_for("sales");
        intent
            .order_by
            .push(("no_such".to_string(), OrderDirection::Desc));
        assert!(SqlGenerator::new().generate(&catalog(), &intent).is_none());
    }

    #[test]
    fn test_count_star_with_hint_and_limit() {
        let mut intent = intent_for("sales");
        intent
            .aggregations
            .push((AggregateTarget::Star, AggregateFunc::Count));
        intent.descending_hint = true;
        intent.limit = Some(10);

        let sql = SqlGenerator::new().generate(&catalog(), &intent).unwrap();
        assert_eq!(
            sql,
            "SELECT COUNT(*) AS count_all FROM sales ORDER BY count_all DESC LIMIT 10"
        );
    }

    #[test]
    fn test_star_only_counts() {
        let mut intent = intent_for("sales");
        intent
            .aggregations
            .push((AggregateTarget::Star, AggregateFunc::Sum));
        assert!(SqlGenerator::new().generate(&catalog(), &intent).is_none());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let mut intent = intent_for("sales");
        intent.limit = Some(0);
        assert!(SqlGenerator::new().generate(&catalog(), &intent).is_none());
    }

    #[test]
    fn test_order_by_validated_direction() {
        let mut intent = intent_for("sales");
        intent
            .order_by
            .push(("amount".to_string(), OrderDirection::Desc));
        let sql = SqlGenerator::new().generate(&catalog(), &intent).unwrap();
        assert!(sql.ends_with("ORDER BY amount DESC"), "got: {}", sql);
    }
}
