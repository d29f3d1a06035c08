//! Schema Catalog
//!
//! Authoritative mapping of table name to columns and types. Every identifier
//! that reaches generated or corrected SQL is checked against this catalog.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Schema of a single warehouse table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    /// Column names in table order.
    pub columns: Vec<String>,
    pub column_types: HashMap<String, String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TableSchema {
    pub fn new(
        name: impl Into<String>,
        columns: Vec<(&str, &str)>,
        description: Option<String>,
    ) -> Self {
        let name = name.into();
        let column_types = columns
            .iter()
            .map(|(c, t)| (c.to_string(), t.to_string()))
            .collect();
        let columns = columns.iter().map(|(c, _)| c.to_string()).collect();
        Self {
            name,
            columns,
            column_types,
            description,
        }
    }
}

/// In-memory catalog of table schemas.
///
/// Lookups are O(1); `table_names` iterates in insertion order so table
/// detection stays deterministic. Mutation is expected only during setup or
/// refresh, never concurrently with request processing.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    tables: HashMap<String, TableSchema>,
    /// Insertion order of table names; kept in sync with `tables`.
    order: Vec<String>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table schema. A table with the same name is replaced.
    pub fn add_table(&mut self, table: TableSchema) {
        info!("Added table schema: {}", table.name);
        if !self.tables.contains_key(&table.name) {
            self.order.push(table.name.clone());
        }
        self.tables.insert(table.name.clone(), table);
    }

    pub fn get_table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    /// All table names, in insertion order.
    pub fn table_names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn table_columns(&self, name: &str) -> Option<&[String]> {
        self.get_table(name).map(|t| t.columns.as_slice())
    }

    pub fn column_exists(&self, table: &str, column: &str) -> bool {
        self.get_table(table)
            .map(|t| t.columns.iter().any(|c| c == column))
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Human-readable summary of all tables, used for clarifications and as
    /// schema context for the LLM collaborator.
    pub fn schema_summary(&self) -> String {
        if self.tables.is_empty() {
            return "No tables in schema".to_string();
        }

        let mut summary = String::from("Available tables and columns:\n");
        for name in &self.order {
            let table = &self.tables[name];
            summary.push_str(&format!("\nTable: {}\n", name));
            if let Some(desc) = &table.description {
                summary.push_str(&format!("  Description: {}\n", desc));
            }
            summary.push_str("  Columns:\n");
            for col in &table.columns {
                let col_type = table
                    .column_types
                    .get(col)
                    .map(String::as_str)
                    .unwrap_or("unknown");
                summary.push_str(&format!("    - {} ({})\n", col, col_type));
            }
        }
        summary
    }
}
