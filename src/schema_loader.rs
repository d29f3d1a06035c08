//! Schema Loader
//!
//! Auto-discovers table schemas through the execution backend using
//! DESCRIBE/SHOW introspection queries, so the catalog never has to be
//! written by hand. All failures degrade to "table skipped" with a warning.

use crate::backend::{QueryBackend, Row};
use crate::schema::{SchemaCatalog, TableSchema};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub struct SchemaLoader<'a> {
    backend: &'a dyn QueryBackend,
}

impl<'a> SchemaLoader<'a> {
    pub fn new(backend: &'a dyn QueryBackend) -> Self {
        Self { backend }
    }

    /// Load the schema of one table via `DESCRIBE TABLE`, or `None` when the
    /// table is missing or yields no parsable columns.
    pub fn load_table_schema(
        &self,
        table_name: &str,
        catalog_name: &str,
        schema_name: &str,
    ) -> Option<TableSchema> {
        let full_name = format!("{}.{}.{}", catalog_name, schema_name, table_name);
        info!("Loading schema for table: {}", full_name);

        let rows = match self.backend.execute(&format!("DESCRIBE TABLE {}", full_name)) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Failed to describe {}: {}", full_name, e.message);
                return None;
            }
        };

        let mut columns = Vec::new();
        let mut column_types = HashMap::new();
        for row in &rows {
            let col_name = string_field(row, "col_name").unwrap_or_default();
            let col_name = col_name.trim();
            // Partition markers and header echoes are not columns.
            if col_name.is_empty()
                || col_name.starts_with('#')
                || col_name.eq_ignore_ascii_case("col_name")
            {
                continue;
            }
            let col_type = string_field(row, "data_type")
                .unwrap_or_else(|| "STRING".to_string())
                .trim()
                .to_uppercase();
            columns.push(col_name.to_string());
            column_types.insert(col_name.to_string(), col_type);
        }

        if columns.is_empty() {
            warn!("No columns found for table: {}", full_name);
            return None;
        }

        let description = self
            .table_comment(&full_name)
            .unwrap_or_else(|| format!("Auto-detected schema for {}", table_name));

        info!("Loaded schema for {} ({} columns)", table_name, columns.len());
        Some(TableSchema {
            name: table_name.to_string(),
            columns,
            column_types,
            description: Some(description),
        })
    }

    /// Table comment from TBLPROPERTIES, best-effort.
    fn table_comment(&self, full_name: &str) -> Option<String> {
        let rows = self
            .backend
            .execute(&format!("SHOW TBLPROPERTIES {}", full_name))
            .map_err(|e| debug!("Could not retrieve table comment: {}", e.message))
            .ok()?;
        rows.iter()
            .find(|row| string_field(row, "key").as_deref() == Some("comment"))
            .and_then(|row| string_field(row, "value"))
    }

    /// Discover and load every table in `catalog_name.schema_name`,
    /// optionally restricted to `table_filter`.
    pub fn load_all_tables(
        &self,
        catalog_name: &str,
        schema_name: &str,
        table_filter: Option<&[String]>,
    ) -> Vec<TableSchema> {
        info!("Discovering tables in {}.{}", catalog_name, schema_name);
        let rows = match self
            .backend
            .execute(&format!("SHOW TABLES IN {}.{}", catalog_name, schema_name))
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(
                    "Failed to list tables in {}.{}: {}",
                    catalog_name, schema_name, e.message
                );
                return Vec::new();
            }
        };

        let mut schemas = Vec::new();
        for row in &rows {
            let table_name = string_field(row, "tableName").or_else(|| string_field(row, "name"));
            let table_name = match table_name {
                Some(name) => name,
                None => continue,
            };
            if let Some(filter) = table_filter {
                if !filter.contains(&table_name) {
                    continue;
                }
            }
            if let Some(schema) = self.load_table_schema(&table_name, catalog_name, schema_name) {
                schemas.push(schema);
            }
        }

        info!(
            "Loaded {} table schemas from {}.{}",
            schemas.len(),
            catalog_name,
            schema_name
        );
        schemas
    }

    /// Populate a catalog with everything discoverable; returns the number of
    /// tables loaded.
    pub fn populate(
        &self,
        catalog: &mut SchemaCatalog,
        catalog_name: &str,
        schema_name: &str,
        table_filter: Option<&[String]>,
    ) -> usize {
        let schemas = self.load_all_tables(catalog_name, schema_name, table_filter);
        let count = schemas.len();
        for schema in schemas {
            catalog.add_table(schema);
        }
        count
    }
}

fn string_field(row: &Row, key: &str) -> Option<String> {
    row.get(key).and_then(|v| v.as_str()).map(str::to_string)
}
