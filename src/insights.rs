//! Insight Composer
//!
//! Deterministic, rule-based summary of query results: row count, sample
//! rows, and simple statistics over numeric columns. This is the guaranteed
//! fallback when no LLM collaborator is configured or it fails.

use crate::backend::Row;
use itertools::Itertools;

const MAX_CONTEXT_CHARS: usize = 500;
const MAX_SAMPLE_ROWS: usize = 3;
const MAX_NUMERIC_COLUMNS: usize = 3;

/// Compose insights from rows and retrieved context.
pub fn compose_insights(rows: Option<&[Row]>, context: Option<&str>) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(context) = context {
        if !context.is_empty() {
            sections.push("**Context:**".to_string());
            sections.push(context.chars().take(MAX_CONTEXT_CHARS).collect());
        }
    }

    if let Some(rows) = rows {
        sections.push("\n**Analysis:**".to_string());
        sections.push(format!("Found {} record(s).", rows.len()));

        if !rows.is_empty() {
            sections.push("\n**Sample Data:**".to_string());
            for (i, row) in rows.iter().take(MAX_SAMPLE_ROWS).enumerate() {
                let rendered = serde_json::to_string(row).unwrap_or_default();
                sections.push(format!("Record {}: {}", i + 1, rendered));
            }

            if rows.len() > 1 {
                let stats = numeric_stats(rows);
                if !stats.is_empty() {
                    sections.push("\n**Key Metrics:**".to_string());
                    sections.extend(stats);
                }
            }
        }
    }

    if sections.is_empty() {
        return "No specific insights available. Please refine your query.".to_string();
    }
    sections.join("\n")
}

/// Min/avg/max lines for up to three numeric columns, in sorted column order
/// so output is stable.
fn numeric_stats(rows: &[Row]) -> Vec<String> {
    let first = match rows.first() {
        Some(row) => row,
        None => return Vec::new(),
    };

    let numeric_cols: Vec<&String> = first
        .iter()
        .filter(|(_, v)| v.is_number())
        .map(|(k, _)| k)
        .sorted()
        .take(MAX_NUMERIC_COLUMNS)
        .collect();

    let mut stats = Vec::new();
    for col in numeric_cols {
        let values: Vec<f64> = rows
            .iter()
            .filter_map(|row| row.get(col.as_str()).and_then(|v| v.as_f64()))
            .collect();
        if values.is_empty() {
            continue;
        }

        let avg = values.iter().sum::<f64>() / values.len() as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        stats.push(format!(
            "- {}: Average = {:.2}, Min = {}, Max = {}",
            col, avg, min, max
        ));
    }
    stats
}
