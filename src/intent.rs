//! Query Intent
//!
//! Typed generation intent plus the heuristic extractor that maps free text
//! and the schema catalog into one. This is keyword matching, not NLU; the
//! optional LLM collaborator can do better, this path always works.

use crate::schema::SchemaCatalog;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Aggregation functions the generator will emit. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunc {
    pub fn as_sql(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "count",
            AggregateFunc::Sum => "sum",
            AggregateFunc::Avg => "avg",
            AggregateFunc::Min => "min",
            AggregateFunc::Max => "max",
        }
    }
}

/// What an aggregation applies to. `Star` is only legal with `Count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateTarget {
    Star,
    Column(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// A filter value: scalar, list (IN), or null (IS NULL).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Text(String),
    Number(f64),
    List(Vec<FilterValue>),
    Null,
}

/// Structured intent driving SQL generation. Ephemeral, one per request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationIntent {
    pub table_name: Option<String>,
    /// Columns to select; `None` means all columns of the table.
    pub columns: Option<Vec<String>>,
    /// Equality/IN/IS NULL filters, in emission order.
    pub filters: Vec<(String, FilterValue)>,
    pub aggregations: Vec<(AggregateTarget, AggregateFunc)>,
    pub group_by: Vec<String>,
    pub order_by: Vec<(String, OrderDirection)>,
    pub limit: Option<u64>,
    /// Set when the request asks for "top"/"highest"/"largest" without a
    /// resolvable order-by column.
    pub descending_hint: bool,
}

/// How the orchestrator should service a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    SqlOnly,
    ContextOnly,
    Both,
    Clarification,
}

/// Result of analyzing a request before generation.
#[derive(Debug, Clone)]
pub struct QueryAnalysis {
    pub query_type: QueryType,
    pub target_tables: Vec<String>,
    pub missing_information: Vec<String>,
    pub confidence: f64,
}

const SQL_KEYWORDS: &[&str] = &[
    "show", "get", "find", "list", "count", "sum", "average", "total", "calculate",
];

const CONTEXT_KEYWORDS: &[&str] = &["explain", "what is", "how to", "describe", "tell me about"];

const AGGREGATION_KEYWORDS: &[&str] = &["count", "total", "sum", "average", "avg"];

const DESCENDING_KEYWORDS: &[&str] = &["top", "highest", "largest"];

lazy_static! {
    static ref LIMIT_RE: Regex = Regex::new(r"(?:top|first|limit)\s+(\d+)").unwrap();
}

/// Heuristic intent extractor over the schema catalog.
pub struct IntentExtractor;

impl IntentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Identify target tables and decide the query type.
    ///
    /// Table matches are case-insensitive substrings; the longest table name
    /// wins, with catalog insertion order breaking ties. A retrieval-style
    /// request with no identifiable table needs clarification.
    pub fn analyze(&self, text: &str, catalog: &SchemaCatalog) -> QueryAnalysis {
        let lower = text.to_lowercase();

        let mut target_tables: Vec<String> = catalog
            .table_names()
            .into_iter()
            .filter(|name| lower.contains(&name.to_lowercase()))
            .collect();
        // Longest match first; `sort_by_key` is stable so catalog order
        // breaks ties.
        target_tables.sort_by_key(|name| std::cmp::Reverse(name.len()));

        let needs_sql = SQL_KEYWORDS.iter().any(|kw| lower.contains(kw));
        let needs_context = CONTEXT_KEYWORDS.iter().any(|kw| lower.contains(kw));

        if target_tables.is_empty() && needs_sql {
            debug!("No table identified for a retrieval-style request");
            return QueryAnalysis {
                query_type: QueryType::Clarification,
                target_tables: Vec::new(),
                missing_information: vec!["table name".to_string()],
                confidence: 0.5,
            };
        }

        let query_type = match (needs_sql, needs_context) {
            (true, false) => QueryType::SqlOnly,
            (false, true) => QueryType::ContextOnly,
            _ => QueryType::Both,
        };

        QueryAnalysis {
            query_type,
            target_tables,
            missing_information: Vec::new(),
            confidence: 0.8,
        }
    }

    /// Extract a generation intent from free text.
    ///
    /// Filter detection is intentionally absent; filters stay empty unless a
    /// collaborator fills them in.
    pub fn extract(&self, text: &str, catalog: &SchemaCatalog) -> GenerationIntent {
        let lower = text.to_lowercase();
        let analysis = self.analyze(text, catalog);

        let mut intent = GenerationIntent {
            table_name: analysis.target_tables.first().cloned(),
            ..Default::default()
        };

        if AGGREGATION_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            intent
                .aggregations
                .push((AggregateTarget::Star, AggregateFunc::Count));
        }

        if DESCENDING_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            intent.descending_hint = true;
        }

        if let Some(caps) = LIMIT_RE.captures(&lower) {
            intent.limit = caps[1].parse().ok();
        } else if lower.contains("top") {
            intent.limit = Some(10);
        }

        info!(
            "Extracted intent: table={:?} aggregations={} limit={:?}",
            intent.table_name,
            intent.aggregations.len(),
            intent.limit
        );
        intent
    }
}

impl Default for IntentExtractor {
    fn default() -> Self {
        Self::new()
    }
}
