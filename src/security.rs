//! Security Guards
//!
//! Input validation, SQL injection screening, generated-SQL gating, and
//! rate limiting. Every user request passes through here before anything
//! else runs, and every generated query passes through here before execution.

use crate::error::{AgentError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Security configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub max_query_length: usize,
    pub rate_limit_per_minute: usize,
    pub allowed_schemas: Vec<String>,
    /// Statement types that must never appear in user input.
    pub forbidden_keywords: Vec<String>,
    /// Case-insensitive regex patterns that indicate injection attempts.
    pub injection_patterns: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_query_length: 10_000,
            rate_limit_per_minute: 60,
            allowed_schemas: vec!["default".to_string(), "analytics".to_string()],
            forbidden_keywords: [
                "DROP", "DELETE", "TRUNCATE", "ALTER", "CREATE", "INSERT", "UPDATE", "GRANT",
                "REVOKE", "EXEC", "EXECUTE",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            injection_patterns: [
                r";\s*--",          // comment after semicolon
                r";\s*$",           // query chaining
                r"UNION\s+SELECT",  // union-based injection
                r"OR\s+1\s*=\s*1",  // always-true condition
                r"'\s*OR\s*'",      // quote-based injection
                r"--\s*$",          // trailing comment
                r"/\*.*\*/",        // block comments
                r"xp_",             // extended stored procedures
                r"sp_",             // system stored procedures
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Validates and sanitizes user input, and gates generated SQL.
pub struct SecurityValidator {
    config: SecurityConfig,
    injection_patterns: Vec<Regex>,
    keyword_patterns: Vec<(String, Regex)>,
}

impl SecurityValidator {
    pub fn new(config: SecurityConfig) -> Result<Self> {
        let injection_patterns = config
            .injection_patterns
            .iter()
            .map(|p| {
                Regex::new(&format!("(?i){}", p))
                    .map_err(|e| AgentError::Security(format!("Invalid injection pattern: {}", e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let keyword_patterns = config
            .forbidden_keywords
            .iter()
            .map(|kw| {
                Regex::new(&format!(r"(?i)\b{}\b", kw))
                    .map(|re| (kw.clone(), re))
                    .map_err(|e| AgentError::Security(format!("Invalid keyword pattern: {}", e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config,
            injection_patterns,
            keyword_patterns,
        })
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Validate raw user input. Checks run in a fixed order and the first
    /// failure determines the reported reason: length, emptiness, injection
    /// patterns, forbidden keywords.
    pub fn validate_input(&self, text: &str) -> Result<()> {
        if text.chars().count() > self.config.max_query_length {
            return Err(AgentError::Security(format!(
                "Query exceeds maximum length of {} characters",
                self.config.max_query_length
            )));
        }

        if text.trim().is_empty() {
            return Err(AgentError::Security("Query cannot be empty".to_string()));
        }

        for pattern in &self.injection_patterns {
            if pattern.is_match(text) {
                warn!("Potential SQL injection detected: {}", pattern.as_str());
                return Err(AgentError::Security(
                    "Query contains potentially dangerous SQL patterns".to_string(),
                ));
            }
        }

        for (keyword, pattern) in &self.keyword_patterns {
            if pattern.is_match(text) {
                warn!("Forbidden SQL keyword detected: {}", keyword);
                return Err(AgentError::Security(format!(
                    "Query contains forbidden SQL keyword: {}",
                    keyword
                )));
            }
        }

        Ok(())
    }

    /// Validate generated SQL before execution: it must parse as exactly one
    /// SELECT statement. Schema-name presence is advisory only and is logged,
    /// not enforced.
    pub fn validate_generated_sql(&self, sql: &str) -> Result<()> {
        use sqlparser::dialect::GenericDialect;
        use sqlparser::parser::Parser;

        let statements = Parser::parse_sql(&GenericDialect {}, sql)
            .map_err(|e| AgentError::Validation(format!("Invalid SQL syntax: {}", e)))?;

        if statements.len() != 1 {
            return Err(AgentError::Validation(format!(
                "Expected exactly one statement, found {}",
                statements.len()
            )));
        }

        // A bare `Query` is not enough: VALUES lists and set operations
        // also parse as queries.
        let is_select = matches!(
            &statements[0],
            sqlparser::ast::Statement::Query(query)
                if matches!(query.body.as_ref(), sqlparser::ast::SetExpr::Select(_))
        );
        if !is_select {
            return Err(AgentError::Validation(
                "Only SELECT statements are allowed".to_string(),
            ));
        }

        let sql_upper = sql.to_uppercase();
        let schema_named = self
            .config
            .allowed_schemas
            .iter()
            .any(|s| sql_upper.contains(&s.to_uppercase()));
        if !schema_named {
            // Unqualified table references are assumed to hit the default
            // schema; flagged here so audits can tighten this later.
            debug!("Generated SQL names no allowed schema explicitly");
        }

        info!("SQL validation passed");
        Ok(())
    }

    /// Strip null bytes, collapse whitespace runs, and truncate to the
    /// configured maximum length. Pure function.
    pub fn sanitize(&self, text: &str) -> String {
        let without_nulls: String = text.chars().filter(|c| *c != '\0').collect();
        let collapsed = without_nulls.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.chars().take(self.config.max_query_length).collect()
    }
}

/// Sliding 60-second-window rate limiter.
///
/// The event list is the only state mutated by every request, so it sits
/// behind a single mutex shared by all orchestrator instances.
pub struct RateLimiter {
    max_calls_per_minute: usize,
    calls: Mutex<Vec<(String, Instant)>>,
}

const WINDOW: Duration = Duration::from_secs(60);

impl RateLimiter {
    pub fn new(max_calls_per_minute: usize) -> Self {
        Self {
            max_calls_per_minute,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Check whether `identity` is within its per-minute budget, recording
    /// the call if allowed.
    pub fn check(&self, identity: &str) -> Result<()> {
        self.check_at(identity, Instant::now())
    }

    /// Same as `check` with an explicit clock, so tests can simulate time.
    pub fn check_at(&self, identity: &str, now: Instant) -> Result<()> {
        let mut calls = self
            .calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        calls.retain(|(_, at)| now.duration_since(*at) < WINDOW);

        let recent = calls.iter().filter(|(id, _)| id == identity).count();
        if recent >= self.max_calls_per_minute {
            warn!("Rate limit exceeded for identity {}", identity);
            return Err(AgentError::RateLimit(format!(
                "Rate limit exceeded. Maximum {} calls per minute.",
                self.max_calls_per_minute
            )));
        }

        calls.push((identity.to_string(), now));
        Ok(())
    }
}
