//! Insight Agent
//!
//! Orchestrates the request pipeline: security validation, rate limiting,
//! intent analysis, SQL generation (LLM-first with a guaranteed rule-based
//! fallback), gated execution with retry, and insight composition.

use crate::backend::{QueryBackend, Row};
use crate::context::ContextProvider;
use crate::error::Result;
use crate::execution_loop::retry::{AuditEntry, RetryExecutor};
use crate::insights::compose_insights;
use crate::intent::{IntentExtractor, QueryAnalysis, QueryType};
use crate::llm::LlmCollaborator;
use crate::schema::SchemaCatalog;
use crate::security::{RateLimiter, SecurityConfig, SecurityValidator};
use crate::sql_generator::SqlGenerator;
use tracing::{info, warn};
use uuid::Uuid;

const CONTEXT_TOP_K: usize = 3;
const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Structured response for one request. Exactly one of success+data,
/// clarification, or error is populated.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub request_id: Uuid,
    pub success: bool,
    pub query_type: QueryType,
    pub sql: Option<String>,
    pub rows: Option<Vec<Row>>,
    pub context: Option<String>,
    pub insights: String,
    pub clarification: Option<String>,
    pub error: Option<String>,
    /// Retry audit trail; empty unless execution was attempted.
    pub audit: Vec<AuditEntry>,
}

impl AgentResponse {
    fn error(request_id: Uuid, query_type: QueryType, message: String) -> Self {
        Self {
            request_id,
            success: false,
            query_type,
            sql: None,
            rows: None,
            context: None,
            insights: String::new(),
            clarification: None,
            error: Some(message),
            audit: Vec::new(),
        }
    }
}

/// End-to-end query orchestrator.
///
/// Owns the catalog, guards, and rule-based pipeline; the backend, context
/// provider, and LLM are collaborators behind narrow traits. The LLM and
/// context provider are optional and strictly best-effort.
pub struct InsightAgent {
    catalog: SchemaCatalog,
    validator: SecurityValidator,
    rate_limiter: RateLimiter,
    extractor: IntentExtractor,
    generator: SqlGenerator,
    retry: RetryExecutor,
    backend: Box<dyn QueryBackend>,
    context_provider: Option<Box<dyn ContextProvider>>,
    llm: Option<Box<dyn LlmCollaborator>>,
}

impl InsightAgent {
    pub fn new(
        catalog: SchemaCatalog,
        security_config: SecurityConfig,
        backend: Box<dyn QueryBackend>,
    ) -> Result<Self> {
        let rate_limiter = RateLimiter::new(security_config.rate_limit_per_minute);
        let validator = SecurityValidator::new(security_config)?;
        Ok(Self {
            catalog,
            validator,
            rate_limiter,
            extractor: IntentExtractor::new(),
            generator: SqlGenerator::new(),
            retry: RetryExecutor::new(DEFAULT_MAX_ATTEMPTS),
            backend,
            context_provider: None,
            llm: None,
        })
    }

    pub fn with_context_provider(mut self, provider: Box<dyn ContextProvider>) -> Self {
        self.context_provider = Some(provider);
        self
    }

    pub fn with_llm(mut self, llm: Box<dyn LlmCollaborator>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.retry = RetryExecutor::new(max_attempts);
        self
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// Process one request end-to-end.
    pub fn process_query(&self, text: &str, identity: &str) -> AgentResponse {
        let request_id = Uuid::new_v4();
        info!("Processing query {}: {}", request_id, text);

        // Step 1: input security. Nothing else runs on rejected input.
        if let Err(e) = self.validator.validate_input(text) {
            warn!("Security validation failed: {}", e);
            return AgentResponse::error(
                request_id,
                QueryType::Clarification,
                format!("Security validation failed: {}", e),
            );
        }

        // Step 2: rate limiting.
        if let Err(e) = self.rate_limiter.check(identity) {
            warn!("Rate limit exceeded for {}", identity);
            return AgentResponse::error(request_id, QueryType::Clarification, e.to_string());
        }

        // Step 3: analyze intent.
        let analysis = self.extractor.analyze(text, &self.catalog);

        // Step 4: clarification, listing what we do know about.
        if analysis.query_type == QueryType::Clarification {
            return AgentResponse {
                request_id,
                success: false,
                query_type: QueryType::Clarification,
                sql: None,
                rows: None,
                context: None,
                insights: String::new(),
                clarification: Some(self.clarification_message(&analysis)),
                error: None,
                audit: Vec::new(),
            };
        }

        // Step 5: context retrieval, best-effort.
        let context = if matches!(analysis.query_type, QueryType::ContextOnly | QueryType::Both) {
            self.fetch_context(text)
        } else {
            None
        };

        // Step 6: generate, gate, and execute SQL.
        let mut sql = None;
        let mut rows = None;
        let mut audit = Vec::new();
        if matches!(analysis.query_type, QueryType::SqlOnly | QueryType::Both) {
            let generated = match self.generate_safe_sql(text, &analysis, context.as_deref()) {
                Some(generated) => generated,
                None => {
                    return AgentResponse::error(
                        request_id,
                        analysis.query_type,
                        "Could not generate SQL for this request against the known schema"
                            .to_string(),
                    );
                }
            };

            if let Err(e) = self.validator.validate_generated_sql(&generated) {
                warn!("Generated SQL failed validation: {}", e);
                let mut response = AgentResponse::error(
                    request_id,
                    analysis.query_type,
                    format!("SQL validation failed: {}", e),
                );
                response.sql = Some(generated);
                return response;
            }

            let outcome =
                self.retry
                    .execute_with_retry(self.backend.as_ref(), &self.catalog, &generated);
            if !outcome.success {
                let mut response = AgentResponse::error(
                    request_id,
                    analysis.query_type,
                    "Query execution failed after exhausting corrections".to_string(),
                );
                response.sql = Some(outcome.final_sql);
                response.context = context;
                response.audit = outcome.audit;
                return response;
            }
            sql = Some(outcome.final_sql);
            rows = outcome.rows;
            audit = outcome.audit;
        }

        // Step 7: insights, LLM-first with the deterministic fallback.
        let insights = self.generate_insights(text, sql.as_deref(), rows.as_deref(), context.as_deref());

        AgentResponse {
            request_id,
            success: true,
            query_type: analysis.query_type,
            sql,
            rows,
            context,
            insights,
            clarification: None,
            error: None,
            audit,
        }
    }

    fn clarification_message(&self, analysis: &QueryAnalysis) -> String {
        if analysis
            .missing_information
            .iter()
            .any(|m| m == "table name")
        {
            return format!(
                "I need more information to process your query. Which table would \
                 you like to query? Available tables: {}",
                self.catalog.table_names().join(", ")
            );
        }
        format!(
            "I need more information: {}. Please provide additional details.",
            analysis.missing_information.join(", ")
        )
    }

    fn fetch_context(&self, text: &str) -> Option<String> {
        let provider = self.context_provider.as_ref()?;
        match provider.get_context(text, CONTEXT_TOP_K) {
            Ok(context) if !context.is_empty() => Some(context),
            Ok(_) => None,
            Err(e) => {
                // Context is advisory; a broken provider must not fail the
                // request.
                warn!("Context retrieval failed, continuing without: {}", e);
                None
            }
        }
    }

    /// LLM-generated SQL when a collaborator is configured and produces
    /// something, otherwise the rule-based intent path.
    fn generate_safe_sql(
        &self,
        text: &str,
        analysis: &QueryAnalysis,
        context: Option<&str>,
    ) -> Option<String> {
        if let Some(llm) = &self.llm {
            match llm.generate_sql(text, &self.catalog.schema_summary(), context) {
                Ok(Some(sql)) => {
                    info!("Generated SQL via LLM collaborator");
                    return Some(sql);
                }
                Ok(None) => {
                    warn!("LLM returned no SQL, falling back to rule-based generation");
                }
                Err(e) => {
                    warn!(
                        "LLM SQL generation failed, falling back to rule-based: {}",
                        e
                    );
                }
            }
        }

        let mut intent = self.extractor.extract(text, &self.catalog);
        // The analysis already resolved the target table.
        intent.table_name = analysis.target_tables.first().cloned();
        self.generator.generate(&self.catalog, &intent)
    }

    fn generate_insights(
        &self,
        text: &str,
        sql: Option<&str>,
        rows: Option<&[Row]>,
        context: Option<&str>,
    ) -> String {
        if let Some(llm) = &self.llm {
            match llm.generate_insights(text, sql, rows, context) {
                Ok(insights) => {
                    info!("Generated insights via LLM collaborator");
                    return insights;
                }
                Err(e) => {
                    warn!(
                        "LLM insights generation failed, falling back to rule-based: {}",
                        e
                    );
                }
            }
        }
        compose_insights(rows, context)
    }
}
