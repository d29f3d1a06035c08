//! LLM Collaborator
//!
//! Optional Mistral-backed SQL generation and insight writing. Every caller
//! must treat failures or empty replies as "use the rule-based path"; nothing
//! here is load-bearing for correctness.

use crate::backend::Row;
use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Opaque LLM collaborator. Both operations are best-effort.
pub trait LlmCollaborator {
    /// Generate SQL for the request, or `None` when the model produced
    /// nothing usable.
    fn generate_sql(
        &self,
        query: &str,
        schema_summary: &str,
        context: Option<&str>,
    ) -> Result<Option<String>>;

    /// Write insights over the executed query and its rows.
    fn generate_insights(
        &self,
        query: &str,
        sql: Option<&str>,
        rows: Option<&[Row]>,
        context: Option<&str>,
    ) -> Result<String>;
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Mistral chat-completions client over blocking HTTP.
pub struct MistralClient {
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    client: reqwest::blocking::Client,
}

impl MistralClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: "https://api.mistral.ai".to_string(),
            max_tokens: 2000,
            client: reqwest::blocking::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn chat(&self, system: &str, user: &str, temperature: f64) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| AgentError::Llm(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AgentError::Llm(format!(
                "API returned status {}",
                response.status()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| AgentError::Llm(format!("Failed to parse response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AgentError::Llm("Empty completion".to_string()))
    }
}

impl LlmCollaborator for MistralClient {
    fn generate_sql(
        &self,
        query: &str,
        schema_summary: &str,
        context: Option<&str>,
    ) -> Result<Option<String>> {
        let prompt = format!(
            "Generate a SQL query for this request.\n\n\
             Request: {}\n\n\
             Available schema:\n{}\n\n\
             Context:\n{}\n\n\
             Return only the SQL query, no explanations.",
            query,
            schema_summary,
            context.unwrap_or("None"),
        );

        let reply = self.chat(
            "You are an expert SQL query generator. Generate only valid SELECT \
             queries without explanations.",
            &prompt,
            0.1,
        )?;

        let sql = strip_code_fences(&reply);
        if sql.is_empty() {
            warn!("LLM returned an empty SQL reply");
            return Ok(None);
        }
        info!("LLM generated SQL: {}", sql);
        Ok(Some(sql))
    }

    fn generate_insights(
        &self,
        query: &str,
        sql: Option<&str>,
        rows: Option<&[Row]>,
        context: Option<&str>,
    ) -> Result<String> {
        // Cap the serialized sample so large result sets stay out of the
        // prompt.
        let sample = rows
            .map(|r| {
                let sample: Vec<&Row> = r.iter().take(10).collect();
                serde_json::to_string(&sample).unwrap_or_default()
            })
            .unwrap_or_else(|| "None".to_string());

        let prompt = format!(
            "Summarize what this data says, focused on the user's question.\n\n\
             Question: {}\n\nSQL: {}\n\nResults (sample): {}\n\nContext:\n{}",
            query,
            sql.unwrap_or("None"),
            sample,
            context.unwrap_or("None"),
        );

        let reply = self.chat(
            "You are a business intelligence analyst. Provide clear, actionable \
             insights from data.",
            &prompt,
            0.3,
        )?;
        Ok(reply.trim().to_string())
    }
}

/// Strip markdown code fences from a model reply.
fn strip_code_fences(reply: &str) -> String {
    let trimmed = reply.trim();
    if let Some(rest) = trimmed
        .strip_prefix("```sql")
        .or_else(|| trimmed.strip_prefix("```"))
    {
        rest.trim_start()
            .trim_end_matches("```")
            .trim()
            .to_string()
    } else {
        trimmed.to_string()
    }
}
