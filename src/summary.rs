//! Natural-language narration of a result set.
//!
//! The only step in the pipeline that absorbs its own failures: a query that
//! ran is reported even when the narration could not be produced.

use crate::db::Row;
use crate::error::{AskDbError, Result};
use crate::generator::GeneratedQuery;
use crate::llm::{CompletionRequest, TextGenerator};
use crate::prompt::{build_summary_prompt, SUMMARY_SYSTEM_PROMPT};
use std::sync::Arc;
use tracing::warn;

pub const SUMMARY_TEMPERATURE: f32 = 0.7;
pub const SUMMARY_MAX_TOKENS: u32 = 300;
pub const FALLBACK_SUMMARY: &str = "Query executed successfully.";

pub struct SummaryGenerator {
    llm: Arc<dyn TextGenerator>,
}

impl SummaryGenerator {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    /// Always yields a usable summary; falls back to [`FALLBACK_SUMMARY`].
    pub async fn summarize(&self, question: &str, query: &GeneratedQuery, rows: &[Row]) -> String {
        match self.try_summarize(question, query, rows).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("{}", e);
                FALLBACK_SUMMARY.to_string()
            }
        }
    }

    async fn try_summarize(&self, question: &str, query: &GeneratedQuery, rows: &[Row]) -> Result<String> {
        let request = CompletionRequest {
            system: SUMMARY_SYSTEM_PROMPT.to_string(),
            user: build_summary_prompt(question, query.as_str(), rows),
            temperature: SUMMARY_TEMPERATURE,
            max_tokens: SUMMARY_MAX_TOKENS,
        };

        let text = self
            .llm
            .complete(&request)
            .await
            .map_err(|e| AskDbError::SummarizationFailed(e.to_string()))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(AskDbError::SummarizationFailed("empty response".to_string()));
        }
        Ok(text.to_string())
    }
}
