//! Request orchestration
//!
//! Composes the pipeline steps per request. The catalog and the grounding
//! context derived from it are fixed at construction; requests share them
//! read-only and may run concurrently.

use crate::catalog::SchemaCatalog;
use crate::db::{ResultSet, SqlRunner};
use crate::error::{AskDbError, Result};
use crate::executor::QueryExecutor;
use crate::generator::QueryGenerator;
use crate::llm::TextGenerator;
use crate::prompt::build_generation_context;
use crate::summary::SummaryGenerator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Result of the generate-and-run operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlOutcome {
    pub sql: String,
    pub data: ResultSet,
    pub row_count: usize,
}

/// Result of the chat operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub response: String,
    pub sql: String,
    pub data: ResultSet,
    pub row_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_tables: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_error: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

pub struct Orchestrator {
    catalog: Arc<SchemaCatalog>,
    context: String,
    generator: QueryGenerator,
    executor: QueryExecutor,
    summarizer: SummaryGenerator,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<SchemaCatalog>,
        llm: Arc<dyn TextGenerator>,
        runner: Arc<dyn SqlRunner>,
    ) -> Self {
        let context = build_generation_context(&catalog);
        Self {
            catalog,
            context,
            generator: QueryGenerator::new(llm.clone()),
            executor: QueryExecutor::new(runner),
            summarizer: SummaryGenerator::new(llm),
        }
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// Grounding context sent as the system instruction for generation.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Question -> SQL -> rows. Any failure aborts with that failure.
    pub async fn generate_sql(&self, question: &str) -> Result<SqlOutcome> {
        let question = require_text(question, "Question is required")?;
        info!("Generating SQL for: {}", question);

        let query = self.generator.generate(question, &self.context).await.map_err(log_failure)?;
        info!("Generated SQL: {}", query);

        let data = self.executor.execute(&query).await.map_err(log_failure)?;

        Ok(SqlOutcome {
            row_count: data.len(),
            sql: query.into_string(),
            data,
        })
    }

    /// Question -> SQL -> rows -> summary. Summary failures never abort.
    pub async fn chat(&self, message: &str) -> Result<ChatOutcome> {
        let message = require_text(message, "Message is required")?;
        info!("Chat received: {}", message);

        let query = self.generator.generate(message, &self.context).await.map_err(log_failure)?;
        info!("Generated SQL: {}", query);

        let data = self.executor.execute(&query).await.map_err(log_failure)?;

        let response = self.summarizer.summarize(message, &query, &data).await;
        info!("Chat response: {}", response);

        Ok(ChatOutcome {
            response,
            row_count: data.len(),
            sql: query.into_string(),
            data,
        })
    }

    /// Database reachability plus catalog status. Never calls the model.
    pub async fn health(&self) -> HealthReport {
        let schema_error = self.catalog.load_error().map(str::to_string);
        match self.executor.ping().await {
            Ok(()) => HealthReport {
                status: HealthStatus::Healthy,
                database: Some("connected".to_string()),
                schema_tables: Some(self.catalog.table_names()),
                error: None,
                schema_error,
            },
            Err(e) => HealthReport {
                status: HealthStatus::Unhealthy,
                database: None,
                schema_tables: None,
                error: Some(e.to_string()),
                schema_error,
            },
        }
    }
}

fn require_text<'a>(text: &'a str, message: &str) -> Result<&'a str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AskDbError::InvalidRequest(message.to_string()));
    }
    Ok(trimmed)
}

fn log_failure(e: AskDbError) -> AskDbError {
    error!("{}", e);
    e
}
