use crate::db::{ResultSet, SqlRunner};
use crate::error::{AskDbError, Result};
use crate::generator::GeneratedQuery;
use std::sync::Arc;
use tracing::{debug, info};

/// Runs generated statements, one connection per call.
pub struct QueryExecutor {
    runner: Arc<dyn SqlRunner>,
}

impl QueryExecutor {
    pub fn new(runner: Arc<dyn SqlRunner>) -> Self {
        Self { runner }
    }

    /// Execute exactly the given statement. Rows come back in engine order,
    /// untouched beyond the driver's own decoding.
    pub async fn execute(&self, query: &GeneratedQuery) -> Result<ResultSet> {
        debug!("Executing query: {}", query);
        let rows = self.runner.run(query.as_str()).await.map_err(|e| match e {
            AskDbError::ExecutionFailed(msg) => AskDbError::ExecutionFailed(msg),
            other => AskDbError::ExecutionFailed(other.to_string()),
        })?;
        info!("Query returned {} rows", rows.len());
        Ok(rows)
    }

    /// Whether the database can be reached right now.
    pub async fn ping(&self) -> Result<()> {
        self.runner.ping().await
    }
}
