//! Database connection management using sqlx
//!
//! Every call opens its own connection and closes it before returning.
//! There is deliberately no pool shared between requests.

use crate::db::postgres::PgIntrospector;
use crate::db::{value, ResultSet, SqlRunner};
use crate::error::{AskDbError, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PgDatabase {
    options: PgConnectOptions,
    connect_timeout: Duration,
}

impl PgDatabase {
    pub fn new(database_url: &str, connect_timeout: Duration) -> Result<Self> {
        let options = PgConnectOptions::from_str(database_url)
            .map_err(|e| AskDbError::Config(format!("invalid DATABASE_URL: {}", e)))?
            .application_name("askdb")
            .disable_statement_logging();

        Ok(Self {
            options,
            connect_timeout,
        })
    }

    /// Open a fresh connection, bounded by the configured connect timeout.
    ///
    /// Errors are returned as plain engine text so each caller can wrap them
    /// in the condition that fits its stage.
    pub async fn connect(&self) -> std::result::Result<PgConnection, String> {
        match tokio::time::timeout(self.connect_timeout, self.options.connect()).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(value::engine_message(&e)),
            Err(_) => Err(format!(
                "connection timed out after {}s",
                self.connect_timeout.as_secs()
            )),
        }
    }

    /// Connection-scoped introspector for building the schema catalog.
    pub async fn introspector(&self) -> Result<PgIntrospector> {
        let conn = self.connect().await.map_err(AskDbError::SchemaUnavailable)?;
        Ok(PgIntrospector::new(conn))
    }
}

#[async_trait]
impl SqlRunner for PgDatabase {
    async fn run(&self, sql: &str) -> Result<ResultSet> {
        let mut conn = self.connect().await.map_err(AskDbError::ExecutionFailed)?;

        let fetched = sqlx::query(sql).fetch_all(&mut conn).await;

        // Closed on both paths; the query outcome is what the caller sees.
        if let Err(e) = conn.close().await {
            warn!("Failed to close database connection cleanly: {}", e);
        }

        let rows = fetched.map_err(|e| AskDbError::ExecutionFailed(value::engine_message(&e)))?;
        debug!("Fetched {} rows", rows.len());

        rows.iter().map(value::row_to_json).collect()
    }
}
