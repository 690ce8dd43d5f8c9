//! Database capabilities for PostgreSQL
//!
//! The pipeline only talks to the database through the two traits below;
//! `postgres` holds the sqlx-backed implementations.

pub mod connection;
pub mod postgres;
pub mod value;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use connection::PgDatabase;
pub use postgres::PgIntrospector;

/// One result row, keyed by column name in the order the engine returned them.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Rows in engine order.
pub type ResultSet = Vec<Row>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Read-only schema introspection.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    async fn list_tables(&self) -> Result<Vec<String>>;

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnDef>>;

    /// Release whatever the introspector holds once the catalog is built.
    async fn close(&self) {}
}

/// Executes a single SQL statement and returns its rows.
#[async_trait]
pub trait SqlRunner: Send + Sync {
    async fn run(&self, sql: &str) -> Result<ResultSet>;

    /// Round trip used by the health check.
    async fn ping(&self) -> Result<()> {
        self.run("SELECT 1").await.map(|_| ())
    }
}
