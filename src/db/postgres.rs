//! Schema introspection over `information_schema`.

use crate::db::{value, ColumnDef, SchemaIntrospector};
use crate::error::{AskDbError, Result};
use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Row};
use tokio::sync::Mutex;
use tracing::warn;

/// Holds one connection for the duration of a catalog build.
pub struct PgIntrospector {
    conn: Mutex<Option<PgConnection>>,
}

impl PgIntrospector {
    pub fn new(conn: PgConnection) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
        }
    }
}

fn closed() -> AskDbError {
    AskDbError::SchemaUnavailable("introspection connection already closed".to_string())
}

#[async_trait]
impl SchemaIntrospector for PgIntrospector {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(closed)?;
        let rows = sqlx::query(
            r#"
            SELECT table_name::text AS table_name
            FROM information_schema.tables
            WHERE table_schema = current_schema()
              AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            AskDbError::SchemaUnavailable(format!("Failed to list tables: {}", value::engine_message(&e)))
        })?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("table_name")
                    .map_err(|e| AskDbError::SchemaUnavailable(e.to_string()))
            })
            .collect()
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnDef>> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(closed)?;
        let rows = sqlx::query(
            r#"
            SELECT column_name::text AS column_name,
                   CASE WHEN data_type = 'USER-DEFINED' THEN udt_name::text
                        ELSE data_type::text
                   END AS data_type
            FROM information_schema.columns
            WHERE table_schema = current_schema()
              AND table_name = $1
            ORDER BY ordinal_position
            "#,
        )
        .bind(table)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            AskDbError::SchemaUnavailable(format!(
                "Failed to list columns for table '{}': {}",
                table,
                value::engine_message(&e)
            ))
        })?;

        rows.iter()
            .map(|row| {
                let name: String = row
                    .try_get("column_name")
                    .map_err(|e| AskDbError::SchemaUnavailable(e.to_string()))?;
                let data_type: String = row
                    .try_get("data_type")
                    .map_err(|e| AskDbError::SchemaUnavailable(e.to_string()))?;
                Ok(ColumnDef { name, data_type })
            })
            .collect()
    }

    async fn close(&self) {
        if let Some(conn) = self.conn.lock().await.take() {
            if let Err(e) = conn.close().await {
                warn!("Failed to close introspection connection cleanly: {}", e);
            }
        }
    }
}
