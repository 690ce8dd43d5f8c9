//! Schema catalog
//!
//! Structural model of the database, introspected once at startup and
//! read-only afterwards. The catalog is handed to the prompt builder and the
//! orchestrator explicitly; there is no global copy.

use crate::db::{ColumnDef, SchemaIntrospector};
use crate::error::{AskDbError, Result};
use indexmap::IndexMap;
use itertools::Itertools;
use tracing::{error, info, warn};

/// Rendered in place of a table listing when the catalog has no tables.
pub const NO_TABLES_SENTINEL: &str = "No tables found. Please check your database.";

/// Column name -> declared type, in ordinal order.
pub type ColumnMap = IndexMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaCatalog {
    tables: IndexMap<String, ColumnMap>,
    load_error: Option<String>,
}

impl SchemaCatalog {
    /// Introspect every table and its columns.
    ///
    /// A failure on any single table fails the whole build so that a partial
    /// catalog is never mistaken for the real schema.
    pub async fn build(introspector: &dyn SchemaIntrospector) -> Result<Self> {
        let table_names = introspector.list_tables().await?;
        info!("Found tables: {:?}", table_names);

        let mut tables = IndexMap::with_capacity(table_names.len());
        for table in table_names {
            let columns = introspector.list_columns(&table).await.map_err(|e| match e {
                AskDbError::SchemaUnavailable(msg) => AskDbError::SchemaUnavailable(msg),
                other => AskDbError::SchemaUnavailable(format!("table '{}': {}", table, other)),
            })?;
            tables.insert(table, columns_to_map(columns));
        }

        if tables.is_empty() {
            warn!("No tables found in database");
        }

        Ok(Self {
            tables,
            load_error: None,
        })
    }

    /// Startup entry point: build from the introspector, or degrade to an
    /// empty catalog carrying the error so the service can still start.
    pub async fn build_or_degrade<I: SchemaIntrospector>(introspector: Result<I>) -> Self {
        let built = match introspector {
            Ok(introspector) => {
                let built = Self::build(&introspector).await;
                introspector.close().await;
                built
            }
            Err(e) => Err(e),
        };

        match built {
            Ok(catalog) => {
                info!("Schema extracted successfully, total tables: {}", catalog.len());
                catalog
            }
            Err(e) => {
                error!("Failed to extract schema: {}", e);
                Self::unavailable(e.to_string())
            }
        }
    }

    /// Build from already-known tables, in the given order.
    pub fn from_tables<T, C>(tables: T) -> Self
    where
        T: IntoIterator<Item = (String, C)>,
        C: IntoIterator<Item = ColumnDef>,
    {
        Self {
            tables: tables
                .into_iter()
                .map(|(name, columns)| (name, columns_to_map(columns)))
                .collect(),
            load_error: None,
        }
    }

    /// Empty catalog recording why introspection could not run.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            tables: IndexMap::new(),
            load_error: Some(reason.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn columns(&self, table: &str) -> Option<&ColumnMap> {
        self.tables.get(table)
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Flat text listing, one block per table in catalog order.
    pub fn render(&self) -> String {
        if self.tables.is_empty() {
            return NO_TABLES_SENTINEL.to_string();
        }

        self.tables
            .iter()
            .map(|(table, columns)| {
                let cols = columns
                    .iter()
                    .map(|(name, data_type)| format!("{} ({})", name, data_type))
                    .join(", ");
                format!("Table: {}\n  Columns: {}", table, cols)
            })
            .join("\n")
    }
}

fn columns_to_map<C: IntoIterator<Item = ColumnDef>>(columns: C) -> ColumnMap {
    columns
        .into_iter()
        .map(|c| (c.name, c.data_type))
        .collect()
}
