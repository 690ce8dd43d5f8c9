pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod generator;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod server;
pub mod summary;

pub use catalog::SchemaCatalog;
pub use error::{AskDbError, Result};
pub use orchestrator::{ChatOutcome, HealthReport, Orchestrator, SqlOutcome};
