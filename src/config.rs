//! Environment-driven configuration.
//!
//! Values are read from the process environment after `.env` has been loaded.

use crate::error::{AskDbError, Result};
use std::time::Duration;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Keys checked in order for the model API key.
const API_KEY_VARS: [&str; 3] = ["LLM_API_KEY", "GROQ_API_KEY", "OPENAI_API_KEY"];

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub connect_timeout: Duration,
    pub bind_addr: String,
}

impl AppConfig {
    /// Load configuration, reading `.env` first if present.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = non_empty("DATABASE_URL")
            .ok_or_else(|| AskDbError::Config("DATABASE_URL environment variable not set".to_string()))?;

        let llm_api_key = API_KEY_VARS
            .iter()
            .find_map(|key| non_empty(*key))
            .ok_or_else(|| {
                AskDbError::Config(format!(
                    "no model API key set (checked {})",
                    API_KEY_VARS.join(", ")
                ))
            })?;

        let connect_timeout = match non_empty("DB_CONNECT_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                AskDbError::Config(format!("invalid DB_CONNECT_TIMEOUT_SECS '{}': {}", raw, e))
            })?,
            None => DEFAULT_CONNECT_TIMEOUT_SECS,
        };

        Ok(Self {
            database_url,
            llm_api_key,
            llm_base_url: non_empty("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            llm_model: non_empty("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            connect_timeout: Duration::from_secs(connect_timeout),
            bind_addr: non_empty("ASKDB_BIND").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }
}
