//! Natural-language to SQL generation
//!
//! One deterministic completion call, followed by sanitization of the raw
//! model text into a single bare statement. The SQL is not parsed or checked
//! against the catalog here; execution is what validates it.

use crate::error::{AskDbError, Result};
use crate::llm::{CompletionRequest, TextGenerator};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub const GENERATION_TEMPERATURE: f32 = 0.0;
pub const GENERATION_MAX_TOKENS: u32 = 500;

const FENCE: &str = "```";
const LANGUAGE_TAG: &str = "sql";

/// A question paired with the grounding context it is answered against.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub question: &'a str,
    pub context: &'a str,
}

impl GenerationRequest<'_> {
    pub fn to_completion(&self) -> CompletionRequest {
        CompletionRequest {
            system: self.context.to_string(),
            user: self.question.to_string(),
            temperature: GENERATION_TEMPERATURE,
            max_tokens: GENERATION_MAX_TOKENS,
        }
    }
}

/// Sanitized SQL: no fences, no language tag, no trailing terminator, one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuery(String);

impl GeneratedQuery {
    /// Sanitize raw model output and check it is a single non-empty statement.
    pub fn from_raw(raw: &str) -> Result<Self> {
        let sql = sanitize_sql(raw);
        if sql.is_empty() {
            return Err(AskDbError::GenerationFailed(
                "model returned no SQL".to_string(),
            ));
        }
        if has_multiple_statements(&sql) {
            return Err(AskDbError::GenerationFailed(format!(
                "model returned multiple statements: {}",
                sql
            )));
        }
        Ok(Self(sql))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for GeneratedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GeneratedQuery {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub struct QueryGenerator {
    llm: Arc<dyn TextGenerator>,
}

impl QueryGenerator {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    pub async fn generate(&self, question: &str, context: &str) -> Result<GeneratedQuery> {
        let request = GenerationRequest { question, context };

        let raw = self
            .llm
            .complete(&request.to_completion())
            .await
            .map_err(|e| match e {
                AskDbError::GenerationFailed(msg) => AskDbError::GenerationFailed(msg),
                other => AskDbError::GenerationFailed(other.to_string()),
            })?;
        debug!("Raw SQL from LLM: {}", raw);

        let query = GeneratedQuery::from_raw(&raw)?;
        debug!("Cleaned SQL: {}", query);
        Ok(query)
    }
}

/// Reduce raw model text to a bare statement.
///
/// Steps, in order: trim; unwrap one fenced block; drop a leading `sql`
/// language tag; strip trailing terminators.
pub fn sanitize_sql(raw: &str) -> String {
    let mut sql = raw.trim();

    if sql.starts_with(FENCE) {
        sql = match sql.split_once('\n') {
            Some((_, rest)) => rest,
            None => &sql[FENCE.len()..],
        };
        if let Some(end) = sql.rfind(FENCE) {
            sql = &sql[..end];
        }
        sql = sql.trim();
    }

    if starts_with_language_tag(sql) {
        sql = sql[LANGUAGE_TAG.len()..].trim();
    }

    sql.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .to_string()
}

fn starts_with_language_tag(sql: &str) -> bool {
    let Some(prefix) = sql.get(..LANGUAGE_TAG.len()) else {
        return false;
    };
    if !prefix.eq_ignore_ascii_case(LANGUAGE_TAG) {
        return false;
    }
    // `sql_table` or `sqlite_master` are identifiers, not a tag.
    match sql[LANGUAGE_TAG.len()..].chars().next() {
        None => true,
        Some(c) => !(c.is_alphanumeric() || c == '_'),
    }
}

/// True when a statement separator is followed by anything but whitespace or comments.
///
/// Input the tokenizer cannot handle is let through; the database will
/// reject it at execution if it is malformed.
pub fn has_multiple_statements(sql: &str) -> bool {
    let dialect = PostgreSqlDialect {};
    let tokens = match Tokenizer::new(&dialect, sql).tokenize() {
        Ok(tokens) => tokens,
        Err(_) => return false,
    };

    let mut after_separator = false;
    for token in tokens {
        match token {
            Token::Whitespace(_) | Token::EOF => {}
            Token::SemiColon => after_separator = true,
            _ if after_separator => return true,
            _ => {}
        }
    }
    false
}
