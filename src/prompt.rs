//! Prompt construction for the generation and summary calls.

use crate::catalog::SchemaCatalog;
use crate::db::Row;

/// Rows passed to the summary prompt.
pub const SUMMARY_ROW_LIMIT: usize = 5;

pub const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a helpful data analyst. Provide clear, concise summaries of database query results.";

/// System instruction grounding the model in the catalog.
///
/// The user's question is never part of this text; it is sent as a separate
/// user message.
pub fn build_generation_context(catalog: &SchemaCatalog) -> String {
    let mut schema = String::new();
    if let Some(err) = catalog.load_error() {
        schema.push_str(&format!("Error loading schema: {}\n", err));
    }
    schema.push_str(&catalog.render());

    format!(
        r#"You are a PostgreSQL expert. Your ONLY job is to generate a single, valid SQL query.

Database Schema:
{}

CRITICAL RULES:
1. Wrap all table names in double quotes using the exact case shown above (e.g., "Invoice").
2. Wrap all column names in double quotes using the exact case shown above (e.g., "invoice_total").
3. Use only the tables and columns listed in the schema.
4. Return ONLY one SQL query with no explanations, text, or markdown code fences.
"#,
        schema
    )
}

pub fn build_summary_prompt(question: &str, sql: &str, rows: &[Row]) -> String {
    let data = if rows.is_empty() {
        "No results".to_string()
    } else {
        let sample = &rows[..rows.len().min(SUMMARY_ROW_LIMIT)];
        serde_json::to_string(sample).unwrap_or_else(|_| "No results".to_string())
    };

    format!(
        r#"Question: {}
SQL Query: {}
Query Results (first {} rows): {}

Provide a brief, natural language summary of these results."#,
        question, sql, SUMMARY_ROW_LIMIT, data
    )
}
