use askdb::catalog::NO_TABLES_SENTINEL;
use askdb::db::{ColumnDef, ResultSet, Row, SqlRunner};
use askdb::llm::{CompletionRequest, TextGenerator};
use askdb::orchestrator::HealthStatus;
use askdb::summary::FALLBACK_SUMMARY;
use askdb::{AskDbError, Orchestrator, Result, SchemaCatalog};
use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Replies to generation calls with a fixed text and fails or answers summary calls.
struct FakeModel {
    sql_reply: String,
    summary_reply: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeModel {
    fn new(sql_reply: &str, summary_reply: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            sql_reply: sql_reply.to_string(),
            summary_reply: summary_reply.map(str::to_string),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FakeModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        if request.temperature == 0.0 {
            return Ok(self.sql_reply.clone());
        }
        self.summary_reply
            .clone()
            .ok_or_else(|| AskDbError::GenerationFailed("upstream 500".to_string()))
    }
}

/// Answers any statement with the invoice rows, rejects anything mentioning `SELEC `.
struct FakeDatabase {
    reachable: bool,
    executed: Mutex<Vec<String>>,
}

impl FakeDatabase {
    fn new(reachable: bool) -> Arc<Self> {
        Arc::new(Self {
            reachable,
            executed: Mutex::new(Vec::new()),
        })
    }
}

fn invoice_row(id: i64, total: f64) -> Row {
    match json!({"id": id, "vendor": "Acme", "invoice_total": total}) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    }
}

#[async_trait]
impl SqlRunner for FakeDatabase {
    async fn run(&self, sql: &str) -> Result<ResultSet> {
        if !self.reachable {
            return Err(AskDbError::ExecutionFailed(
                "connection to server at \"localhost\", port 5432 failed".to_string(),
            ));
        }
        self.executed.lock().unwrap().push(sql.to_string());
        if sql.contains("SELEC ") {
            return Err(AskDbError::ExecutionFailed(
                "syntax error at or near \"SELEC\"".to_string(),
            ));
        }
        Ok((1..=7).map(|i| invoice_row(i, i as f64 * 100.0)).collect())
    }
}

fn invoice_catalog() -> Arc<SchemaCatalog> {
    Arc::new(SchemaCatalog::from_tables(vec![
        (
            "Invoice".to_string(),
            vec![
                ColumnDef::new("id", "integer"),
                ColumnDef::new("vendor", "text"),
                ColumnDef::new("invoice_total", "numeric"),
            ],
        ),
        (
            "Vendor".to_string(),
            vec![ColumnDef::new("name", "text")],
        ),
    ]))
}

#[tokio::test]
async fn generate_sql_strips_fences_and_terminator() {
    let model = FakeModel::new("```sql\nSELECT * FROM \"Invoice\";\n```", None);
    let db = FakeDatabase::new(true);
    let orch = Orchestrator::new(invoice_catalog(), model.clone(), db.clone());

    let outcome = orch.generate_sql("show all invoices").await.unwrap();

    assert_eq!(outcome.sql, "SELECT * FROM \"Invoice\"");
    assert!(!outcome.sql.contains("```"));
    assert!(!outcome.sql.ends_with(';'));
    assert_eq!(outcome.row_count, 7);
    assert_eq!(outcome.data.len(), 7);
    assert_eq!(*db.executed.lock().unwrap(), vec!["SELECT * FROM \"Invoice\"".to_string()]);

    let requests = model.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].system.contains("Table: Invoice"));
    assert!(!requests[0].system.contains("show all invoices"));
    assert_eq!(requests[0].user, "show all invoices");
}

#[tokio::test]
async fn generate_sql_is_repeatable_for_same_question() {
    let model = FakeModel::new("SELECT SUM(\"invoice_total\") FROM \"Invoice\";", None);
    let orch = Orchestrator::new(invoice_catalog(), model.clone(), FakeDatabase::new(true));

    let first = orch.generate_sql("total spend").await.unwrap();
    let second = orch.generate_sql("total spend").await.unwrap();

    assert_eq!(first.sql, second.sql);
    let requests = model.requests();
    assert_eq!(requests[0], requests[1]);
    assert!(requests.iter().all(|r| r.temperature == 0.0));
}

#[tokio::test]
async fn invalid_sql_fails_with_execution_error() {
    let model = FakeModel::new("SELEC * FROM \"Invoice\"", Some("unused"));
    let orch = Orchestrator::new(invoice_catalog(), model.clone(), FakeDatabase::new(true));

    let err = orch.generate_sql("broken").await.unwrap_err();
    assert!(matches!(err, AskDbError::ExecutionFailed(ref msg) if msg.contains("SELEC")));

    let err = orch.chat("broken").await.unwrap_err();
    assert!(matches!(err, AskDbError::ExecutionFailed(_)));
    // Execution failed, so no summary call was made.
    assert!(model.requests().iter().all(|r| r.temperature == 0.0));
}

#[tokio::test]
async fn multi_statement_output_is_rejected_before_execution() {
    let model = FakeModel::new("SELECT 1; DROP TABLE \"Invoice\";", None);
    let db = FakeDatabase::new(true);
    let orch = Orchestrator::new(invoice_catalog(), model, db.clone());

    let err = orch.generate_sql("anything").await.unwrap_err();
    assert!(matches!(err, AskDbError::GenerationFailed(_)));
    assert!(db.executed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn chat_survives_summary_failure() {
    let model = FakeModel::new("SELECT * FROM \"Invoice\"", None);
    let orch = Orchestrator::new(invoice_catalog(), model, FakeDatabase::new(true));

    let outcome = orch.chat("list invoices").await.unwrap();

    assert_eq!(outcome.response, FALLBACK_SUMMARY);
    assert_eq!(outcome.sql, "SELECT * FROM \"Invoice\"");
    assert_eq!(outcome.row_count, 7);
}

#[tokio::test]
async fn chat_summary_sees_only_first_five_rows() {
    let model = FakeModel::new("SELECT * FROM \"Invoice\"", Some("Seven invoices from Acme."));
    let orch = Orchestrator::new(invoice_catalog(), model.clone(), FakeDatabase::new(true));

    let outcome = orch.chat("list invoices").await.unwrap();
    assert_eq!(outcome.response, "Seven invoices from Acme.");
    assert_eq!(outcome.data.len(), 7);

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    let summary_prompt = &requests[1].user;
    assert!(summary_prompt.contains("\"id\":5"));
    assert!(!summary_prompt.contains("\"id\":6"));
}

#[tokio::test]
async fn empty_catalog_grounds_with_sentinel() {
    let model = FakeModel::new("SELECT 1", None);
    let orch = Orchestrator::new(Arc::new(SchemaCatalog::default()), model.clone(), FakeDatabase::new(true));

    assert!(orch.context().contains(NO_TABLES_SENTINEL));
    orch.generate_sql("anything").await.unwrap();
    assert!(model.requests()[0].system.contains(NO_TABLES_SENTINEL));
}

#[tokio::test]
async fn health_reports_tables_when_reachable() {
    let orch = Orchestrator::new(invoice_catalog(), FakeModel::new("", None), FakeDatabase::new(true));
    let report = orch.health().await;

    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.database.as_deref(), Some("connected"));
    assert_eq!(
        report.schema_tables,
        Some(vec!["Invoice".to_string(), "Vendor".to_string()])
    );
}

#[tokio::test]
async fn health_reports_unhealthy_when_unreachable() {
    let model = FakeModel::new("", None);
    let catalog = Arc::new(SchemaCatalog::unavailable("Schema unavailable: connection refused"));
    let orch = Orchestrator::new(catalog, model.clone(), FakeDatabase::new(false));

    let report = orch.health().await;
    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert!(report.error.unwrap().contains("5432"));
    assert_eq!(report.schema_error.as_deref(), Some("Schema unavailable: connection refused"));
    assert!(model.requests().is_empty());

    let serialized = serde_json::to_value(orch.health().await).unwrap();
    assert_eq!(serialized["status"], "unhealthy");
}
