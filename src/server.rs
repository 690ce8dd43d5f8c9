//! Minimal HTTP/1.1 front end
//!
//! Plain tokio sockets; one task per connection, one request per connection.

use crate::error::{AskDbError, Result};
use crate::orchestrator::Orchestrator;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

const READ_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_REQUEST_BYTES: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    fn json(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, json!({ "error": message.into() }))
    }

    fn from_failure(err: &AskDbError) -> Self {
        let status = if err.is_client_error() { 400 } else { 500 };
        let message = match err {
            AskDbError::InvalidRequest(msg) => msg.clone(),
            other => other.to_string(),
        };
        Self::error(status, message)
    }

    pub fn to_http_string(&self) -> String {
        let body = self.body.to_string();
        format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n\
             {}",
            self.status,
            status_text(self.status),
            body.len(),
            body
        )
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "Internal Server Error",
    }
}

#[derive(Debug, Default, Deserialize)]
struct QuestionBody {
    question: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageBody {
    message: Option<String>,
}

pub async fn serve(bind_addr: &str, orchestrator: Arc<Orchestrator>) -> Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!("Server listening on {}", bind_addr);

    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                continue;
            }
        };
        debug!("New connection from: {}", addr);
        tokio::spawn(handle_connection(stream, orchestrator.clone()));
    }
}

async fn handle_connection(mut stream: TcpStream, orchestrator: Arc<Orchestrator>) {
    let request = match timeout(READ_TIMEOUT, read_request(&mut stream)).await {
        Ok(Ok(request)) => request,
        Ok(Err(e)) => {
            warn!("Failed to read request: {}", e);
            return;
        }
        Err(_) => {
            warn!("Request read timeout");
            return;
        }
    };
    if request.is_empty() {
        return;
    }

    let response = handle_raw_request(&request, &orchestrator).await;
    if let Err(e) = stream.write_all(response.to_http_string().as_bytes()).await {
        error!("Failed to write response: {}", e);
    }
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);

        if let Some(headers_end) = find_headers_end(&buffer) {
            let head = String::from_utf8_lossy(&buffer[..headers_end]);
            let content_length = extract_content_length(&head).unwrap_or(0);
            if buffer.len() >= headers_end + content_length {
                break;
            }
        }
        if buffer.len() > MAX_REQUEST_BYTES {
            break;
        }
    }

    Ok(buffer)
}

fn find_headers_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
}

fn extract_content_length(head: &str) -> Option<usize> {
    head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

/// Dispatch request bytes as read off the socket.
pub async fn handle_raw_request(request: &[u8], orchestrator: &Orchestrator) -> HttpResponse {
    match std::str::from_utf8(request) {
        Ok(request) => handle_request(request, orchestrator).await,
        Err(e) => {
            warn!("Request is not valid UTF-8: {}", e);
            HttpResponse::error(400, "Request is not valid UTF-8")
        }
    }
}

/// Parse a raw request and dispatch it.
pub async fn handle_request(request: &str, orchestrator: &Orchestrator) -> HttpResponse {
    let Some(request_line) = request.lines().next() else {
        return HttpResponse::error(400, "Bad Request");
    };
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return HttpResponse::error(400, "Bad Request");
    };

    let path = target.split('?').next().unwrap_or("/");
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    let body = request
        .split_once("\r\n\r\n")
        .map(|(_, body)| body)
        .unwrap_or("");

    info!("Request: {} {}", method, path);
    route(method, path, body, orchestrator).await
}

pub async fn route(method: &str, path: &str, body: &str, orchestrator: &Orchestrator) -> HttpResponse {
    match (method, path) {
        ("GET", "/") => HttpResponse::json(
            200,
            json!({ "message": "askdb server is running", "status": "ok" }),
        ),
        ("GET", "/health") => {
            let report = orchestrator.health().await;
            let status = if report.is_healthy() { 200 } else { 500 };
            match serde_json::to_value(&report) {
                Ok(body) => HttpResponse::json(status, body),
                Err(e) => HttpResponse::error(500, e.to_string()),
            }
        }
        ("POST", "/generate_sql") => {
            let parsed: QuestionBody = match parse_body(body) {
                Ok(parsed) => parsed,
                Err(response) => return response,
            };
            let Some(question) = parsed.question else {
                return HttpResponse::error(400, "Question is required");
            };
            respond(orchestrator.generate_sql(&question).await)
        }
        ("POST", "/chat") => {
            let parsed: MessageBody = match parse_body(body) {
                Ok(parsed) => parsed,
                Err(response) => return response,
            };
            let Some(message) = parsed.message else {
                return HttpResponse::error(400, "Message is required");
            };
            respond(orchestrator.chat(&message).await)
        }
        (_, "/" | "/health" | "/generate_sql" | "/chat") => {
            HttpResponse::error(405, "Method not allowed")
        }
        _ => HttpResponse::error(404, "Not found"),
    }
}

fn parse_body<T>(body: &str) -> std::result::Result<T, HttpResponse>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if body.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(body).map_err(|e| HttpResponse::error(400, format!("Invalid JSON body: {}", e)))
}

fn respond<T: serde::Serialize>(outcome: Result<T>) -> HttpResponse {
    match outcome.and_then(|value| serde_json::to_value(value).map_err(AskDbError::from)) {
        Ok(body) => HttpResponse::json(200, body),
        Err(e) => HttpResponse::from_failure(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SchemaCatalog;
    use crate::db::{ColumnDef, ResultSet, SqlRunner};
    use crate::llm::{CompletionRequest, TextGenerator};
    use async_trait::async_trait;

    struct FixedLlm;

    #[async_trait]
    impl TextGenerator for FixedLlm {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            Ok("SELECT \"total\" FROM \"Invoice\"".to_string())
        }
    }

    struct DownDatabase;

    #[async_trait]
    impl SqlRunner for DownDatabase {
        async fn run(&self, _sql: &str) -> Result<ResultSet> {
            Err(AskDbError::ExecutionFailed("connection refused".to_string()))
        }
    }

    fn orchestrator() -> Orchestrator {
        let catalog = SchemaCatalog::from_tables(vec![(
            "Invoice".to_string(),
            vec![ColumnDef::new("total", "numeric")],
        )]);
        Orchestrator::new(Arc::new(catalog), Arc::new(FixedLlm), Arc::new(DownDatabase))
    }

    #[tokio::test]
    async fn test_root() {
        let response = handle_request("GET / HTTP/1.1\r\nHost: x\r\n\r\n", &orchestrator()).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_question_is_bad_request() {
        let request = "POST /generate_sql HTTP/1.1\r\nContent-Length: 2\r\n\r\n{}";
        let response = handle_request(request, &orchestrator()).await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "Question is required");

        let response = route("POST", "/chat", "{\"msg\": 1}", &orchestrator()).await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "Message is required");
    }

    #[tokio::test]
    async fn test_non_utf8_body_is_bad_request() {
        let mut request = b"POST /chat HTTP/1.1\r\nContent-Length: 4\r\n\r\n".to_vec();
        request.extend_from_slice(&[0xff, 0xfe, 0x7b, 0x7d]);

        let response = handle_raw_request(&request, &orchestrator()).await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "Request is not valid UTF-8");

        let response = handle_raw_request(b"GET / HTTP/1.1\r\n\r\n", &orchestrator()).await;
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let response = route("POST", "/chat", "{not json", &orchestrator()).await;
        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn test_execution_failure_is_server_error() {
        let response = route(
            "POST",
            "/generate_sql",
            r#"{"question": "total of invoices"}"#,
            &orchestrator(),
        )
        .await;
        assert_eq!(response.status, 500);
        assert_eq!(response.body["error"], "connection refused");
    }

    #[tokio::test]
    async fn test_health_unhealthy_when_database_down() {
        let response = route("GET", "/health/", "", &orchestrator()).await;
        assert_eq!(response.status, 404);

        let response = handle_request("GET /health/ HTTP/1.1\r\n\r\n", &orchestrator()).await;
        assert_eq!(response.status, 500);
        assert_eq!(response.body["status"], "unhealthy");
        assert!(response.body.get("schema_tables").is_none());
    }

    #[tokio::test]
    async fn test_unknown_route_and_method() {
        assert_eq!(route("GET", "/nope", "", &orchestrator()).await.status, 404);
        assert_eq!(route("DELETE", "/chat", "", &orchestrator()).await.status, 405);
    }

    #[test]
    fn test_http_string() {
        let text = HttpResponse::error(404, "Not found").to_http_string();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.ends_with("{\"error\":\"Not found\"}"));
        assert!(text.contains("Content-Length: 21\r\n"));
    }

    #[test]
    fn test_extract_content_length() {
        assert_eq!(extract_content_length("POST / HTTP/1.1\r\ncontent-length: 17\r\n"), Some(17));
        assert_eq!(extract_content_length("GET / HTTP/1.1\r\n"), None);
        assert_eq!(find_headers_end(b"GET / HTTP/1.1\r\n\r\nbody"), Some(18));
    }
}
