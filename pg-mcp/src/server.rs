//! MCP server.
//!
//! Exposes the tool router over JSON-RPC 2.0 on the configured transport:
//! stdio with MCP Content-Length framing, or HTTP POST. Logging goes to
//! stderr so stdout stays clean for the protocol.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{middleware, Router};
use common::errors::AppError;
use common::middleware::request_id::request_id_middleware;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{ServerConfig, ServerTransport};
use crate::tools::ToolRouter;

/// MCP protocol revision implemented by this server.
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Serves requests on the configured transport until the peer disconnects
/// (stdio) or the process receives SIGINT (HTTP).
pub async fn serve(config: ServerConfig, router: Arc<ToolRouter>) -> Result<(), ServerError> {
    match config.transport {
        ServerTransport::Stdio => serve_stdio(&router, config.max_body_bytes).await,
        ServerTransport::Http => serve_http(config, router).await,
    }
}

// ---- stdio transport ----

/// Serves JSON-RPC requests over stdin/stdout. Returns cleanly when stdin
/// closes or on SIGINT, so the caller's shutdown drain runs either way.
async fn serve_stdio(router: &ToolRouter, max_body_bytes: usize) -> Result<(), ServerError> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();
    tokio::select! {
        result = run_stdio(reader, writer, router, max_body_bytes) => result,
        _ = shutdown_signal() => Ok(()),
    }
}

/// The stdio request loop over arbitrary streams.
async fn run_stdio(
    mut reader: BufReader<impl tokio::io::AsyncRead + Unpin>,
    mut writer: impl AsyncWrite + Unpin,
    router: &ToolRouter,
    max_body_bytes: usize,
) -> Result<(), ServerError> {
    loop {
        let bytes = match read_framed(&mut reader, max_body_bytes).await? {
            Some(bytes) => bytes,
            None => return Ok(()),
        };
        let request: JsonRpcRequest = match serde_json::from_slice(&bytes) {
            Ok(request) => request,
            Err(_) => {
                let response = invalid_request_response(Value::Null);
                write_response(&mut writer, &response.1).await?;
                continue;
            }
        };
        // Notifications carry no id and get no response; anything with an
        // id gets an answer, even an unknown notifications/* method
        if request.id.is_null() {
            continue;
        }
        let response = handle_request(router, request).await;
        write_response(&mut writer, &response.1).await?;
    }
}

async fn write_response(
    writer: &mut (impl AsyncWrite + Unpin),
    response: &JsonRpcResponse,
) -> Result<(), ServerError> {
    let payload = serde_json::to_vec(response)
        .map_err(|_| ServerError::Transport("json-rpc serialization failed".to_string()))?;
    write_framed(writer, &payload).await
}

// ---- HTTP transport ----

/// Serves JSON-RPC requests over HTTP POST until SIGINT.
async fn serve_http(config: ServerConfig, router: Arc<ToolRouter>) -> Result<(), ServerError> {
    let addr: SocketAddr = config
        .bind
        .parse()
        .map_err(|_| ServerError::Config(format!("invalid bind address '{}'", config.bind)))?;

    let app = http_router(router, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Transport(format!("http bind failed: {e}")))?;
    tracing::info!(address = %addr, "Listening for MCP requests");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Transport(format!("http server failed: {e}")))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Received shutdown signal");
}

/// Builds the HTTP router. The body-size limit is enforced before the
/// extractor buffers anything, so oversized requests fail with 413.
fn http_router(router: Arc<ToolRouter>, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/rpc", post(handle_http))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(router)
}

async fn handle_http(State(router): State<Arc<ToolRouter>>, bytes: Bytes) -> impl IntoResponse {
    let request: JsonRpcRequest = match serde_json::from_slice(bytes.as_ref()) {
        Ok(request) => request,
        Err(_) => {
            let response = invalid_request_response(Value::Null);
            return (response.0, axum::Json(response.1));
        }
    };
    let (status, response) = handle_request(&router, request).await;
    (status, axum::Json(response))
}

// ---- JSON-RPC handling ----

/// Incoming JSON-RPC request payload.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    jsonrpc: String,
    /// Request identifier; absent for notifications.
    #[serde(default)]
    id: Value,
    /// Method name.
    method: String,
    /// Optional parameters payload.
    params: Option<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error payload.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Tool call parameters for `tools/call`.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Raw JSON arguments.
    #[serde(default)]
    arguments: Value,
}

/// Dispatches one JSON-RPC request.
async fn handle_request(router: &ToolRouter, request: JsonRpcRequest) -> (StatusCode, JsonRpcResponse) {
    if request.jsonrpc != "2.0" {
        return (
            StatusCode::BAD_REQUEST,
            JsonRpcResponse::error(request.id, -32600, "invalid json-rpc version"),
        );
    }
    match request.method.as_str() {
        "initialize" => (
            StatusCode::OK,
            JsonRpcResponse::ok(
                request.id,
                serde_json::json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": "pg-mcp",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ),
        ),
        "tools/list" => {
            let tools = router.list_tools();
            (
                StatusCode::OK,
                JsonRpcResponse::ok(request.id, serde_json::json!({ "tools": tools })),
            )
        }
        "tools/call" => {
            let id = request.id;
            let params = request.params.unwrap_or(Value::Null);
            let call: ToolCallParams = match serde_json::from_value(params) {
                Ok(call) => call,
                Err(_) => {
                    return (
                        StatusCode::BAD_REQUEST,
                        JsonRpcResponse::error(id, -32602, "invalid tool params"),
                    )
                }
            };
            match router.call_tool(&call.name, call.arguments).await {
                Ok(result) => (
                    StatusCode::OK,
                    JsonRpcResponse::ok(
                        id,
                        serde_json::json!({
                            "content": [{ "type": "json", "json": result }],
                        }),
                    ),
                ),
                Err(err) => jsonrpc_error(id, &err),
            }
        }
        _ => (
            StatusCode::BAD_REQUEST,
            JsonRpcResponse::error(request.id, -32601, "method not found"),
        ),
    }
}

fn invalid_request_response(id: Value) -> (StatusCode, JsonRpcResponse) {
    (
        StatusCode::BAD_REQUEST,
        JsonRpcResponse::error(id, -32600, "invalid json-rpc request"),
    )
}

/// Maps a gateway failure onto a JSON-RPC error response.
fn jsonrpc_error(id: Value, error: &AppError) -> (StatusCode, JsonRpcResponse) {
    let (status, code) = match error {
        AppError::UnknownTool(_) => (StatusCode::BAD_REQUEST, -32601),
        AppError::Validation(_) => (StatusCode::BAD_REQUEST, -32602),
        AppError::DisallowedQuery => (StatusCode::OK, -32010),
        AppError::NoConnections => (StatusCode::OK, -32011),
        AppError::DatabaseNotFound { .. } => (StatusCode::OK, -32012),
        AppError::SqlSyntax(_) => (StatusCode::OK, -32013),
        AppError::QueryExecution(_) => (StatusCode::OK, -32014),
        AppError::Config(_) => (StatusCode::OK, -32050),
    };
    (status, JsonRpcResponse::error(id, code, error.to_string()))
}

// ---- Framing helpers ----

/// Reads one framed stdio payload using MCP Content-Length headers.
/// Returns `None` on a clean EOF before any header byte.
async fn read_framed(
    reader: &mut BufReader<impl tokio::io::AsyncRead + Unpin>,
    max_body_bytes: usize,
) -> Result<Option<Vec<u8>>, ServerError> {
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;
    let mut line = String::new();
    loop {
        line.clear();
        let bytes = reader
            .read_line(&mut line)
            .await
            .map_err(|_| ServerError::Transport("stdio read failed".to_string()))?;
        if bytes == 0 {
            if saw_header {
                return Err(ServerError::Transport("stdio closed mid-frame".to_string()));
            }
            return Ok(None);
        }
        saw_header = true;
        if line.trim().is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix("Content-Length:") {
            let parsed = value
                .trim()
                .parse::<usize>()
                .map_err(|_| ServerError::Transport("invalid content length".to_string()))?;
            content_length = Some(parsed);
        }
    }
    let len = content_length
        .ok_or_else(|| ServerError::Transport("missing content length".to_string()))?;
    if len > max_body_bytes {
        return Err(ServerError::Transport("payload too large".to_string()));
    }
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|_| ServerError::Transport("stdio read failed".to_string()))?;
    Ok(Some(buf))
}

/// Writes one framed stdio payload using MCP Content-Length headers.
async fn write_framed(
    writer: &mut (impl AsyncWrite + Unpin),
    payload: &[u8],
) -> Result<(), ServerError> {
    let header = format!("Content-Length: {}\r\n\r\n", payload.len());
    writer
        .write_all(header.as_bytes())
        .await
        .map_err(|_| ServerError::Transport("stdio write failed".to_string()))?;
    writer
        .write_all(payload)
        .await
        .map_err(|_| ServerError::Transport("stdio write failed".to_string()))?;
    writer
        .flush()
        .await
        .map_err(|_| ServerError::Transport("stdio write failed".to_string()))
}

// ---- Errors ----

/// Server-level failures.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Invalid server configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::QueryExecutor;
    use async_trait::async_trait;
    use common::errors::AppResult;
    use common::models::{QueryEnvelope, QueryRequest};
    use serde_json::json;

    struct StubExecutor;

    #[async_trait]
    impl QueryExecutor for StubExecutor {
        async fn execute(&self, req: &QueryRequest) -> AppResult<QueryEnvelope> {
            if req.database == "alarms" {
                Ok(QueryEnvelope::encode(req.query.clone(), vec![]))
            } else {
                Err(AppError::DatabaseNotFound {
                    name: req.database.clone(),
                    available: vec!["alarms".to_string()],
                })
            }
        }
    }

    fn router() -> ToolRouter {
        ToolRouter::new(Arc::new(StubExecutor))
    }

    fn rpc(method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: json!(1),
            method: method.to_string(),
            params: Some(params),
        }
    }

    #[tokio::test]
    async fn test_invalid_version_is_rejected() {
        let request = JsonRpcRequest {
            jsonrpc: "1.0".to_string(),
            id: json!(1),
            method: "tools/list".to_string(),
            params: None,
        };
        let (status, response) = handle_request(&router(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn test_unknown_method_is_rejected() {
        let (status, response) = handle_request(&router(), rpc("resources/list", Value::Null)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_id_bearing_notification_method_gets_a_response() {
        // A request with an id is never a notification, even under the
        // notifications/ prefix; dropping it would hang the client
        let (status, response) =
            handle_request(&router(), rpc("notifications/initialized", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_initialize_reports_tools_capability() {
        let (status, response) = handle_request(&router(), rpc("initialize", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], json!(PROTOCOL_VERSION));
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_tools_list_advertises_execute_query() {
        let (_, response) = handle_request(&router(), rpc("tools/list", Value::Null)).await;
        let result = response.result.unwrap();
        assert_eq!(result["tools"][0]["name"], json!("execute_query"));
    }

    #[tokio::test]
    async fn test_tool_call_wraps_result_content() {
        let params = json!({
            "name": "execute_query",
            "arguments": {"database": "alarms", "query": "SELECT 1"},
        });
        let (status, response) = handle_request(&router(), rpc("tools/call", params)).await;
        assert_eq!(status, StatusCode::OK);
        let result = response.result.unwrap();
        assert_eq!(result["content"][0]["type"], json!("json"));
        assert_eq!(result["content"][0]["json"]["success"], json!(true));
    }

    #[tokio::test]
    async fn test_tool_failure_maps_to_error_code() {
        let params = json!({
            "name": "execute_query",
            "arguments": {"database": "unknown_db", "query": "SELECT 1"},
        });
        let (_, response) = handle_request(&router(), rpc("tools/call", params)).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, -32012);
        assert!(error.message.contains("alarms"));
    }

    #[tokio::test]
    async fn test_read_framed_rejects_payload_over_limit() {
        let payload = br#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
        let framed = format!(
            "Content-Length: {}\r\n\r\n{}",
            payload.len(),
            String::from_utf8_lossy(payload)
        );
        let mut reader = BufReader::new(framed.as_bytes());
        let result = read_framed(&mut reader, payload.len() - 1).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_read_framed_accepts_payload_at_limit() {
        let payload = br#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
        let framed = format!(
            "Content-Length: {}\r\n\r\n{}",
            payload.len(),
            String::from_utf8_lossy(payload)
        );
        let mut reader = BufReader::new(framed.as_bytes());
        let bytes = read_framed(&mut reader, payload.len()).await.unwrap();
        assert_eq!(bytes.as_deref(), Some(payload.as_slice()));
    }

    #[tokio::test]
    async fn test_read_framed_returns_none_on_eof() {
        let mut reader = BufReader::new(&b""[..]);
        let result = read_framed(&mut reader, 1024).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_write_framed_prepends_header() {
        let mut out = Vec::new();
        write_framed(&mut out, b"{}").await.unwrap();
        assert_eq!(out, b"Content-Length: 2\r\n\r\n{}");
    }

    fn frame(payload: &str) -> String {
        format!("Content-Length: {}\r\n\r\n{}", payload.len(), payload)
    }

    #[tokio::test]
    async fn test_stdio_loop_answers_framed_requests() {
        let input = frame(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#);
        let mut out = Vec::new();
        run_stdio(BufReader::new(input.as_bytes()), &mut out, &router(), 1024)
            .await
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Content-Length: "));
        assert!(text.contains("execute_query"));
    }

    #[tokio::test]
    async fn test_stdio_notification_gets_no_response() {
        let input = frame(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#);
        let mut out = Vec::new();
        run_stdio(BufReader::new(input.as_bytes()), &mut out, &router(), 1024)
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_http_body_limit_rejects_oversized_request() {
        use tower::ServiceExt;

        let app = http_router(Arc::new(router()), 64);
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/rpc")
            .body(axum::body::Body::from(vec![b'x'; 128]))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
