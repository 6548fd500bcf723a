#![allow(dead_code)]

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use rest_probe::app::App;
use rest_probe::mcp::server::McpServer;
use rest_probe::services::config::AppConfig;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Local HTTP server for end-to-end tests.
///
/// `/status/<code>` answers with that status, `/text/<body>` answers with the literal
/// body as plain text, and every other path echoes the request as JSON.
pub struct EchoServer {
    pub base_url: String,
    pub port: u16,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl EchoServer {
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.handle).await;
    }
}

async fn echo_handler(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let path = uri.path().to_string();
    if let Some(code) = path.strip_prefix("/status/") {
        let status = code
            .parse::<u16>()
            .ok()
            .and_then(|c| StatusCode::from_u16(c).ok())
            .unwrap_or(StatusCode::BAD_REQUEST);
        return (status, axum::Json(json!({ "status": status.as_u16() }))).into_response();
    }
    if let Some(text) = path.strip_prefix("/text/") {
        return (StatusCode::OK, text.to_string()).into_response();
    }

    let headers: serde_json::Map<String, Value> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), Value::String(v.to_string())))
        })
        .collect();
    axum::Json(json!({
        "method": method.as_str(),
        "path": path,
        "query": uri.query().unwrap_or(""),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    }))
    .into_response()
}

pub async fn spawn_echo_server() -> EchoServer {
    let app = Router::new().route("/{*path}", any(echo_handler));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = shutdown_rx.await;
    });
    let handle = tokio::spawn(async move {
        let _ = server.await;
    });
    EchoServer {
        base_url: format!("http://{addr}"),
        port: addr.port(),
        shutdown: Some(shutdown_tx),
        handle,
    }
}

/// A loopback port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local_addr").port();
    drop(listener);
    port
}

pub fn config(vars: &[(&str, &str)]) -> Arc<AppConfig> {
    Arc::new(
        AppConfig::from_vars(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())))
            .expect("config"),
    )
}

pub fn app(vars: &[(&str, &str)]) -> App {
    App::initialize(config(vars)).expect("app")
}

pub fn server(vars: &[(&str, &str)]) -> McpServer {
    McpServer::new(app(vars))
}

/// Parses the JSON payload out of a tool result's single text block.
pub fn payload(result: &Value) -> Value {
    let text = result["content"][0]["text"]
        .as_str()
        .expect("tool result text");
    serde_json::from_str(text).expect("payload json")
}
