use crate::app::App;
use crate::errors::{ErrorCode, McpError, ToolError};
use crate::mcp::catalog::{list_tools, validate_tool_args, TEST_REQUEST_TOOL};
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::mcp::resources::{list_resources, read_resource};
use crate::services::config::AppConfig;
use crate::services::logger::Logger;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

const PROTOCOL_VERSION: &str = "2025-06-18";
const SERVER_NAME: &str = "rest-probe";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct McpServer {
    app: Arc<App>,
    logger: Logger,
}

impl McpServer {
    pub fn new(app: App) -> Self {
        let logger = app.logger.child("server");
        Self {
            app: Arc::new(app),
            logger,
        }
    }

    fn handle_initialize(&self) -> Value {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {}, "resources": {} },
            "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION },
        })
    }

    fn handle_tools_list(&self) -> Value {
        let tools = list_tools(&self.app.config, self.app.api_manager.auth_mode());
        serde_json::json!({ "tools": tools })
    }

    async fn handle_tools_call(&self, params: &Value) -> Result<Value, McpError> {
        let name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
        if name.is_empty() {
            return Err(McpError::invalid_params("Missing tool name"));
        }
        if name != TEST_REQUEST_TOOL {
            return Err(McpError::method_not_found(format!("Unknown tool: {}", name)));
        }
        let args = match params.get("arguments") {
            None | Some(Value::Null) => Value::Object(Default::default()),
            Some(args) => args.clone(),
        };
        validate_tool_args(name, &args)?;
        self.app
            .api_manager
            .test_request(args)
            .await
            .map_err(|err| McpError::from(&err))
    }

    fn handle_resources_read(&self, request: &JsonRpcRequest) -> Result<Value, McpError> {
        let uri = request
            .param_str("uri")
            .ok_or_else(|| McpError::invalid_params("Missing resource uri"))?;
        read_resource(uri)
    }

    /// Handles one input line. Returns the response line, if the message warrants one.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let parsed: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(_) => {
                return Some(
                    JsonRpcResponse::failure(Value::Null, ErrorCode::ParseError, "Parse error")
                        .to_line(),
                )
            }
        };
        let fallback_id = parsed.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(parsed) {
            Ok(request) => request,
            Err(_) => {
                return Some(
                    JsonRpcResponse::failure(
                        fallback_id,
                        ErrorCode::InvalidRequest,
                        "Invalid request",
                    )
                    .to_line(),
                )
            }
        };

        if request.is_notification() {
            if !request.method.starts_with("notifications/") {
                self.logger.debug(
                    "Ignoring request without id",
                    Some(&serde_json::json!({ "method": request.method })),
                );
            }
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);

        let result = match request.method.as_str() {
            "initialize" => Ok(self.handle_initialize()),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => Ok(self.handle_tools_list()),
            "tools/call" => self.handle_tools_call(&request.params).await,
            "resources/list" => Ok(list_resources()),
            "resources/read" => self.handle_resources_read(&request),
            other => Err(McpError::method_not_found(format!(
                "Method not found: {}",
                other
            ))),
        };
        Some(JsonRpcResponse::from_result(id, result).to_line())
    }

    /// Serves newline-delimited JSON-RPC until EOF or `shutdown` resolves.
    ///
    /// Each request runs in its own task; responses go through a single writer task in
    /// completion order. On EOF in-flight calls finish first, on shutdown they are aborted.
    pub async fn serve<R, W, S>(
        self: Arc<Self>,
        reader: R,
        writer: W,
        shutdown: S,
    ) -> Result<(), ToolError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
        S: Future<Output = ()>,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let writer_task = tokio::spawn(async move {
            let mut writer = BufWriter::new(writer);
            while let Some(line) = rx.recv().await {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            writer.flush().await
        });

        let mut lines = BufReader::new(reader).lines();
        let mut tasks = JoinSet::new();
        let mut interrupted = false;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                next = lines.next_line() => match next {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }
                        let server = self.clone();
                        let tx = tx.clone();
                        tasks.spawn(async move {
                            if let Some(response) = server.handle_line(&line).await {
                                let _ = tx.send(response);
                            }
                        });
                    }
                    Ok(None) => break,
                    Err(err) => {
                        self.logger.error(
                            "Failed to read from stdin",
                            Some(&serde_json::json!({ "error": err.to_string() })),
                        );
                        break;
                    }
                },
                _ = &mut shutdown => {
                    interrupted = true;
                    break;
                }
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        if interrupted {
            self.logger.info("Interrupted; shutting down", None);
            tasks.abort_all();
        }
        while tasks.join_next().await.is_some() {}
        drop(tx);

        match writer_task.await {
            Ok(result) => result.map_err(ToolError::from),
            Err(err) => Err(ToolError::internal(format!("Writer task failed: {}", err))),
        }
    }
}

/// Serves stdio until EOF or Ctrl-C.
pub async fn run_stdio(config: Arc<AppConfig>) -> Result<(), ToolError> {
    let app = App::initialize(config)?;
    let sweeper = app.start_background_tasks();
    let server = Arc::new(McpServer::new(app));
    let result = server
        .serve(tokio::io::stdin(), tokio::io::stdout(), async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    sweeper.abort();
    result
}
