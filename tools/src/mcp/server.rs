//! MCP Server
//!
//! Main server loop handling JSON-RPC messages over stdio. Each request runs
//! on its own task; replies are written as they complete.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::protocol::*;
use crate::dispatcher::Dispatcher;

const PREVIEW_CHARS: usize = 100;

/// MCP Server
#[derive(Clone)]
pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
    info: ServerInfo,
}

impl McpServer {
    pub fn new(dispatcher: Arc<Dispatcher>, name: impl Into<String>) -> Self {
        Self {
            dispatcher,
            info: ServerInfo {
                name: name.into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
        }
    }

    /// Serve until `reader` reaches EOF, then drain in-flight requests.
    ///
    /// A frame that is not UTF-8 gets a parse error reply. A read error stops
    /// intake but still lets every accepted request answer before returning.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut frames = reader.split(b'\n');
        let mut in_flight = JoinSet::new();
        let mut reading = true;
        let mut read_error = None;

        info!("MCP server started, waiting for messages...");

        loop {
            tokio::select! {
                frame = frames.next_segment(), if reading => {
                    match frame {
                        Ok(Some(frame)) => match String::from_utf8(frame) {
                            Ok(line) if line.trim().is_empty() => {}
                            Ok(line) => {
                                debug!("<- {}", preview(&line));
                                let server = self.clone();
                                in_flight.spawn(async move { server.handle_message(&line).await });
                            }
                            Err(e) => {
                                warn!("Rejected frame that is not UTF-8: {e}");
                                let response = JsonRpcResponse::error(
                                    None,
                                    PARSE_ERROR,
                                    format!("Parse error: {e}"),
                                );
                                write_response(&mut writer, &response).await?;
                            }
                        },
                        Ok(None) => reading = false,
                        Err(e) => {
                            error!("Failed to read from client: {e}");
                            read_error = Some(e);
                            reading = false;
                        }
                    }
                }
                Some(done) = in_flight.join_next() => {
                    match done {
                        Ok(Some(response)) => write_response(&mut writer, &response).await?,
                        Ok(None) => {}
                        Err(e) => error!("Request task failed: {e}"),
                    }
                }
                else => break,
            }
        }

        info!("MCP server shutting down");
        match read_error {
            Some(e) => Err(e).context("Failed to read from client"),
            None => Ok(()),
        }
    }

    /// Handle a single JSON-RPC message; notifications produce no reply
    pub async fn handle_message(&self, msg: &str) -> Option<JsonRpcResponse> {
        let req: JsonRpcRequest = match serde_json::from_str(msg) {
            Ok(r) => r,
            Err(e) => return Some(JsonRpcResponse::error(None, PARSE_ERROR, e.to_string())),
        };

        if req.is_notification() {
            debug!("Notification: {}", req.method);
            return None;
        }

        let id = req.id.clone();
        if req.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                id,
                INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {}", req.jsonrpc),
            ));
        }

        let response = match req.method.as_str() {
            "initialize" => {
                let params: InitializeParams =
                    serde_json::from_value(req.params).unwrap_or_default();
                let result = InitializeResult {
                    protocol_version: params
                        .protocol_version
                        .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.into()),
                    capabilities: ServerCapabilities {
                        tools: ToolsCapability {
                            list_changed: false,
                        },
                    },
                    server_info: self.info.clone(),
                };
                respond(id, &result)
            }

            "ping" => JsonRpcResponse::success(id, json!({})),

            "tools/list" => respond(id, &self.tools_list()),

            "tools/call" => {
                let params: ToolCallParams = match serde_json::from_value(req.params) {
                    Ok(p) => p,
                    Err(e) => return Some(JsonRpcResponse::error(id, INVALID_PARAMS, e.to_string())),
                };

                info!("Calling tool: {}", params.name);
                let result = self.dispatcher.invoke(&params.name, params.arguments).await;
                respond(id, &ToolCallResult::from(result))
            }

            _ => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Unknown method: {}", req.method),
            ),
        };
        Some(response)
    }

    fn tools_list(&self) -> ToolsListResult {
        let tools = self
            .dispatcher
            .registry()
            .list_tools()
            .iter()
            .map(|t| Tool {
                name: t.name.into(),
                description: t.description.into(),
                input_schema: t.schema.to_json_schema(),
            })
            .collect();
        ToolsListResult { tools }
    }
}

fn respond<T: Serialize>(id: Option<Value>, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(v) => JsonRpcResponse::success(id, v),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, format!("Serialization error: {e}")),
    }
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> Result<()> {
    let out = serde_json::to_string(response).context("Failed to serialize response")?;
    debug!("-> {}", preview(&out));
    writer.write_all(out.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

fn preview(line: &str) -> String {
    if line.chars().count() > PREVIEW_CHARS {
        format!("{}...", line.chars().take(PREVIEW_CHARS).collect::<String>())
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolRegistry;
    use crate::runtime::{InMemoryRuntime, RuntimeClient};

    fn server() -> McpServer {
        let registry = Arc::new(ToolRegistry::with_builtin_tools().unwrap());
        let client = RuntimeClient::new(Arc::new(InMemoryRuntime::new()));
        McpServer::new(Arc::new(Dispatcher::new(registry, client)), "docker-server")
    }

    async fn call(server: &McpServer, msg: Value) -> Value {
        let response = server.handle_message(&msg.to_string()).await.unwrap();
        serde_json::to_value(response).unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let resp = call(
            &server(),
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize",
                   "params": {"protocolVersion": "2025-03-26", "capabilities": {}}}),
        )
        .await;
        assert_eq!(resp["id"], 1);
        assert_eq!(resp["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(resp["result"]["serverInfo"]["name"], "docker-server");
        assert_eq!(resp["result"]["capabilities"]["tools"]["listChanged"], false);

        let resp = call(&server(), json!({"jsonrpc": "2.0", "id": 2, "method": "initialize"})).await;
        assert_eq!(resp["result"]["protocolVersion"], DEFAULT_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_notification_gets_no_reply() {
        let reply = server()
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let resp = call(&server(), json!({"jsonrpc": "2.0", "id": "a", "method": "tools/list"})).await;
        let tools = resp["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 8);
        assert_eq!(tools[0]["name"], "get_logs");
        assert_eq!(tools[0]["inputSchema"]["required"], json!(["container_id"]));
        assert_eq!(tools[0]["inputSchema"]["properties"]["tail"]["default"], 20);
    }

    #[tokio::test]
    async fn test_tools_call() {
        let resp = call(
            &server(),
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                   "params": {"name": "list_containers", "arguments": {}}}),
        )
        .await;
        assert_eq!(resp["result"]["content"][0]["text"], "No containers found.");
        assert!(resp["result"].get("isError").is_none());

        let resp = call(
            &server(),
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call",
                   "params": {"name": "nope"}}),
        )
        .await;
        assert_eq!(resp["result"]["isError"], true);
        assert_eq!(resp["result"]["content"][0]["text"], "Unknown tool: nope");
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let s = server();
        let resp = serde_json::to_value(s.handle_message("{not json").await.unwrap()).unwrap();
        assert_eq!(resp["error"]["code"], PARSE_ERROR);

        let resp = call(&s, json!({"jsonrpc": "2.0", "id": 5, "method": "resources/list"})).await;
        assert_eq!(resp["error"]["code"], METHOD_NOT_FOUND);

        let resp = call(&s, json!({"jsonrpc": "2.0", "id": 6, "method": "tools/call", "params": {}})).await;
        assert_eq!(resp["error"]["code"], INVALID_PARAMS);

        let resp = call(&s, json!({"jsonrpc": "1.0", "id": 7, "method": "ping"})).await;
        assert_eq!(resp["error"]["code"], INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_serve_stdio_loop() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#, "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, "\n",
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#, "\n",
        );
        let mut output = Vec::new();
        server()
            .serve(tokio::io::BufReader::new(input.as_bytes()), &mut output)
            .await
            .unwrap();

        let replies: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 2);
        let mut ids: Vec<i64> = replies.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_serve_survives_invalid_utf8_frame() {
        let mut input = Vec::new();
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);
        input.extend_from_slice(b"\n\xff\xfe\n");
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#);
        input.extend_from_slice(b"\r\n");

        let mut output = Vec::new();
        server()
            .serve(tokio::io::BufReader::new(input.as_slice()), &mut output)
            .await
            .unwrap();

        let replies: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 3);

        let parse_errors: Vec<&Value> = replies
            .iter()
            .filter(|r| r["error"]["code"] == PARSE_ERROR)
            .collect();
        assert_eq!(parse_errors.len(), 1);
        assert_eq!(parse_errors[0]["id"], Value::Null);

        let mut ids: Vec<i64> = replies.iter().filter_map(|r| r["id"].as_i64()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_null_id_request_gets_reply() {
        let resp = call(
            &server(),
            json!({"jsonrpc": "2.0", "id": null, "method": "tools/call",
                   "params": {"name": "list_containers", "arguments": {}}}),
        )
        .await;
        assert_eq!(resp["id"], Value::Null);
        assert_eq!(resp["result"]["content"][0]["text"], "No containers found.");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(150);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }
}
