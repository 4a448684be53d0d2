// Exposes the platform retrieval operations as callable tools over
// stdio JSON-RPC, so an external agent can drive the same client the
// pipeline uses. The server performs no computation of its own.

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::core::digest::transcript::format_message_line;
use crate::core::digest::ChatClient;
use crate::rpc::protocol::{
    JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR,
};

pub struct ToolServer<C: ChatClient> {
    client: C,
}

/// Tool ids accept both JSON numbers and the string form Discord uses
/// everywhere (snowflakes overflow common JSON integer handling).
fn id_arg(args: &Value, key: &str) -> Result<u64, String> {
    match &args[key] {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| format!("argument '{key}' is not a valid id")),
        Value::String(s) => s
            .parse::<u64>()
            .map_err(|_| format!("argument '{key}' is not a valid id")),
        Value::Null => Err(format!("missing required argument: {key}")),
        _ => Err(format!("argument '{key}' is not a valid id")),
    }
}

fn tool_descriptors() -> Value {
    json!([
        {
            "name": "list_channels",
            "description": "List all text channels in the server",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "guild_id": { "type": "string", "description": "Server ID to list channels from" }
                },
                "required": ["guild_id"]
            }
        },
        {
            "name": "list_threads",
            "description": "List active threads under a channel",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "channel_id": { "type": "string", "description": "Parent channel ID" }
                },
                "required": ["channel_id"]
            }
        },
        {
            "name": "get_messages",
            "description": "Read recent messages from a channel or thread, newest first",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "channel_id": { "type": "string", "description": "Channel ID to read from" },
                    "limit": { "type": "number", "description": "Messages per page (max 100)", "minimum": 1, "maximum": 100, "default": 50 },
                    "before": { "type": "string", "description": "Message ID - return only older messages" }
                },
                "required": ["channel_id"]
            }
        },
        {
            "name": "get_pinned_messages",
            "description": "Get the pinned messages of a channel (curated announcements)",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "channel_id": { "type": "string", "description": "Channel ID to fetch pins from" }
                },
                "required": ["channel_id"]
            }
        }
    ])
}

/// Wraps tool output the way tool-protocol clients expect: a list of
/// text content blocks plus an error flag.
fn text_content(text: String, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error,
    })
}

impl<C: ChatClient> ToolServer<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Handles one request. Notifications (no id) get no response.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone()?;

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": "2024-11-05",
                    "serverInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                    "capabilities": { "tools": {} },
                }),
            ),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": tool_descriptors() })),
            "tools/call" => self.handle_tool_call(id, &request.params).await,
            other => JsonRpcResponse::failure(
                id,
                METHOD_NOT_FOUND,
                format!("unknown method: {other}"),
            ),
        };
        Some(response)
    }

    async fn handle_tool_call(&self, id: Value, params: &Value) -> JsonRpcResponse {
        let name = match params["name"].as_str() {
            Some(name) => name,
            None => {
                return JsonRpcResponse::failure(id, INVALID_PARAMS, "missing tool name");
            }
        };
        let args = &params["arguments"];

        tracing::info!(tool = name, "tool call");

        let outcome = match name {
            "list_channels" => self.call_list_channels(args).await,
            "list_threads" => self.call_list_threads(args).await,
            "get_messages" => self.call_get_messages(args).await,
            "get_pinned_messages" => self.call_get_pinned_messages(args).await,
            other => {
                return JsonRpcResponse::failure(
                    id,
                    INVALID_PARAMS,
                    format!("unknown tool: {other}"),
                );
            }
        };

        // Tool-level failures come back as error content, not protocol
        // errors - the caller asked a valid question and got a bad
        // answer, the framing itself is fine.
        match outcome {
            Ok(text) => JsonRpcResponse::success(id, text_content(text, false)),
            Err(message) => {
                tracing::warn!(tool = name, error = %message, "tool call failed");
                JsonRpcResponse::success(
                    id,
                    text_content(format!("Error executing tool {name}: {message}"), true),
                )
            }
        }
    }

    async fn call_list_channels(&self, args: &Value) -> Result<String, String> {
        let guild_id = id_arg(args, "guild_id")?;
        let channels = self
            .client
            .list_channels(guild_id)
            .await
            .map_err(|e| e.to_string())?;
        serde_json::to_string_pretty(&channels).map_err(|e| e.to_string())
    }

    async fn call_list_threads(&self, args: &Value) -> Result<String, String> {
        let channel_id = id_arg(args, "channel_id")?;
        let threads = self
            .client
            .list_threads(channel_id)
            .await
            .map_err(|e| e.to_string())?;
        serde_json::to_string_pretty(&threads).map_err(|e| e.to_string())
    }

    async fn call_get_messages(&self, args: &Value) -> Result<String, String> {
        let channel_id = id_arg(args, "channel_id")?;
        let limit = args["limit"].as_u64().unwrap_or(50).min(100) as usize;
        let before = match &args["before"] {
            Value::Null => None,
            _ => Some(id_arg(args, "before")?),
        };

        let messages = self
            .client
            .get_messages(channel_id, limit, before)
            .await
            .map_err(|e| e.to_string())?;

        let lines: Vec<String> = messages.iter().map(format_message_line).collect();
        Ok(format!(
            "Retrieved {} messages:\n{}",
            messages.len(),
            lines.join("\n")
        ))
    }

    async fn call_get_pinned_messages(&self, args: &Value) -> Result<String, String> {
        let channel_id = id_arg(args, "channel_id")?;
        let pins = self
            .client
            .get_pinned_messages(channel_id)
            .await
            .map_err(|e| e.to_string())?;

        if pins.is_empty() {
            return Ok("No pinned messages found in this channel".to_string());
        }
        let lines: Vec<String> = pins.iter().map(format_message_line).collect();
        Ok(format!(
            "Found {} pinned messages:\n{}",
            pins.len(),
            lines.join("\n")
        ))
    }

    /// Serves newline-delimited JSON-RPC until stdin closes.
    pub async fn run_stdio(&self) -> anyhow::Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut lines = stdin.lines();

        tracing::info!("tool server listening on stdio");

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
                Ok(request) => self.handle(request).await,
                Err(err) => Some(JsonRpcResponse::failure(
                    Value::Null,
                    PARSE_ERROR,
                    format!("parse error: {err}"),
                )),
            };

            if let Some(response) = response {
                let mut payload = serde_json::to_string(&response)?;
                payload.push('\n');
                stdout.write_all(payload.as_bytes()).await?;
                stdout.flush().await?;
            }
        }

        Ok(())
    }
}
