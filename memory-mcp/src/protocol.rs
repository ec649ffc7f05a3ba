//! MCP protocol handshake: `initialize`, `tools/list`, and the tool
//! descriptor types shared by both (spec.md §6).

use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse};

pub const SUPPORTED_VERSIONS: &[&str] = &["2025-06-18", "2024-11-05"];

#[derive(Debug, Serialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: Value,
    #[serde(rename = "serverInfo")]
    pub server_info: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct McpTool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Serialize)]
pub struct ListToolsResult {
    pub tools: Vec<McpTool>,
}

/// `initialize`: negotiate a protocol version, advertise capabilities.
/// Returns `None` for a notification (it never has an id, so this never
/// actually happens for `initialize`, but the check stays consistent with
/// every other handler).
pub fn handle_initialize(request: &JsonRpcRequest) -> Option<JsonRpcResponse> {
    request.id.as_ref()?;

    let requested = request
        .params
        .as_ref()
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str);

    let protocol_version = match requested {
        Some(v) if SUPPORTED_VERSIONS.contains(&v) => v.to_string(),
        Some(v) => {
            info!(requested = v, fallback = SUPPORTED_VERSIONS[0], "unsupported protocol version requested");
            SUPPORTED_VERSIONS[0].to_string()
        }
        None => SUPPORTED_VERSIONS[0].to_string(),
    };

    let result = InitializeResult {
        protocol_version,
        capabilities: json!({ "tools": { "listChanged": false } }),
        server_info: json!({ "name": "memory-mcp", "version": env!("CARGO_PKG_VERSION") }),
    };

    Some(JsonRpcResponse::ok(request.id.clone(), json!(result)))
}

pub fn handle_list_tools(request: &JsonRpcRequest, tools: Vec<McpTool>) -> Option<JsonRpcResponse> {
    request.id.as_ref()?;
    Some(JsonRpcResponse::ok(request.id.clone(), json!(ListToolsResult { tools })))
}

pub fn handle_ping(request: &JsonRpcRequest) -> Option<JsonRpcResponse> {
    request.id.as_ref()?;
    Some(JsonRpcResponse::ok(request.id.clone(), json!({})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn request(id: Option<Value>, method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: Some("2.0".into()),
            id,
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn initialize_negotiates_supported_version() {
        let req = request(Some(json!(1)), "initialize", Some(json!({"protocolVersion": "2024-11-05"})));
        let resp = handle_initialize(&req).unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
    }

    #[test]
    fn initialize_falls_back_to_latest_on_unknown_version() {
        let req = request(Some(json!(1)), "initialize", Some(json!({"protocolVersion": "1999-01-01"})));
        let resp = handle_initialize(&req).unwrap();
        assert_eq!(resp.result.unwrap()["protocolVersion"], SUPPORTED_VERSIONS[0]);
    }

    #[test]
    fn initialize_notification_produces_no_response() {
        let req = request(None, "initialize", None);
        assert!(handle_initialize(&req).is_none());
    }

    #[test]
    fn ping_echoes_empty_result() {
        let req = request(Some(json!(2)), "ping", None);
        let resp = handle_ping(&req).unwrap();
        assert_eq!(resp.result, Some(json!({})));
    }
}
