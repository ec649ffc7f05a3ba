//! Strict newline-delimited JSON-RPC 2.0 framing (spec.md §6). Unlike the
//! teacher's LSP-compatible `Content-Length:` fallback, this transport
//! speaks exactly one framing: one JSON object per line, in and out.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, BufRead, Write};

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_none() || matches!(self.id, Some(Value::Null))
    }
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    #[must_use]
    pub fn ok(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn err(id: Option<Value>, code: i32, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// Read one non-empty line from `reader`. Returns `Ok(None)` on EOF.
pub fn read_next_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        return Ok(Some(trimmed.to_string()));
    }
}

/// Write one response as a single line, flushing immediately so a
/// concurrently-running writer never observes a half-written line.
pub fn write_line<W: Write>(writer: &mut W, body: &str) -> io::Result<()> {
    writeln!(writer, "{body}")?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_with_null_id_is_a_notification() {
        let req = JsonRpcRequest {
            jsonrpc: Some("2.0".into()),
            id: Some(Value::Null),
            method: "ping".into(),
            params: None,
        };
        assert!(req.is_notification());
    }

    #[test]
    fn request_with_missing_id_is_a_notification() {
        let req = JsonRpcRequest {
            jsonrpc: None,
            id: None,
            method: "notifications/initialized".into(),
            params: None,
        };
        assert!(req.is_notification());
    }

    #[test]
    fn request_with_id_is_not_a_notification() {
        let req = JsonRpcRequest {
            jsonrpc: Some("2.0".into()),
            id: Some(Value::from(1)),
            method: "ping".into(),
            params: None,
        };
        assert!(!req.is_notification());
    }

    #[test]
    fn read_next_line_skips_blank_lines() {
        let input = b"\n\n{\"a\":1}\n";
        let mut reader = &input[..];
        let line = read_next_line(&mut reader).unwrap();
        assert_eq!(line, Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn read_next_line_returns_none_at_eof() {
        let input = b"";
        let mut reader = &input[..];
        assert_eq!(read_next_line(&mut reader).unwrap(), None);
    }
}
