//! JSON-RPC 2.0 Protocol Implementation
//!
//! One request per stdin line, one response per stdout line.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version (must be "2.0")
    pub jsonrpc: String,

    /// Request ID for correlating responses
    #[serde(default)]
    pub id: Option<Value>,

    /// Method name (e.g., "directory.get_user", "calendar.addEvent")
    pub method: String,

    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    /// Check if this is a notification (no id = no response expected)
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.jsonrpc != "2.0" {
            return Err("Invalid JSON-RPC version, expected '2.0'".to_string());
        }
        if self.method.is_empty() {
            return Err("Method cannot be empty".to_string());
        }
        Ok(())
    }

    /// Parse method into namespace and action
    /// e.g., "drive.get_file" -> ("drive", "get_file")
    pub fn parse_method(&self) -> (&str, &str) {
        self.method
            .split_once('.')
            .unwrap_or((self.method.as_str(), ""))
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,

    /// Request ID (copied from request)
    pub id: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>, data: Option<Value>) -> Self {
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

    /// Create a parse error response (for malformed JSON)
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error(Value::Null, error_codes::PARSE_ERROR, message, None)
    }

    pub fn invalid_request(id: Value, message: impl Into<String>) -> Self {
        Self::error(id, error_codes::INVALID_REQUEST, message, None)
    }

    pub fn method_not_found(id: Value, method: &str) -> Self {
        Self::error(
            id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
            None,
        )
    }

    pub fn invalid_params(id: Value, message: impl Into<String>) -> Self {
        Self::error(id, error_codes::INVALID_PARAMS, message, None)
    }

    /// A failed Google call; `data` carries the HTTP status and Google's detail
    pub fn google_error(id: Value, err: &googleapi::Error) -> Self {
        let mut data = err.details();
        if let Some(obj) = data.as_object_mut() {
            obj.insert("status".to_string(), json!(err.status_code()));
        }
        Self::error(id, error_codes::GOOGLE_ERROR, err.to_string(), Some(data))
    }
}

/// JSON-RPC 2.0 Error Object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const GOOGLE_ERROR: i32 = -32000;
}
