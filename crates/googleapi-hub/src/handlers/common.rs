//! Common Handler Utilities
//!
//! Parameter extraction with camelCase / snake_case aliases, and the error
//! type every namespace handler returns.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::protocol::JsonRpcResponse;

/// Why a handler could not produce a result
#[derive(Debug)]
pub enum HandlerError {
    InvalidParams(String),
    Google(googleapi::Error),
}

impl From<googleapi::Error> for HandlerError {
    fn from(err: googleapi::Error) -> Self {
        Self::Google(err)
    }
}

impl HandlerError {
    pub fn into_response(self, id: Value) -> JsonRpcResponse {
        match self {
            Self::InvalidParams(message) => JsonRpcResponse::invalid_params(id, message),
            Self::Google(err) => JsonRpcResponse::google_error(id, &err),
        }
    }
}

pub type HandlerResult = Result<Value, HandlerError>;

fn lookup<'a>(params: &'a Value, primary: &str, fallback: &str) -> Option<&'a Value> {
    params
        .get(primary)
        .or_else(|| params.get(fallback))
        .filter(|v| !v.is_null())
}

fn missing(primary: &str, fallback: &str) -> HandlerError {
    if primary == fallback {
        HandlerError::InvalidParams(format!("Missing required parameter: {}", primary))
    } else {
        HandlerError::InvalidParams(format!(
            "Missing required parameter: {} (or {})",
            primary, fallback
        ))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Parameter Extraction Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Extract a required string parameter with alias fallback
pub fn require_string_or<'a>(
    params: &'a Value,
    primary: &str,
    fallback: &str,
) -> Result<&'a str, HandlerError> {
    lookup(params, primary, fallback)
        .and_then(|v| v.as_str())
        .ok_or_else(|| missing(primary, fallback))
}

pub fn require_string<'a>(params: &'a Value, key: &str) -> Result<&'a str, HandlerError> {
    require_string_or(params, key, key)
}

/// Extract an optional string parameter with alias fallback
pub fn optional_string_or<'a>(params: &'a Value, primary: &str, fallback: &str) -> Option<&'a str> {
    lookup(params, primary, fallback).and_then(|v| v.as_str())
}

pub fn optional_string<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    optional_string_or(params, key, key)
}

pub fn string_or_default<'a>(params: &'a Value, primary: &str, fallback: &str) -> &'a str {
    optional_string_or(params, primary, fallback).unwrap_or_default()
}

pub fn bool_with_default(params: &Value, primary: &str, fallback: &str, default: bool) -> bool {
    lookup(params, primary, fallback)
        .and_then(|v| v.as_bool())
        .unwrap_or(default)
}

pub fn optional_u64_or(params: &Value, primary: &str, fallback: &str) -> Option<u64> {
    lookup(params, primary, fallback).and_then(|v| v.as_u64())
}

pub fn require_u64_or(params: &Value, primary: &str, fallback: &str) -> Result<u64, HandlerError> {
    optional_u64_or(params, primary, fallback).ok_or_else(|| missing(primary, fallback))
}

/// Extract an array of strings; a single string counts as a one-element list
pub fn require_string_list(params: &Value, key: &str) -> Result<Vec<String>, HandlerError> {
    match params.get(key) {
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) if !items.is_empty() => items
            .iter()
            .map(|v| {
                v.as_str().map(String::from).ok_or_else(|| {
                    HandlerError::InvalidParams(format!("'{}' must contain only strings", key))
                })
            })
            .collect(),
        _ => Err(missing(key, key)),
    }
}

/// RFC 3339 timestamp with offset
pub fn require_datetime_or(
    params: &Value,
    primary: &str,
    fallback: &str,
) -> Result<DateTime<FixedOffset>, HandlerError> {
    parse_datetime(primary, require_string_or(params, primary, fallback)?)
}

pub fn optional_datetime_or(
    params: &Value,
    primary: &str,
    fallback: &str,
) -> Result<Option<DateTime<FixedOffset>>, HandlerError> {
    optional_string_or(params, primary, fallback)
        .map(|raw| parse_datetime(primary, raw))
        .transpose()
}

fn parse_datetime(key: &str, raw: &str) -> Result<DateTime<FixedOffset>, HandlerError> {
    DateTime::parse_from_rfc3339(raw).map_err(|e| {
        HandlerError::InvalidParams(format!("'{}' is not an RFC 3339 timestamp: {}", key, e))
    })
}

/// Local date-time without offset (`2026-03-14T20:30:00`)
pub fn require_local_datetime_or(
    params: &Value,
    primary: &str,
    fallback: &str,
) -> Result<NaiveDateTime, HandlerError> {
    let raw = require_string_or(params, primary, fallback)?;
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .map_err(|e| {
            HandlerError::InvalidParams(format!("'{}' is not a local date-time: {}", primary, e))
        })
}

/// Base64 payload (file contents)
pub fn require_base64(params: &Value, key: &str) -> Result<Vec<u8>, HandlerError> {
    STANDARD
        .decode(require_string(params, key)?)
        .map_err(|e| HandlerError::InvalidParams(format!("'{}' is not valid base64: {}", key, e)))
}

/// Deserialize a nested object parameter
pub fn require_object<T: DeserializeOwned>(params: &Value, key: &str) -> Result<T, HandlerError> {
    let value = lookup(params, key, key).ok_or_else(|| missing(key, key))?;
    serde_json::from_value(value.clone())
        .map_err(|e| HandlerError::InvalidParams(format!("Invalid '{}': {}", key, e)))
}

/// Parse a string parameter through `FromStr`, mapping library errors to params errors
pub fn parse_param<T>(raw: &str) -> Result<T, HandlerError>
where
    T: std::str::FromStr<Err = googleapi::Error>,
{
    raw.parse::<T>()
        .map_err(|e| HandlerError::InvalidParams(e.to_string()))
}

// ────────────────────────────────────────────────────────────────────────────
// Response Helpers
// ────────────────────────────────────────────────────────────────────────────

pub fn simple_success() -> HandlerResult {
    Ok(serde_json::json!({ "success": true }))
}

pub fn list_with_count(field: &str, items: Vec<Value>) -> HandlerResult {
    let mut body = serde_json::Map::new();
    body.insert("count".to_string(), Value::from(items.len()));
    body.insert(field.to_string(), Value::Array(items));
    Ok(Value::Object(body))
}
