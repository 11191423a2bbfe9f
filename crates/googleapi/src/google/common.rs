//! Shared utilities for Google API modules
//!
//! Reduces duplication across Directory, Calendar, Drive and Wallet clients.

use serde_json::Value;

use crate::common::{Error, Result};

/// Extract an array field from a JSON response, returning an empty vec if missing.
pub fn extract_array(response: &Value, field: &str) -> Vec<Value> {
    response
        .get(field)
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

/// Read a string at a JSON pointer (`/name/givenName`), empty when absent.
pub fn str_at(value: &Value, pointer: &str) -> String {
    value
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Percent-encode one URL path segment (calendar IDs contain `@` and `#`).
pub fn segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

/// The domain part of an email address, if it has one.
pub fn email_domain(email: &str) -> Option<&str> {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|d| !d.is_empty())
}

/// Reject addresses outside the managed domain.
pub fn require_domain(email: &str, domain: &str) -> Result<()> {
    match email_domain(email) {
        Some(d) if d.eq_ignore_ascii_case(domain) => Ok(()),
        _ => Err(Error::invalid(format!("Domain is not {}", domain))),
    }
}
