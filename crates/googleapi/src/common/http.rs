//! HTTP Client Utilities
//!
//! Shared HTTP client creation with consistent configuration.

use std::time::Duration;

use super::Result;

/// Create a reqwest HTTP client with standard configuration
///
/// - 30 second timeout
/// - 10 second connect timeout
/// - Reusable across requests
pub fn create_http_client() -> Result<reqwest::Client> {
    create_http_client_with_timeout(30)
}

/// Create a reqwest HTTP client with custom timeout
pub fn create_http_client_with_timeout(timeout_secs: u64) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    Ok(client)
}
