//! Google API Authenticated HTTP Client
//!
//! Injects bearer tokens from a [`TokenSource`] into every request.
//! Handles pagination, rate limiting, and error responses according to Google API
//! REST conventions.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::auth::TokenSource;
use crate::common::{create_http_client, Error, Result};

pub type Query<'a> = [(&'a str, String)];

/// Google API HTTP client with bearer token injection
#[derive(Clone)]
pub struct GoogleClient {
    client: Client,
    tokens: Arc<dyn TokenSource>,
}

impl GoogleClient {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Result<Self> {
        Ok(Self {
            client: create_http_client()?,
            tokens,
        })
    }

    async fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.tokens.access_token().await?;
        Ok(builder.bearer_auth(token))
    }

    /// Make an authenticated GET request
    pub async fn get(&self, url: &str, query: &Query<'_>) -> Result<Value> {
        let builder = self.authorized(self.client.get(url).query(query)).await?;
        self.execute_request(builder).await
    }

    /// GET returning the raw body (media downloads)
    pub async fn get_bytes(&self, url: &str, query: &Query<'_>) -> Result<Vec<u8>> {
        let builder = self.authorized(self.client.get(url).query(query)).await?;
        let response = builder.send().await?;
        let status = response.status();
        debug!("Response status: {}", status);

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Rate limited by Google API");
            return Err(Error::RateLimited);
        }

        let body = response.bytes().await?;
        if !status.is_success() {
            let parsed = serde_json::from_slice(&body).unwrap_or(Value::Null);
            return Err(api_error(&parsed, status));
        }
        Ok(body.to_vec())
    }

    /// Make an authenticated POST request with JSON body
    pub async fn post(&self, url: &str, query: &Query<'_>, body: &Value) -> Result<Value> {
        let builder = self
            .authorized(self.client.post(url).query(query).json(body))
            .await?;
        self.execute_request(builder).await
    }

    /// Make an authenticated PUT request with JSON body
    pub async fn put(&self, url: &str, body: &Value) -> Result<Value> {
        let builder = self.authorized(self.client.put(url).json(body)).await?;
        self.execute_request(builder).await
    }

    /// Make an authenticated PATCH request with JSON body
    pub async fn patch(&self, url: &str, query: &Query<'_>, body: &Value) -> Result<Value> {
        let builder = self
            .authorized(self.client.patch(url).query(query).json(body))
            .await?;
        self.execute_request(builder).await
    }

    /// Make an authenticated DELETE request
    pub async fn delete(&self, url: &str, query: &Query<'_>) -> Result<Value> {
        let builder = self.authorized(self.client.delete(url).query(query)).await?;
        self.execute_request(builder).await
    }

    /// Upload JSON metadata plus media in one `multipart/related` request
    pub async fn post_related(
        &self,
        url: &str,
        query: &Query<'_>,
        metadata: &Value,
        mime_type: &str,
        content: &[u8],
    ) -> Result<Value> {
        let boundary = random_boundary();
        let body = related_body(&boundary, metadata, mime_type, content);

        let builder = self
            .client
            .post(url)
            .query(query)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body);
        let builder = self.authorized(builder).await?;
        self.execute_request(builder).await
    }

    /// Execute a request and handle Google API response patterns
    async fn execute_request(&self, builder: RequestBuilder) -> Result<Value> {
        debug!("Executing Google API request");

        let response = builder.send().await?;
        let status = response.status();
        debug!("Response status: {}", status);

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Rate limited by Google API");
            return Err(Error::RateLimited);
        }

        let body = response.text().await?;

        // Empty successful responses (e.g., DELETE)
        if status.is_success() && body.is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }

        if !status.is_success() {
            let parsed = serde_json::from_str(&body).unwrap_or(Value::String(body));
            let err = api_error(&parsed, status);
            error!("{}", err);
            return Err(err);
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Follow `nextPageToken` and collect the items stored under `field`
    pub async fn get_paginated(
        &self,
        url: &str,
        base_query: &Query<'_>,
        field: &str,
        max_results: Option<usize>,
    ) -> Result<Vec<Value>> {
        let mut all_items = Vec::new();
        let mut page_token: Option<String> = None;
        let remaining = max_results.unwrap_or(usize::MAX);

        loop {
            let mut query = base_query.to_vec();
            if let Some(ref token) = page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self.get(url, &query).await?;

            if let Some(items) = response.get(field).and_then(|v| v.as_array()) {
                all_items.extend(items.iter().cloned());

                if all_items.len() >= remaining {
                    all_items.truncate(remaining);
                    break;
                }
            }

            match response.get("nextPageToken").and_then(|v| v.as_str()) {
                Some(next) => page_token = Some(next.to_string()),
                None => break,
            }
        }

        Ok(all_items)
    }
}

/// Build an [`Error::Api`] from a Google error response
///
/// Google APIs return errors in this format:
/// `{"error": {"code": 400, "message": "Invalid request", "errors": [...]}}`
pub(crate) fn api_error(response: &Value, status: StatusCode) -> Error {
    let error_obj = response.get("error");

    let message = error_obj
        .and_then(|e| e.get("message"))
        .and_then(|v| v.as_str())
        .map(String::from)
        .unwrap_or_else(|| format!("HTTP {} error", status));

    Error::Api {
        status: status.as_u16(),
        message,
        details: error_obj.cloned().unwrap_or_else(|| response.clone()),
    }
}

fn random_boundary() -> String {
    let tail: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect();
    format!("googleapi_{}", tail)
}

fn related_body(boundary: &str, metadata: &Value, mime_type: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, MockServer};
    use axum::http::Method;
    use serde_json::json;

    #[test]
    fn test_api_error_message() {
        let error_response = json!({
            "error": {
                "code": 400,
                "message": "Invalid request format"
            }
        });

        let err = api_error(&error_response, StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("Invalid request format"));
        assert_eq!(err.details()["error"]["code"], 400);
    }

    #[test]
    fn test_api_error_fallback() {
        let err = api_error(&Value::Null, StatusCode::BAD_GATEWAY);
        assert_eq!(err.status_code(), 502);
        assert!(err.to_string().contains("HTTP 502"));
    }

    #[test]
    fn test_related_body_layout() {
        let body = related_body("b", &json!({"name": "a.txt"}), "text/plain", b"hello");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--b\r\nContent-Type: application/json"));
        assert!(text.contains("{\"name\":\"a.txt\"}"));
        assert!(text.contains("Content-Type: text/plain\r\n\r\nhello\r\n--b--"));
    }

    #[tokio::test]
    async fn test_bearer_token_and_empty_body() {
        let server = MockServer::start().await;
        server.on_raw(Method::DELETE, "/thing", 204, "");

        let client = test_support::client();
        let value = client.delete(&server.url("/thing"), &[]).await.unwrap();
        assert_eq!(value, json!({}));

        let request = &server.requests()[0];
        assert_eq!(
            request.headers.get("authorization").unwrap(),
            "Bearer test-token"
        );
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let server = MockServer::start().await;
        server.on(Method::GET, "/busy", 429, json!({}));

        let err = test_support::client()
            .get(&server.url("/busy"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RateLimited));
    }

    #[tokio::test]
    async fn test_pagination_follows_tokens() {
        let server = MockServer::start().await;
        server.on(
            Method::GET,
            "/list",
            200,
            json!({"users": [{"id": "1"}, {"id": "2"}], "nextPageToken": "p2"}),
        );
        server.on(Method::GET, "/list", 200, json!({"users": [{"id": "3"}]}));

        let items = test_support::client()
            .get_paginated(&server.url("/list"), &[("domain", "ingeniumua.be".into())], "users", None)
            .await
            .unwrap();
        assert_eq!(items.len(), 3);

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].param("pageToken").as_deref(), Some("p2"));
        assert_eq!(requests[1].param("domain").as_deref(), Some("ingeniumua.be"));
    }

    #[tokio::test]
    async fn test_pagination_respects_cap() {
        let server = MockServer::start().await;
        server.on(
            Method::GET,
            "/list",
            200,
            json!({"items": [1, 2, 3], "nextPageToken": "more"}),
        );

        let items = test_support::client()
            .get_paginated(&server.url("/list"), &[], "items", Some(2))
            .await
            .unwrap();
        assert_eq!(items, vec![json!(1), json!(2)]);
        assert_eq!(server.requests().len(), 1);
    }
}
