//! In-process Google stand-in for unit tests.
//!
//! Binds an axum server on an ephemeral port, answers with canned JSON per
//! (method, path) and records every request it receives.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::Value;

use crate::auth::{ServiceAccountKey, StaticToken, TokenSource};
use crate::google::client::GoogleClient;

pub const TEST_PRIVATE_KEY: &str = include_str!("../testdata/test_key.pem");
pub const TEST_PUBLIC_KEY: &str = include_str!("../testdata/test_key.pub.pem");

pub fn service_account_key(token_uri: &str) -> ServiceAccountKey {
    ServiceAccountKey {
        key_type: "service_account".to_string(),
        project_id: "ingenium-test".to_string(),
        private_key_id: "test-key-id".to_string(),
        private_key: TEST_PRIVATE_KEY.to_string(),
        client_email: "hub@ingenium-test.iam.gserviceaccount.com".to_string(),
        client_id: "1234567890".to_string(),
        auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
        token_uri: token_uri.to_string(),
        auth_provider_x509_cert_url: String::new(),
        client_x509_cert_url: String::new(),
        universe_domain: Some("googleapis.com".to_string()),
    }
}

pub fn static_tokens() -> Arc<dyn TokenSource> {
    Arc::new(StaticToken::new("test-token"))
}

pub fn client() -> GoogleClient {
    GoogleClient::new(static_tokens()).unwrap()
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    /// Decoded query parameter (first occurrence)
    pub fn param(&self, key: &str) -> Option<String> {
        self.query.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            if k == key {
                Some(
                    urlencoding::decode(&v.replace('+', " "))
                        .map(|s| s.into_owned())
                        .unwrap_or_default(),
                )
            } else {
                None
            }
        })
    }
}

#[derive(Clone)]
struct Canned {
    status: u16,
    body: Bytes,
}

#[derive(Default)]
struct MockState {
    routes: Mutex<HashMap<(Method, String), VecDeque<Canned>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

pub struct MockServer {
    base_url: String,
    state: Arc<MockState>,
}

impl MockServer {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let router = Router::new().fallback(respond).with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Queue a JSON response. Repeated registrations for the same route are
    /// served in order; the last one keeps answering.
    pub fn on(&self, method: Method, path: &str, status: u16, body: Value) {
        self.on_raw(method, path, status, Bytes::from(body.to_string()));
    }

    pub fn on_raw(&self, method: Method, path: &str, status: u16, body: impl Into<Bytes>) {
        self.state
            .routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(Canned {
                status,
                body: body.into(),
            });
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }
}

async fn respond(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = urlencoding::decode(uri.path())
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| uri.path().to_string());
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().unwrap_or_default().to_string(),
        headers,
        body,
    });

    let canned = {
        let mut routes = state.routes.lock().unwrap();
        routes.get_mut(&(method, path)).and_then(|queue| {
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        })
    };

    match canned {
        Some(c) => (
            StatusCode::from_u16(c.status).unwrap(),
            [(header::CONTENT_TYPE, "application/json")],
            c.body,
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "application/json")],
            r#"{"error":{"code":404,"message":"No canned response"}}"#,
        )
            .into_response(),
    }
}
