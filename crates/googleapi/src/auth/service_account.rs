//! Service account key loading and the JWT-bearer token exchange.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::TokenSource;
use crate::common::{create_http_client, Error, Result};

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each assertion; Google caps it at one hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh this long before the cached token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Contents of a service account key file as downloaded from Cloud Console.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub project_id: String,
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    pub client_id: String,
    #[serde(default)]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub auth_provider_x509_cert_url: String,
    #[serde(default)]
    pub client_x509_cert_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub universe_domain: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Read and parse a key file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await? {
            return Err(Error::Credentials(format!(
                "Service account file does not exist: {}",
                path.display()
            )));
        }
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let key: Self = serde_json::from_str(content)
            .map_err(|e| Error::Credentials(format!("Invalid service account file: {}", e)))?;
        if key.key_type != "service_account" {
            return Err(Error::Credentials(format!(
                "Expected a service_account key, got '{}'",
                key.key_type
            )));
        }
        Ok(key)
    }

    fn encoding_key(&self) -> Result<EncodingKey> {
        EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| Error::Credentials(format!("Unusable private key: {}", e)))
    }
}

/// A key plus the scopes and (optional) impersonated subject to request.
#[derive(Debug, Clone)]
pub struct ServiceAccountCredentials {
    pub key: ServiceAccountKey,
    pub scopes: Vec<String>,
    pub subject: Option<String>,
}

/// Bundle a key with scopes and an impersonated subject.
///
/// An empty subject means the service account acts as itself.
pub fn build_service_account_credentials(
    key: ServiceAccountKey,
    scopes: &[&str],
    subject: &str,
) -> ServiceAccountCredentials {
    let subject = subject.trim();
    ServiceAccountCredentials {
        key,
        scopes: scopes.iter().map(|s| s.to_string()).collect(),
        subject: (!subject.is_empty()).then(|| subject.to_string()),
    }
}

/// Sign arbitrary claims with the service account key (RS256, `kid` set).
pub fn sign_jwt<T: Serialize>(key: &ServiceAccountKey, claims: &T) -> Result<String> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(key.private_key_id.clone());
    let token = jsonwebtoken::encode(&header, claims, &key.encoding_key()?)?;
    Ok(token)
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<&'a str>,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Exchanges signed assertions for access tokens and caches the result.
pub struct ServiceAccountTokenSource {
    credentials: ServiceAccountCredentials,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(credentials: ServiceAccountCredentials) -> Result<Self> {
        Ok(Self {
            credentials,
            http: create_http_client()?,
            cached: Mutex::new(None),
        })
    }

    pub fn credentials(&self) -> &ServiceAccountCredentials {
        &self.credentials
    }

    fn build_assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let key = &self.credentials.key;
        let claims = AssertionClaims {
            iss: &key.client_email,
            scope: self.credentials.scopes.join(" "),
            aud: &key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
            sub: self.credentials.subject.as_deref(),
        };
        sign_jwt(key, &claims)
    }

    async fn exchange(&self) -> Result<CachedToken> {
        let now = Utc::now();
        let assertion = self.build_assertion(now)?;

        info!(
            "Requesting access token for {}",
            self.credentials.key.client_email
        );

        let response = self
            .http
            .post(&self.credentials.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!("Token endpoint status: {}", status);

        let (access_token, expires_in) = parse_token_response(&body).map_err(|e| {
            error!("Token exchange failed ({}): {}", status, e);
            e
        })?;

        Ok(CachedToken {
            access_token,
            expires_at: now + Duration::seconds(expires_in),
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > Utc::now() {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.exchange().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }
}

/// Parse an OAuth2 token response into (access_token, expires_in seconds).
fn parse_token_response(body: &str) -> Result<(String, i64)> {
    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| Error::Credentials(format!("Invalid token response: {}", e)))?;

    if let Some(err) = parsed.get("error").and_then(|v| v.as_str()) {
        let desc = parsed
            .get("error_description")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown error");
        return Err(Error::Credentials(format!("{}: {}", err, desc)));
    }

    let access_token = parsed
        .get("access_token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Credentials("Missing access_token in response".to_string()))?
        .to_string();

    let expires_in = parsed
        .get("expires_in")
        .and_then(|v| v.as_i64())
        .unwrap_or(ASSERTION_LIFETIME_SECS);

    Ok((access_token, expires_in))
}
