//! Service Account Authentication
//!
//! Google Workspace APIs are called server-to-server: a service account key
//! signs a JWT assertion which is exchanged for a short-lived access token,
//! optionally impersonating a domain user (domain-wide delegation).
//!
//! Every API wrapper receives its tokens through the [`TokenSource`] trait so
//! the exchange can be swapped out (static tokens in tests, a different
//! credential flow in another deployment).

pub mod crypt;
pub mod service_account;

use async_trait::async_trait;

use crate::common::Result;

pub use crypt::hash_password;
pub use service_account::{
    build_service_account_credentials, sign_jwt, ServiceAccountCredentials, ServiceAccountKey,
    ServiceAccountTokenSource,
};

/// Something that can hand out a bearer token for Google APIs.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Return a currently valid access token.
    async fn access_token(&self) -> Result<String>;
}

/// A fixed access token, e.g. one obtained out of band.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
