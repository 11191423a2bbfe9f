//! Handler Registry
//!
//! Routes `<namespace>.<action>` requests to the namespace handlers. Each
//! Google client is built on first use and shared afterwards.

pub mod calendar;
pub mod common;
pub mod directory;
pub mod drive;
pub mod gmail;
pub mod maps;
pub mod wallet;

use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use googleapi::auth::ServiceAccountKey;
use googleapi::{
    CalendarApi, DirectoryApi, DriveApi, Error, Geocoding, GmailApi, HubConfig, Places, WalletApi,
};

use crate::protocol::{JsonRpcRequest, JsonRpcResponse};
use common::HandlerError;

/// Lazily constructed Google clients sharing one configuration
pub struct Hub {
    config: HubConfig,
    key: OnceCell<ServiceAccountKey>,
    directory: OnceCell<DirectoryApi>,
    calendar: OnceCell<CalendarApi>,
    gmail: OnceCell<GmailApi>,
    drive: OnceCell<DriveApi>,
    wallet: OnceCell<WalletApi>,
    places: OnceCell<Places>,
    geocoding: OnceCell<Geocoding>,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            key: OnceCell::new(),
            directory: OnceCell::new(),
            calendar: OnceCell::new(),
            gmail: OnceCell::new(),
            drive: OnceCell::new(),
            wallet: OnceCell::new(),
            places: OnceCell::new(),
            geocoding: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    async fn key(&self) -> Result<ServiceAccountKey, HandlerError> {
        let key = self
            .key
            .get_or_try_init(|| ServiceAccountKey::from_file(&self.config.service_account_file))
            .await?;
        Ok(key.clone())
    }

    pub async fn directory(&self) -> Result<&DirectoryApi, HandlerError> {
        self.directory
            .get_or_try_init(|| async {
                info!("Initialising directory client");
                let key = self.key().await?;
                Ok::<_, HandlerError>(DirectoryApi::from_service_account(
                    key,
                    &self.config.subject,
                    &self.config.domain,
                )?)
            })
            .await
    }

    pub async fn calendar(&self) -> Result<&CalendarApi, HandlerError> {
        self.calendar
            .get_or_try_init(|| async {
                info!("Initialising calendar client");
                let key = self.key().await?;
                Ok::<_, HandlerError>(CalendarApi::from_service_account(key, &self.config.subject)?
                    .with_time_zone(self.config.time_zone.clone()))
            })
            .await
    }

    pub async fn gmail(&self) -> Result<&GmailApi, HandlerError> {
        self.gmail
            .get_or_try_init(|| async {
                info!("Initialising gmail client");
                let key = self.key().await?;
                Ok::<_, HandlerError>(GmailApi::from_service_account(
                    key,
                    self.config.mail_sender(),
                    self.config.mail_reply_address.as_deref(),
                )?)
            })
            .await
    }

    pub async fn drive(&self) -> Result<&DriveApi, HandlerError> {
        self.drive
            .get_or_try_init(|| async {
                info!("Initialising drive client");
                let key = self.key().await?;
                Ok::<_, HandlerError>(DriveApi::from_service_account(key, &self.config.subject)?)
            })
            .await
    }

    pub async fn wallet(&self) -> Result<&WalletApi, HandlerError> {
        self.wallet
            .get_or_try_init(|| async {
                let issuer_id = self
                    .config
                    .wallet_issuer_id
                    .as_deref()
                    .ok_or_else(|| Error::Config("wallet_issuer_id is not configured".to_string()))?;
                info!("Initialising wallet client for issuer {}", issuer_id);
                let key = self.key().await?;
                Ok::<_, HandlerError>(WalletApi::from_service_account(key, issuer_id)?
                    .with_language(self.config.language.clone())
                    .with_origins(self.config.wallet_origins.clone()))
            })
            .await
    }

    fn maps_api_key(&self) -> Result<&str, HandlerError> {
        Ok(self
            .config
            .maps_api_key
            .as_deref()
            .ok_or_else(|| Error::Config("maps_api_key is not configured".to_string()))?)
    }

    pub async fn places(&self) -> Result<&Places, HandlerError> {
        self.places
            .get_or_try_init(|| async { Ok::<_, HandlerError>(Places::new(self.maps_api_key()?)?) })
            .await
    }

    pub async fn geocoding(&self) -> Result<&Geocoding, HandlerError> {
        self.geocoding
            .get_or_try_init(|| async { Ok::<_, HandlerError>(Geocoding::new(self.maps_api_key()?)?) })
            .await
    }

    /// Handle a JSON-RPC request
    pub async fn handle(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone().unwrap_or(Value::Null);

        if let Err(message) = request.validate() {
            return JsonRpcResponse::invalid_request(id, message);
        }

        debug!("Handling method: {}", request.method);
        let (namespace, action) = request.parse_method();
        let params = &request.params;

        let result = match namespace {
            "hub" => match action {
                "ping" => Some(Ok(json!({ "pong": true, "version": env!("CARGO_PKG_VERSION") }))),
                _ => None,
            },
            "directory" => directory::handle(self, action, params).await,
            "calendar" => calendar::handle(self, action, params).await,
            "gmail" => gmail::handle(self, action, params).await,
            "drive" => drive::handle(self, action, params).await,
            "wallet" => wallet::handle(self, action, params).await,
            "maps" => maps::handle(self, action, params).await,
            _ => None,
        };

        match result {
            Some(Ok(value)) => JsonRpcResponse::success(id, value),
            Some(Err(err)) => {
                if let HandlerError::Google(e) = &err {
                    warn!("{} failed: {}", request.method, e);
                }
                err.into_response(id)
            }
            None => JsonRpcResponse::method_not_found(id, &request.method),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use std::path::Path;

    /// A hub whose key file does not exist, so no request ever leaves the process
    pub fn offline_hub(dir: &Path) -> Hub {
        Hub::new(
            serde_json::from_value(json!({
                "service_account_file": dir.join("missing-key.json"),
                "domain": "ingeniumua.be",
                "subject": "admin@ingeniumua.be",
            }))
            .unwrap(),
        )
    }

    pub fn request(method: &str, params: Value) -> JsonRpcRequest {
        serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        }))
        .unwrap()
    }
}
