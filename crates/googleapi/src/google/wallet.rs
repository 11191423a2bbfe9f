//! Google Wallet Objects v1 Client
//!
//! Event tickets: a class describes the event, an object is one ticket of
//! that class. `create_link` produces a "save to Google Wallet" URL signed
//! with the service account key.

use std::path::Path;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::client::GoogleClient;
use super::common::segment;
use crate::auth::{
    build_service_account_credentials, sign_jwt, ServiceAccountKey, ServiceAccountTokenSource,
    TokenSource,
};
use crate::common::Result;

const WALLET_API_BASE: &str = "https://walletobjects.googleapis.com/walletobjects/v1";
const SAVE_URL: &str = "https://pay.google.com/gp/v/save";

pub const WALLET_SCOPES: [&str; 1] = ["https://www.googleapis.com/auth/wallet_object.issuer"];

pub const DEFAULT_LANGUAGE: &str = "nl-BE";

// ── Models ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedString {
    pub language: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizedString {
    pub default_value: TranslatedString,
}

impl LocalizedString {
    pub fn new(language: &str, value: impl Into<String>) -> Self {
        Self {
            default_value: TranslatedString {
                language: language.to_string(),
                value: value.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUri {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub source_uri: ImageUri,
    pub content_description: LocalizedString,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDateTime {
    pub start: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventVenue {
    pub name: LocalizedString,
    pub address: LocalizedString,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventClassModel {
    pub id: String,
    pub event_name: LocalizedString,
    pub issuer_name: String,
    pub review_status: String,
    pub logo: Image,
    pub date_time: EventDateTime,
    pub venue: EventVenue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Barcode {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateOnly {
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: DateOnly,
    pub end: DateOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventObjectModel {
    pub id: String,
    pub class_id: String,
    pub state: String,
    pub hero_image: Image,
    pub barcode: Barcode,
    pub hex_background_color: String,
    pub valid_time_interval: TimeInterval,
    pub ticket_number: String,
}

/// Inputs for [`WalletApi::create_class_body`]
#[derive(Debug, Clone)]
pub struct EventClassSpec {
    pub class_suffix: String,
    pub event_name: String,
    pub issuer_name: String,
    pub logo_url: String,
    pub content_description: String,
    pub event_date: NaiveDateTime,
    pub location_name: String,
}

/// Inputs for [`WalletApi::create_object_body`]
#[derive(Debug, Clone)]
pub struct EventObjectSpec {
    pub object_suffix: String,
    pub class_suffix: String,
    pub banner_link: String,
    pub content_description: String,
    pub qr_code: String,
    pub background_color: String,
    pub end_date: NaiveDateTime,
    pub number: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SavePayload<'a> {
    event_ticket_classes: [&'a Value; 1],
    event_ticket_objects: [&'a Value; 1],
}

#[derive(Serialize)]
struct SaveClaims<'a> {
    iss: &'a str,
    aud: &'static str,
    origins: &'a [String],
    typ: &'static str,
    payload: SavePayload<'a>,
}

// ── API ─────────────────────────────────────────────────────────────────────

pub struct WalletApi {
    client: GoogleClient,
    base_url: String,
    key: ServiceAccountKey,
    issuer_id: String,
    language: String,
    origins: Vec<String>,
}

super::google_api_wrapper!(WalletApi);

/// Build a wallet client for `issuer_id`.
pub async fn create_wallet(service_file: impl AsRef<Path>, issuer_id: &str) -> Result<WalletApi> {
    let key = ServiceAccountKey::from_file(service_file).await?;
    WalletApi::from_service_account(key, issuer_id)
}

impl WalletApi {
    /// `key` signs the save links; `tokens` authorizes the REST calls.
    pub fn new(
        tokens: Arc<dyn TokenSource>,
        key: ServiceAccountKey,
        issuer_id: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client: GoogleClient::new(tokens)?,
            base_url: WALLET_API_BASE.to_string(),
            key,
            issuer_id: issuer_id.into(),
            language: DEFAULT_LANGUAGE.to_string(),
            origins: Vec::new(),
        })
    }

    /// The service account acts as itself; no subject.
    pub fn from_service_account(key: ServiceAccountKey, issuer_id: &str) -> Result<Self> {
        let credentials = build_service_account_credentials(key.clone(), &WALLET_SCOPES, "");
        Self::new(
            Arc::new(ServiceAccountTokenSource::new(credentials)?),
            key,
            issuer_id,
        )
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Web origins allowed to show the save button
    pub fn with_origins(mut self, origins: Vec<String>) -> Self {
        self.origins = origins;
        self
    }

    fn qualified(&self, suffix: &str) -> String {
        format!("{}.{}", self.issuer_id, suffix)
    }

    pub fn create_class_body(&self, spec: &EventClassSpec) -> EventClassModel {
        let lang = self.language.as_str();
        EventClassModel {
            id: self.qualified(&spec.class_suffix),
            event_name: LocalizedString::new(lang, &spec.event_name),
            issuer_name: spec.issuer_name.clone(),
            review_status: "underReview".to_string(),
            logo: Image {
                source_uri: ImageUri {
                    uri: spec.logo_url.clone(),
                },
                content_description: LocalizedString::new(lang, &spec.content_description),
            },
            date_time: EventDateTime {
                start: local_iso(&spec.event_date),
            },
            venue: EventVenue {
                name: LocalizedString::new(lang, &spec.location_name),
                address: LocalizedString::new(lang, &spec.location_name),
            },
        }
    }

    /// Ticket valid from now until `end_date`
    pub fn create_object_body(&self, spec: &EventObjectSpec) -> EventObjectModel {
        EventObjectModel {
            id: self.qualified(&spec.object_suffix),
            class_id: self.qualified(&spec.class_suffix),
            state: "ACTIVE".to_string(),
            hero_image: Image {
                source_uri: ImageUri {
                    uri: spec.banner_link.clone(),
                },
                content_description: LocalizedString::new(&self.language, &spec.content_description),
            },
            barcode: Barcode {
                kind: "QR_CODE".to_string(),
                value: spec.qr_code.clone(),
            },
            hex_background_color: spec.background_color.clone(),
            valid_time_interval: TimeInterval {
                start: DateOnly {
                    date: local_iso(&Local::now().naive_local()),
                },
                end: DateOnly {
                    date: local_iso(&spec.end_date),
                },
            },
            ticket_number: spec.number.to_string(),
        }
    }

    /// Insert the class, or fetch it when it already exists
    pub async fn create_class(&self, class: &EventClassModel) -> Result<Value> {
        info!("Creating wallet class: {}", class.id);
        self.insert_or_get("eventTicketClass", &class.id, &serde_json::to_value(class)?)
            .await
    }

    /// Insert the object, or fetch it when it already exists
    pub async fn create_object(&self, object: &EventObjectModel) -> Result<Value> {
        info!("Creating wallet object: {}", object.id);
        self.insert_or_get("eventTicketObject", &object.id, &serde_json::to_value(object)?)
            .await
    }

    async fn insert_or_get(&self, collection: &str, id: &str, body: &Value) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, collection);
        match self.client.post(&url, &[], body).await {
            Ok(created) => Ok(created),
            Err(e) if e.is_conflict() => {
                debug!("{} {} already exists, fetching it", collection, id);
                self.client.get(&format!("{}/{}", url, segment(id)), &[]).await
            }
            Err(e) => Err(e),
        }
    }

    /// Save-to-wallet URL for one ticket
    pub async fn create_link(
        &self,
        class: &EventClassModel,
        object: &EventObjectModel,
    ) -> Result<String> {
        let class = self.create_class(class).await?;
        let object = self.create_object(object).await?;

        let claims = SaveClaims {
            iss: &self.key.client_email,
            aud: "google",
            origins: &self.origins,
            typ: "savetowallet",
            payload: SavePayload {
                event_ticket_classes: [&class],
                event_ticket_objects: [&object],
            },
        };
        let token = sign_jwt(&self.key, &claims)?;

        info!("Created save link for object {}", str_id(&object));
        Ok(format!("{}/{}", SAVE_URL, token))
    }
}

fn str_id(value: &Value) -> &str {
    value.get("id").and_then(Value::as_str).unwrap_or_default()
}

/// ISO 8601 local date-time, no offset
fn local_iso(value: &NaiveDateTime) -> String {
    value.format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, MockServer};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use axum::http::Method;
    use chrono::NaiveDate;
    use serde_json::json;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    /// Unverified claims of a save link
    fn decode_save_claims(link: &str) -> Option<Value> {
        let token = link.strip_prefix(SAVE_URL)?.trim_start_matches('/');
        let payload = token.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn api(server: &MockServer) -> WalletApi {
        WalletApi::new(
            test_support::static_tokens(),
            test_support::service_account_key(&server.url("/token")),
            "3388000000012345",
        )
        .unwrap()
        .with_origins(vec!["www.ingeniumua.be".to_string()])
        .with_base_url(server.base_url())
    }

    fn class_spec() -> EventClassSpec {
        EventClassSpec {
            class_suffix: "galabal-2026".to_string(),
            event_name: "Galabal".to_string(),
            issuer_name: "Ingenium".to_string(),
            logo_url: "https://ingeniumua.be/logo.png".to_string(),
            content_description: "Logo".to_string(),
            event_date: NaiveDate::from_ymd_opt(2026, 3, 14)
                .unwrap()
                .and_hms_opt(20, 30, 0)
                .unwrap(),
            location_name: "Zaal Kinepolis".to_string(),
        }
    }

    fn object_spec() -> EventObjectSpec {
        EventObjectSpec {
            object_suffix: "ticket-42".to_string(),
            class_suffix: "galabal-2026".to_string(),
            banner_link: "https://ingeniumua.be/banner.png".to_string(),
            content_description: "Banner".to_string(),
            qr_code: "QR-42".to_string(),
            background_color: "#1d3557".to_string(),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 15)
                .unwrap()
                .and_hms_opt(4, 0, 0)
                .unwrap(),
            number: 42,
        }
    }

    #[tokio::test]
    async fn test_class_body_shape() {
        let server = MockServer::start().await;
        let body = serde_json::to_value(api(&server).create_class_body(&class_spec())).unwrap();

        assert_eq!(body["id"], "3388000000012345.galabal-2026");
        assert_eq!(body["reviewStatus"], "underReview");
        assert_eq!(body["dateTime"]["start"], "2026-03-14T20:30:00");
        assert_eq!(body["eventName"]["defaultValue"]["language"], "nl-BE");
        assert_eq!(body["venue"]["address"]["defaultValue"]["value"], "Zaal Kinepolis");
    }

    #[tokio::test]
    async fn test_object_body_shape() {
        let server = MockServer::start().await;
        let body = serde_json::to_value(
            api(&server)
                .with_language("en-US")
                .create_object_body(&object_spec()),
        )
        .unwrap();

        assert_eq!(body["classId"], "3388000000012345.galabal-2026");
        assert_eq!(body["state"], "ACTIVE");
        assert_eq!(body["barcode"]["type"], "QR_CODE");
        assert_eq!(body["ticketNumber"], "42");
        assert_eq!(body["validTimeInterval"]["end"]["date"], "2026-03-15T04:00:00");
        assert_eq!(body["heroImage"]["contentDescription"]["defaultValue"]["language"], "en-US");
        assert!(!body["validTimeInterval"]["start"]["date"]
            .as_str()
            .unwrap()
            .contains('+'));
    }

    #[tokio::test]
    async fn test_create_class_fetches_existing_on_conflict() {
        let server = MockServer::start().await;
        server.on(
            Method::POST,
            "/eventTicketClass",
            409,
            json!({"error": {"code": 409, "message": "Resource already exists"}}),
        );
        server.on(
            Method::GET,
            "/eventTicketClass/3388000000012345.galabal-2026",
            200,
            json!({"id": "3388000000012345.galabal-2026", "reviewStatus": "approved"}),
        );

        let api = api(&server);
        let class = api.create_class(&api.create_class_body(&class_spec())).await.unwrap();
        assert_eq!(class["reviewStatus"], "approved");
    }

    #[tokio::test]
    async fn test_create_object_other_errors_propagate() {
        let server = MockServer::start().await;
        server.on(
            Method::POST,
            "/eventTicketObject",
            400,
            json!({"error": {"code": 400, "message": "Invalid class id"}}),
        );

        let api = api(&server);
        let err = api
            .create_object(&api.create_object_body(&object_spec()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(server.requests_to(Method::GET, "/eventTicketObject/3388000000012345.ticket-42").is_empty());
    }

    #[tokio::test]
    async fn test_create_link_is_signed() {
        let server = MockServer::start().await;
        server.on(
            Method::POST,
            "/eventTicketClass",
            200,
            json!({"id": "3388000000012345.galabal-2026"}),
        );
        server.on(
            Method::POST,
            "/eventTicketObject",
            200,
            json!({"id": "3388000000012345.ticket-42"}),
        );

        let api = api(&server);
        let link = api
            .create_link(
                &api.create_class_body(&class_spec()),
                &api.create_object_body(&object_spec()),
            )
            .await
            .unwrap();
        assert!(link.starts_with("https://pay.google.com/gp/v/save/"));

        let token = link.trim_start_matches("https://pay.google.com/gp/v/save/");
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&["google"]);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        let decoded = decode::<Value>(
            token,
            &DecodingKey::from_rsa_pem(test_support::TEST_PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.header.kid.as_deref(), Some("test-key-id"));
        let claims = decoded.claims;
        assert_eq!(claims["iss"], "hub@ingenium-test.iam.gserviceaccount.com");
        assert_eq!(claims["typ"], "savetowallet");
        assert_eq!(claims["origins"][0], "www.ingeniumua.be");
        assert_eq!(
            claims["payload"]["eventTicketObjects"][0]["id"],
            "3388000000012345.ticket-42"
        );
        assert_eq!(
            decode_save_claims(&link).unwrap()["aud"],
            "google"
        );
    }
}
