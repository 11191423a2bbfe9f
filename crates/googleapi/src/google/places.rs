//! Places API (New) text search, authenticated with an API key.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::common::{create_http_client, Error, Result};

const PLACES_API_BASE: &str = "https://places.googleapis.com/v1/places";

pub struct Places {
    client: Client,
    base_url: String,
    api_key: String,
}

super::google_api_wrapper!(Places);

impl Places {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: create_http_client()?,
            base_url: PLACES_API_BASE.to_string(),
            api_key: api_key.into(),
        })
    }

    /// `(latitude, longitude)` of the best match for `place`
    pub async fn get_coordinates_from_place(&self, place: &str) -> Result<(f64, f64)> {
        info!("Searching place: {}", place);

        let url = format!("{}:searchText", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", "places.location")
            .json(&json!({ "textQuery": place }))
            .send()
            .await?;

        let status = response.status();
        debug!("Places status: {}", status);
        if status != StatusCode::OK {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            error!("Places search failed: {}", status);
            return Err(Error::Api {
                status: status.as_u16(),
                message: format!("Request failed with status code {}", status.as_u16()),
                details: body,
            });
        }

        let data: Value = response.json().await?;
        let location = data
            .get("places")
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("location"))
            .ok_or_else(|| Error::NotFound("No location found for the given place.".to_string()))?;

        coordinates(location, "latitude", "longitude")
    }
}

/// Read a lat/lng pair out of a location object
pub(crate) fn coordinates(location: &Value, lat: &str, lng: &str) -> Result<(f64, f64)> {
    match (
        location.get(lat).and_then(Value::as_f64),
        location.get(lng).and_then(Value::as_f64),
    ) {
        (Some(lat), Some(lng)) => Ok((lat, lng)),
        _ => Err(Error::NotFound("Location has no coordinates".to_string())),
    }
}
