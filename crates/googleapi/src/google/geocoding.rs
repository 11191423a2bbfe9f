//! Geocoding API client, authenticated with an API key.

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, error, info};

use super::places::coordinates;
use crate::common::{create_http_client, Error, Result};

const GEOCODING_API_BASE: &str = "https://maps.googleapis.com/maps/api/geocode/json";

pub struct Geocoding {
    client: Client,
    base_url: String,
    api_key: String,
}

super::google_api_wrapper!(Geocoding);

impl Geocoding {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: create_http_client()?,
            base_url: GEOCODING_API_BASE.to_string(),
            api_key: api_key.into(),
        })
    }

    /// `(lat, lng)` of the first result for `address`
    pub async fn get_coordinates(&self, address: &str) -> Result<(f64, f64)> {
        info!("Geocoding address: {}", address);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        debug!("Geocoding status: {}", status);
        if status != StatusCode::OK {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            error!("Geocoding request failed: {}", status);
            return Err(Error::Api {
                status: status.as_u16(),
                message: format!("Request failed with status code {}", status.as_u16()),
                details: body,
            });
        }

        let data: Value = response.json().await?;
        let result_status = data.get("status").and_then(Value::as_str).unwrap_or_default();
        if result_status != "OK" {
            return Err(Error::NotFound(format!("Geocoding failed: {}", result_status)));
        }

        let location = data
            .pointer("/results/0/geometry/location")
            .ok_or_else(|| Error::NotFound("Geocoding returned no results".to_string()))?;
        coordinates(location, "lat", "lng")
    }
}
