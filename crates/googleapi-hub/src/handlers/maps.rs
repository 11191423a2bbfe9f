//! Maps Handler (Places text search and Geocoding)

use serde_json::{json, Value};

use super::common::*;
use super::Hub;

pub async fn handle(hub: &Hub, action: &str, params: &Value) -> Option<HandlerResult> {
    let result = match action {
        "place_coordinates" | "placeCoordinates" => place_coordinates(hub, params).await,
        "geocode" => geocode(hub, params).await,
        _ => return None,
    };
    Some(result)
}

fn coordinates((lat, lng): (f64, f64)) -> Value {
    json!({ "lat": lat, "lng": lng })
}

async fn place_coordinates(hub: &Hub, params: &Value) -> HandlerResult {
    let place = require_string(params, "place")?;
    let found = hub.places().await?.get_coordinates_from_place(place).await?;
    Ok(coordinates(found))
}

async fn geocode(hub: &Hub, params: &Value) -> HandlerResult {
    let address = require_string(params, "address")?;
    let found = hub.geocoding().await?.get_coordinates(address).await?;
    Ok(coordinates(found))
}
