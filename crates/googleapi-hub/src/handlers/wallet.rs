//! Wallet Handler
//!
//! Builds event ticket bodies and save links.

use serde_json::{json, Value};
use tracing::info;

use googleapi::google::wallet::{EventClassModel, EventClassSpec, EventObjectModel, EventObjectSpec};

use super::common::*;
use super::Hub;

pub async fn handle(hub: &Hub, action: &str, params: &Value) -> Option<HandlerResult> {
    let result = match action {
        "create_class_body" | "createClassBody" => create_class_body(hub, params).await,
        "create_object_body" | "createObjectBody" => create_object_body(hub, params).await,
        "create_class" | "createClass" => create_class(hub, params).await,
        "create_object" | "createObject" => create_object(hub, params).await,
        "create_link" | "createLink" => create_link(hub, params).await,
        _ => return None,
    };
    Some(result)
}

fn class_spec(params: &Value) -> Result<EventClassSpec, HandlerError> {
    Ok(EventClassSpec {
        class_suffix: require_string_or(params, "classSuffix", "class_suffix")?.to_string(),
        event_name: require_string_or(params, "eventName", "event_name")?.to_string(),
        issuer_name: require_string_or(params, "issuerName", "issuer_name")?.to_string(),
        logo_url: require_string_or(params, "logoUrl", "logo_url")?.to_string(),
        content_description: string_or_default(params, "contentDescription", "content_description")
            .to_string(),
        event_date: require_local_datetime_or(params, "eventDate", "event_date")?,
        location_name: require_string_or(params, "locationName", "location_name")?.to_string(),
    })
}

fn object_spec(params: &Value) -> Result<EventObjectSpec, HandlerError> {
    Ok(EventObjectSpec {
        object_suffix: require_string_or(params, "objectSuffix", "object_suffix")?.to_string(),
        class_suffix: require_string_or(params, "classSuffix", "class_suffix")?.to_string(),
        banner_link: require_string_or(params, "bannerLink", "banner_link")?.to_string(),
        content_description: string_or_default(params, "contentDescription", "content_description")
            .to_string(),
        qr_code: require_string_or(params, "qrCode", "qr_code")?.to_string(),
        background_color: require_string_or(params, "backgroundColor", "background_color")?
            .to_string(),
        end_date: require_local_datetime_or(params, "endDate", "end_date")?,
        number: require_u64_or(params, "number", "ticket_number")?,
    })
}

async fn create_class_body(hub: &Hub, params: &Value) -> HandlerResult {
    let spec = class_spec(params)?;
    let body = hub.wallet().await?.create_class_body(&spec);
    Ok(serde_json::to_value(body).map_err(googleapi::Error::from)?)
}

async fn create_object_body(hub: &Hub, params: &Value) -> HandlerResult {
    let spec = object_spec(params)?;
    let body = hub.wallet().await?.create_object_body(&spec);
    Ok(serde_json::to_value(body).map_err(googleapi::Error::from)?)
}

async fn create_class(hub: &Hub, params: &Value) -> HandlerResult {
    let class: EventClassModel = require_object(params, "class")?;
    Ok(hub.wallet().await?.create_class(&class).await?)
}

async fn create_object(hub: &Hub, params: &Value) -> HandlerResult {
    let object: EventObjectModel = require_object(params, "object")?;
    Ok(hub.wallet().await?.create_object(&object).await?)
}

async fn create_link(hub: &Hub, params: &Value) -> HandlerResult {
    let class: EventClassModel = require_object(params, "class")?;
    let object: EventObjectModel = require_object(params, "object")?;

    info!("Handling wallet.create_link for {}", object.id);
    let link = hub.wallet().await?.create_link(&class, &object).await?;
    Ok(json!({ "link": link }))
}
