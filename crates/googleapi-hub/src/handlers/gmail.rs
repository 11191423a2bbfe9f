//! Gmail Handler

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use tracing::info;

use googleapi::google::gmail::Attachment;

use super::common::*;
use super::Hub;

pub async fn handle(hub: &Hub, action: &str, params: &Value) -> Option<HandlerResult> {
    let result = match action {
        "send_message" | "sendMessage" | "send" => send_message(hub, params).await,
        _ => return None,
    };
    Some(result)
}

/// `{"path", "filename"}` or `{"data" (base64), "filename", "mimeMaintype", "mimeSubtype"}`
fn parse_attachment(value: &Value) -> Result<Attachment, HandlerError> {
    let filename = require_string(value, "filename")?;

    if let Some(path) = optional_string(value, "path") {
        return Ok(Attachment::from_path(path, filename));
    }

    let data = STANDARD
        .decode(require_string(value, "data")?)
        .map_err(|e| HandlerError::InvalidParams(format!("Attachment data is not base64: {}", e)))?;
    let maintype = require_string_or(value, "mimeMaintype", "mime_maintype")?;
    let subtype = require_string_or(value, "mimeSubtype", "mime_subtype")?;
    Ok(Attachment::from_bytes(data, filename, maintype, subtype))
}

async fn send_message(hub: &Hub, params: &Value) -> HandlerResult {
    let receivers = require_string_list(params, "receivers")?;
    let subject = require_string(params, "subject")?;
    let html = require_string_or(params, "html", "message")?;
    let attachments = params
        .get("attachments")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(parse_attachment).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();

    info!(
        "Handling gmail.send_message to {} receivers ({} attachments)",
        receivers.len(),
        attachments.len()
    );
    let sent = hub
        .gmail()
        .await?
        .send_message(&receivers, subject, html, &attachments)
        .await?;
    Ok(json!({ "success": true, "messages": sent }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path_attachment() {
        let attachment =
            parse_attachment(&json!({"path": "/tmp/statutes.pdf", "filename": "statutes.pdf"}))
                .unwrap();
        assert!(matches!(attachment, Attachment::Path { ref filename, .. } if filename == "statutes.pdf"));
    }

    #[test]
    fn test_parse_bytes_attachment() {
        let attachment = parse_attachment(&json!({
            "data": "YSxiCg==",
            "filename": "members",
            "mime_maintype": "text",
            "mimeSubtype": "csv"
        }))
        .unwrap();
        match attachment {
            Attachment::Bytes { data, mime_subtype, .. } => {
                assert_eq!(data, b"a,b\n");
                assert_eq!(mime_subtype, "csv");
            }
            other => panic!("unexpected attachment {:?}", other),
        }
    }

    #[test]
    fn test_attachment_without_source() {
        assert!(parse_attachment(&json!({"filename": "x"})).is_err());
    }
}
