//! Drive Handler
//!
//! File contents cross the wire base64 encoded.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use tracing::info;

use googleapi::google::drive::{ListOptions, DEFAULT_MAX_RESULTS};

use super::common::*;
use super::Hub;

pub async fn handle(hub: &Hub, action: &str, params: &Value) -> Option<HandlerResult> {
    let result = match action {
        "get_drives" | "getDrives" => get_drives(hub).await,
        "get_drive" | "getDrive" => get_drive(hub, params).await,
        "delete_drive" | "deleteDrive" => delete_drive(hub, params).await,
        "get_file" | "getFile" => get_file(hub, params).await,
        "get_files_from_parent" | "getFilesFromParent" => get_files_from_parent(hub, params).await,
        "download_file" | "downloadFile" => download_file(hub, params).await,
        "upload_file" | "uploadFile" => upload_file(hub, params).await,
        "delete_file" | "deleteFile" => delete_file(hub, params).await,
        "change_file_name" | "changeFileName" => change_file_name(hub, params).await,
        "move_file" | "moveFile" => move_file(hub, params).await,
        _ => return None,
    };
    Some(result)
}

fn drive_id(params: &Value) -> Result<&str, HandlerError> {
    require_string_or(params, "driveId", "drive_id")
}

fn file_id(params: &Value) -> Result<&str, HandlerError> {
    require_string_or(params, "fileId", "file_id")
}

async fn get_drives(hub: &Hub) -> HandlerResult {
    let drives = hub.drive().await?.get_drives().await?;
    list_with_count("drives", drives)
}

async fn get_drive(hub: &Hub, params: &Value) -> HandlerResult {
    let drive_id = drive_id(params)?;
    Ok(hub.drive().await?.get_drive(drive_id).await?)
}

async fn delete_drive(hub: &Hub, params: &Value) -> HandlerResult {
    let drive_id = drive_id(params)?;
    hub.drive().await?.delete_drive(drive_id).await?;
    simple_success()
}

async fn get_file(hub: &Hub, params: &Value) -> HandlerResult {
    let file_id = file_id(params)?;
    Ok(hub.drive().await?.get_file(file_id).await?)
}

async fn get_files_from_parent(hub: &Hub, params: &Value) -> HandlerResult {
    let drive_id = drive_id(params)?;
    let parent_id = optional_string_or(params, "parentId", "parent_id");
    let max_results = optional_u64_or(params, "maxResults", "max_results")
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(DEFAULT_MAX_RESULTS);
    let options = ListOptions {
        max_results,
        include_trashed: bool_with_default(params, "includeTrashed", "include_trashed", false),
        fields: optional_string(params, "fields").map(str::to_string),
    };

    let files = hub
        .drive()
        .await?
        .get_files_from_parent(drive_id, parent_id, &options)
        .await?;
    list_with_count("files", files)
}

async fn download_file(hub: &Hub, params: &Value) -> HandlerResult {
    let file_id = file_id(params)?;
    let bytes = hub.drive().await?.download_file(file_id).await?;
    Ok(json!({
        "fileId": file_id,
        "size": bytes.len(),
        "content": STANDARD.encode(&bytes),
    }))
}

async fn upload_file(hub: &Hub, params: &Value) -> HandlerResult {
    let drive_id = drive_id(params)?;
    let parent_id = require_string_or(params, "parentId", "parent_id")?;
    let mime_type = require_string_or(params, "mimeType", "mime_type")?;
    let file_name = require_string_or(params, "fileName", "file_name")?;
    let content = require_base64(params, "content")?;

    info!("Handling drive.upload_file {} ({} bytes)", file_name, content.len());
    Ok(hub
        .drive()
        .await?
        .upload_file(drive_id, parent_id, mime_type, &content, file_name)
        .await?)
}

async fn delete_file(hub: &Hub, params: &Value) -> HandlerResult {
    let file_id = file_id(params)?;
    hub.drive().await?.delete_file(file_id).await?;
    simple_success()
}

async fn change_file_name(hub: &Hub, params: &Value) -> HandlerResult {
    let file_id = file_id(params)?;
    let file_name = require_string_or(params, "fileName", "file_name")?;
    Ok(hub.drive().await?.change_file_name(file_id, file_name).await?)
}

async fn move_file(hub: &Hub, params: &Value) -> HandlerResult {
    let file_id = file_id(params)?;
    let parent_id = require_string_or(params, "parentId", "parent_id")?;
    Ok(hub.drive().await?.move_file(file_id, parent_id).await?)
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_util::{offline_hub, request};
    use serde_json::json;

    #[tokio::test]
    async fn test_upload_requires_base64_content() {
        let dir = tempfile::tempdir().unwrap();
        let hub = offline_hub(dir.path());

        let resp = hub
            .handle(&request(
                "drive.uploadFile",
                json!({
                    "driveId": "d1",
                    "parentId": "p1",
                    "mimeType": "text/plain",
                    "fileName": "notes.txt",
                    "content": "not base64!"
                }),
            ))
            .await;
        let error = resp.error.unwrap();
        assert_eq!(error.code, -32602);
        assert!(error.message.contains("base64"));
    }
}
