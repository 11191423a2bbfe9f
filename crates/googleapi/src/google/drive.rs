//! Google Drive API v3 Client
//!
//! Shared drives and the files inside them: listing, download, multipart
//! upload, rename, move and delete. Every file call sets
//! `supportsAllDrives` so shared-drive items are reachable.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info};

use super::client::GoogleClient;
use super::common::{extract_array, segment};
use crate::auth::{
    build_service_account_credentials, ServiceAccountKey, ServiceAccountTokenSource, TokenSource,
};
use crate::common::{Error, Result};

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

pub const DRIVE_SCOPES: [&str; 1] = ["https://www.googleapis.com/auth/drive"];

pub const DEFAULT_MAX_RESULTS: u32 = 50;

/// Options for [`DriveApi::get_files_from_parent`]
#[derive(Debug, Clone)]
pub struct ListOptions {
    pub max_results: u32,
    pub include_trashed: bool,
    /// Partial-response field selector, e.g. `files(id, name)`
    pub fields: Option<String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            include_trashed: false,
            fields: None,
        }
    }
}

pub struct DriveApi {
    client: GoogleClient,
    base_url: String,
    upload_url: String,
}

super::google_api_wrapper!(DriveApi);

/// Build a drive client acting as `subject`.
pub async fn create_drive(service_file: impl AsRef<Path>, subject: &str) -> Result<DriveApi> {
    let key = ServiceAccountKey::from_file(service_file).await?;
    DriveApi::from_service_account(key, subject)
}

impl DriveApi {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Result<Self> {
        Ok(Self {
            client: GoogleClient::new(tokens)?,
            base_url: DRIVE_API_BASE.to_string(),
            upload_url: DRIVE_UPLOAD_BASE.to_string(),
        })
    }

    pub fn from_service_account(key: ServiceAccountKey, subject: &str) -> Result<Self> {
        let credentials = build_service_account_credentials(key, &DRIVE_SCOPES, subject);
        Self::new(Arc::new(ServiceAccountTokenSource::new(credentials)?))
    }

    /// Media upload root, separate from the metadata root
    pub fn with_upload_url(mut self, upload_url: impl Into<String>) -> Self {
        self.upload_url = upload_url.into().trim_end_matches('/').to_string();
        self
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.base_url, segment(file_id))
    }

    fn drive_url(&self, drive_id: &str) -> String {
        format!("{}/drives/{}", self.base_url, segment(drive_id))
    }

    // ── Drives ──────────────────────────────────────────────────────────────

    pub async fn get_drives(&self) -> Result<Vec<Value>> {
        info!("Listing shared drives");

        let url = format!("{}/drives", self.base_url);
        let drives = self.client.get_paginated(&url, &[], "drives", None).await?;

        debug!("Retrieved {} drives", drives.len());
        Ok(drives)
    }

    pub async fn get_drive(&self, drive_id: &str) -> Result<Value> {
        info!("Fetching drive: {}", drive_id);
        self.client.get(&self.drive_url(drive_id), &[]).await
    }

    pub async fn delete_drive(&self, drive_id: &str) -> Result<()> {
        info!("Deleting drive: {}", drive_id);

        self.client.delete(&self.drive_url(drive_id), &[]).await?;
        Ok(())
    }

    // ── Files ───────────────────────────────────────────────────────────────

    /// File id, name and parents
    pub async fn get_file(&self, file_id: &str) -> Result<Value> {
        info!("Fetching file: {}", file_id);

        let query = [
            ("supportsAllDrives", "true".to_string()),
            ("fields", "id, name, parents".to_string()),
        ];
        self.client.get(&self.file_url(file_id), &query).await
    }

    /// Children of `parent_id` (the drive root when `None`), folders first
    pub async fn get_files_from_parent(
        &self,
        drive_id: &str,
        parent_id: Option<&str>,
        options: &ListOptions,
    ) -> Result<Vec<Value>> {
        let parent_id = parent_id.unwrap_or(drive_id);
        info!("Listing files of {} in drive {}", parent_id, drive_id);

        let mut query = vec![
            ("corpora", "drive".to_string()),
            ("driveId", drive_id.to_string()),
            ("includeItemsFromAllDrives", "true".to_string()),
            ("orderBy", "folder".to_string()),
            ("pageSize", options.max_results.to_string()),
            ("supportsAllDrives", "true".to_string()),
            ("q", parent_query(parent_id, options.include_trashed)),
        ];
        if let Some(fields) = &options.fields {
            query.push(("fields", fields.clone()));
        }

        let url = format!("{}/files", self.base_url);
        let response = self.client.get(&url, &query).await?;
        let files = extract_array(&response, "files");

        debug!("Retrieved {} files", files.len());
        Ok(files)
    }

    pub async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        info!("Downloading file: {}", file_id);

        let query = [
            ("alt", "media".to_string()),
            ("supportsAllDrives", "true".to_string()),
        ];
        let bytes = self.client.get_bytes(&self.file_url(file_id), &query).await?;

        debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes)
    }

    /// Upload `content` as a new file under `parent_id`
    pub async fn upload_file(
        &self,
        drive_id: &str,
        parent_id: &str,
        mime_type: &str,
        content: &[u8],
        file_name: &str,
    ) -> Result<Value> {
        info!("Uploading {} ({} bytes) to {}", file_name, content.len(), parent_id);

        let metadata = json!({
            "name": file_name,
            "mimeType": mime_type,
            "parents": [parent_id],
            "driveId": drive_id,
        });
        let query = [
            ("uploadType", "multipart".to_string()),
            ("supportsAllDrives", "true".to_string()),
        ];

        let url = format!("{}/files", self.upload_url);
        self.client
            .post_related(&url, &query, &metadata, mime_type, content)
            .await
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<()> {
        info!("Deleting file: {}", file_id);

        let query = [("supportsAllDrives", "true".to_string())];
        self.client.delete(&self.file_url(file_id), &query).await?;
        Ok(())
    }

    /// Rename a file; include the extension in `file_name`
    pub async fn change_file_name(&self, file_id: &str, file_name: &str) -> Result<Value> {
        info!("Renaming file {} to {}", file_id, file_name);

        let query = [("supportsAllDrives", "true".to_string())];
        self.client
            .patch(&self.file_url(file_id), &query, &json!({"name": file_name}))
            .await
    }

    /// Move a file under a new parent, detaching it from its current one
    pub async fn move_file(&self, file_id: &str, parent_id: &str) -> Result<Value> {
        let file = self.get_file(file_id).await?;
        let current_parent = file
            .get("parents")
            .and_then(|p| p.get(0))
            .and_then(|p| p.as_str())
            .ok_or_else(|| Error::NotFound(format!("File {} has no parent", file_id)))?
            .to_string();

        info!("Moving file {} from {} to {}", file_id, current_parent, parent_id);

        let query = [
            ("supportsAllDrives", "true".to_string()),
            ("addParents", parent_id.to_string()),
            ("removeParents", current_parent),
        ];
        self.client
            .patch(&self.file_url(file_id), &query, &json!({}))
            .await
    }
}

/// Drive search query selecting the children of `parent_id`
fn parent_query(parent_id: &str, include_trashed: bool) -> String {
    let escaped = parent_id.replace('\\', "\\\\").replace('\'', "\\'");
    if include_trashed {
        format!("'{}' in parents", escaped)
    } else {
        format!("'{}' in parents and trashed = false", escaped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, MockServer};
    use axum::http::Method;

    fn api(server: &MockServer) -> DriveApi {
        DriveApi::new(test_support::static_tokens())
            .unwrap()
            .with_base_url(server.base_url())
            .with_upload_url(server.url("/upload"))
    }

    #[test]
    fn test_parent_query() {
        assert_eq!(parent_query("abc", false), "'abc' in parents and trashed = false");
        assert_eq!(parent_query("abc", true), "'abc' in parents");
        assert_eq!(parent_query("it's", true), "'it\\'s' in parents");
    }

    #[tokio::test]
    async fn test_files_default_to_drive_root() {
        let server = MockServer::start().await;
        server.on(
            Method::GET,
            "/files",
            200,
            json!({"files": [{"id": "f1", "name": "Notulen"}]}),
        );

        let files = api(&server)
            .get_files_from_parent("drive-1", None, &ListOptions::default())
            .await
            .unwrap();
        assert_eq!(files.len(), 1);

        let request = &server.requests()[0];
        assert_eq!(
            request.param("q").as_deref(),
            Some("'drive-1' in parents and trashed = false")
        );
        assert_eq!(request.param("pageSize").as_deref(), Some("50"));
        assert_eq!(request.param("corpora").as_deref(), Some("drive"));
        assert!(request.param("fields").is_none());
    }

    #[tokio::test]
    async fn test_download_file_returns_bytes() {
        let server = MockServer::start().await;
        server.on_raw(Method::GET, "/files/f1", 200, &b"\x00\x01binary"[..]);

        let bytes = api(&server).download_file("f1").await.unwrap();
        assert_eq!(bytes, b"\x00\x01binary");
        assert_eq!(server.requests()[0].param("alt").as_deref(), Some("media"));
    }

    #[tokio::test]
    async fn test_upload_file_multipart() {
        let server = MockServer::start().await;
        server.on(Method::POST, "/upload/files", 200, json!({"id": "new"}));

        let file = api(&server)
            .upload_file("drive-1", "folder-1", "text/plain", b"hello", "hello.txt")
            .await
            .unwrap();
        assert_eq!(file["id"], "new");

        let request = &server.requests()[0];
        assert_eq!(request.param("uploadType").as_deref(), Some("multipart"));
        let content_type = request.headers.get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/related; boundary="));
        let body = request.body_text();
        assert!(body.contains("\"parents\":[\"folder-1\"]"));
        assert!(body.contains("hello"));
    }

    #[tokio::test]
    async fn test_move_file_swaps_parent() {
        let server = MockServer::start().await;
        server.on(
            Method::GET,
            "/files/f1",
            200,
            json!({"id": "f1", "name": "a.txt", "parents": ["old-parent"]}),
        );
        server.on(Method::PATCH, "/files/f1", 200, json!({"id": "f1"}));

        api(&server).move_file("f1", "new-parent").await.unwrap();

        let patch = &server.requests_to(Method::PATCH, "/files/f1")[0];
        assert_eq!(patch.param("addParents").as_deref(), Some("new-parent"));
        assert_eq!(patch.param("removeParents").as_deref(), Some("old-parent"));
    }

    #[tokio::test]
    async fn test_drive_error_surfaces_status() {
        let server = MockServer::start().await;
        server.on(
            Method::GET,
            "/drives/missing",
            404,
            json!({"error": {"code": 404, "message": "Shared drive not found: missing"}}),
        );

        let err = api(&server).get_drive("missing").await.unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert!(err.to_string().contains("Shared drive not found"));
    }
}
