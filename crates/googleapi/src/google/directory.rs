//! Admin SDK Directory API v1 Client
//!
//! Provides methods for managing a Workspace domain:
//! - List/get/create/update/delete users
//! - User passwords, photos and sessions
//! - Groups and group membership
//!
//! Passwords never leave the process in clear text: they are sent as
//! SHA-256-crypt hashes with `hashFunction = "crypt"`.

use std::path::Path;
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE, Engine};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::client::GoogleClient;
use super::common::{require_domain, segment, str_at};
use crate::auth::{
    build_service_account_credentials, hash_password, ServiceAccountKey,
    ServiceAccountTokenSource, TokenSource,
};
use crate::common::{Error, Result};

const DIRECTORY_API_BASE: &str = "https://admin.googleapis.com/admin/directory/v1";

/// Google limits
const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 100;
const NAME_MAX: usize = 60;
const PHOTO_MAX_BYTES: u64 = 10_000_000;

pub const DIRECTORY_SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/admin.directory.user",
    "https://www.googleapis.com/auth/admin.directory.group",
    "https://www.googleapis.com/auth/admin.directory.user.security",
];

pub struct DirectoryApi {
    client: GoogleClient,
    base_url: String,
    domain: String,
}

super::google_api_wrapper!(DirectoryApi);

/// Build a directory client for `domain`, impersonating `subject`.
pub async fn create_directory(
    service_file: impl AsRef<Path>,
    subject: &str,
    domain: &str,
) -> Result<DirectoryApi> {
    let key = ServiceAccountKey::from_file(service_file).await?;
    DirectoryApi::from_service_account(key, subject, domain)
}

impl DirectoryApi {
    pub fn new(tokens: Arc<dyn TokenSource>, domain: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: GoogleClient::new(tokens)?,
            base_url: DIRECTORY_API_BASE.to_string(),
            domain: domain.into(),
        })
    }

    pub fn from_service_account(key: ServiceAccountKey, subject: &str, domain: &str) -> Result<Self> {
        let credentials = build_service_account_credentials(key, &DIRECTORY_SCOPES, subject);
        let tokens = ServiceAccountTokenSource::new(credentials)?;
        Self::new(Arc::new(tokens), domain)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    fn user_url(&self, user_key: &str) -> String {
        format!("{}/users/{}", self.base_url, segment(user_key))
    }

    fn group_url(&self, group_key: &str) -> String {
        format!("{}/groups/{}", self.base_url, segment(group_key))
    }

    // ── Users ───────────────────────────────────────────────────────────────

    /// All users of the domain, ordered by email
    pub async fn get_users(&self) -> Result<Vec<Value>> {
        info!("Listing directory users for {}", self.domain);

        let url = format!("{}/users", self.base_url);
        let query = [
            ("domain", self.domain.clone()),
            ("orderBy", "email".to_string()),
        ];
        let users = self.client.get_paginated(&url, &query, "users", None).await?;

        debug!("Retrieved {} users", users.len());
        Ok(users)
    }

    /// Get a user by primary email, alias or unique ID
    pub async fn get_user(&self, user_key: &str) -> Result<Value> {
        info!("Fetching directory user: {}", user_key);

        let query = [
            ("viewType", "admin_view".to_string()),
            ("projection", "full".to_string()),
        ];
        self.client.get(&self.user_url(user_key), &query).await
    }

    pub async fn delete_user(&self, user_key: &str) -> Result<()> {
        info!("Deleting directory user: {}", user_key);

        self.client.delete(&self.user_url(user_key), &[]).await?;
        Ok(())
    }

    /// Create a user in the managed domain
    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<Value> {
        check_password(password)?;
        check_name("first name", first_name)?;
        check_name("last name", last_name)?;
        require_domain(email, &self.domain)?;

        info!("Creating directory user: {}", email);

        let body = json!({
            "primaryEmail": email,
            "password": hash_password(password),
            "hashFunction": "crypt",
            "name": {"givenName": first_name, "familyName": last_name},
            "changePasswordAtNextLogin": false,
        });

        let url = format!("{}/users", self.base_url);
        self.client.post(&url, &[], &body).await
    }

    /// Change a user's given and/or family name
    pub async fn update_user(
        &self,
        user_key: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<Value> {
        if first_name.is_none() && last_name.is_none() {
            return Err(Error::nothing_to_update("Update arguments don't have a value"));
        }

        let user = self.get_user(user_key).await?;
        let current_first = str_at(&user, "/name/givenName");
        let current_last = str_at(&user, "/name/familyName");

        let first = first_name.map(str::to_string).unwrap_or_else(|| current_first.clone());
        let last = last_name.map(str::to_string).unwrap_or_else(|| current_last.clone());

        if first == current_first && last == current_last {
            return Err(Error::nothing_to_update("User already has these values"));
        }
        check_name("first name", &first)?;
        check_name("last name", &last)?;

        info!("Updating directory user: {}", user_key);

        let body = json!({"name": {"givenName": first, "familyName": last}});
        self.client.put(&self.user_url(user_key), &body).await
    }

    pub async fn update_user_password(&self, user_key: &str, password: &str) -> Result<Value> {
        check_password(password)?;

        info!("Updating password of directory user: {}", user_key);

        let body = json!({
            "password": hash_password(password),
            "hashFunction": "crypt",
            "changePasswordAtNextLogin": false,
        });
        self.client.put(&self.user_url(user_key), &body).await
    }

    /// Replace a user's photo with the image at `photo_path`
    pub async fn update_user_photo(&self, user_key: &str, photo_path: impl AsRef<Path>) -> Result<Value> {
        let photo_path = photo_path.as_ref();

        let size = tokio::fs::metadata(photo_path).await?.len();
        if size >= PHOTO_MAX_BYTES {
            return Err(Error::invalid("File size is max 10Mb"));
        }
        let mime_type = photo_mime_type(photo_path)?;

        info!("Updating photo of directory user: {}", user_key);

        let data = tokio::fs::read(photo_path).await?;
        let body = json!({
            "photoData": URL_SAFE.encode(data),
            "mimeType": mime_type,
        });

        let url = format!("{}/photos/thumbnail", self.user_url(user_key));
        self.client.put(&url, &body).await
    }

    pub async fn get_user_photo(&self, user_key: &str) -> Result<Value> {
        info!("Fetching photo of directory user: {}", user_key);

        let url = format!("{}/photos/thumbnail", self.user_url(user_key));
        self.client.get(&url, &[]).await
    }

    pub async fn delete_user_photo(&self, user_key: &str) -> Result<()> {
        info!("Deleting photo of directory user: {}", user_key);

        let url = format!("{}/photos/thumbnail", self.user_url(user_key));
        self.client.delete(&url, &[]).await?;
        Ok(())
    }

    /// Sign every user of the domain out of all sessions
    ///
    /// Returns how many users were signed out.
    pub async fn remove_all_sessions(&self) -> Result<usize> {
        let users = self.get_users().await?;
        info!("Signing out {} users", users.len());

        let mut signed_out = 0;
        for user in &users {
            let Some(id) = user.get("id").and_then(|v| v.as_str()) else {
                continue;
            };
            let url = format!("{}/signOut", self.user_url(id));
            self.client.post(&url, &[], &json!({})).await?;
            signed_out += 1;
        }

        Ok(signed_out)
    }

    // ── Groups ──────────────────────────────────────────────────────────────

    /// All groups of the domain, ordered by email
    pub async fn get_groups(&self) -> Result<Vec<Value>> {
        info!("Listing directory groups for {}", self.domain);

        let url = format!("{}/groups", self.base_url);
        let query = [
            ("domain", self.domain.clone()),
            ("orderBy", "email".to_string()),
        ];
        let groups = self.client.get_paginated(&url, &query, "groups", None).await?;

        debug!("Retrieved {} groups", groups.len());
        Ok(groups)
    }

    pub async fn get_group(&self, group_key: &str) -> Result<Value> {
        info!("Fetching directory group: {}", group_key);
        self.client.get(&self.group_url(group_key), &[]).await
    }

    pub async fn delete_group(&self, group_key: &str) -> Result<()> {
        info!("Deleting directory group: {}", group_key);

        self.client.delete(&self.group_url(group_key), &[]).await?;
        Ok(())
    }

    pub async fn create_group(&self, email: &str, name: &str, description: Option<&str>) -> Result<Value> {
        require_domain(email, &self.domain)?;

        info!("Creating directory group: {}", email);

        let body = json!({
            "email": email,
            "name": name,
            "description": description.unwrap_or_default(),
        });
        let url = format!("{}/groups", self.base_url);
        self.client.post(&url, &[], &body).await
    }

    pub async fn update_group(
        &self,
        group_key: &str,
        email: Option<&str>,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Value> {
        if email.is_none() && name.is_none() && description.is_none() {
            return Err(Error::nothing_to_update("Update arguments don't have a value"));
        }
        if let Some(new_email) = email {
            require_domain(new_email, &self.domain)?;
        }

        let group = self.get_group(group_key).await?;
        let current_email = str_at(&group, "/email");
        let current_name = str_at(&group, "/name");
        let current_description = str_at(&group, "/description");

        let email = email.map(str::to_string).unwrap_or_else(|| current_email.clone());
        let name = name.map(str::to_string).unwrap_or_else(|| current_name.clone());
        let description = description
            .map(str::to_string)
            .unwrap_or_else(|| current_description.clone());

        if email == current_email && name == current_name && description == current_description {
            return Err(Error::nothing_to_update("Group already has these values"));
        }

        info!("Updating directory group: {}", group_key);

        let body = json!({"email": email, "name": name, "description": description});
        self.client.put(&self.group_url(group_key), &body).await
    }

    // ── Members ─────────────────────────────────────────────────────────────

    pub async fn get_group_members(&self, group_key: &str) -> Result<Vec<Value>> {
        info!("Listing members of group: {}", group_key);

        let url = format!("{}/members", self.group_url(group_key));
        let members = self.client.get_paginated(&url, &[], "members", None).await?;

        debug!("Retrieved {} members", members.len());
        Ok(members)
    }

    /// Add an existing user to a group as `MEMBER`
    pub async fn add_group_member(&self, user_key: &str, group_key: &str) -> Result<Value> {
        let user = self.get_user(user_key).await?;
        let email = str_at(&user, "/primaryEmail");
        if email.is_empty() {
            return Err(Error::NotFound(format!("User {} has no primary email", user_key)));
        }

        info!("Adding {} to group {}", email, group_key);

        let url = format!("{}/members", self.group_url(group_key));
        let body = json!({"email": email, "role": "MEMBER"});
        self.client.post(&url, &[], &body).await
    }

    pub async fn delete_group_member(&self, user_key: &str, group_key: &str) -> Result<()> {
        info!("Removing {} from group {}", user_key, group_key);

        let url = format!("{}/members/{}", self.group_url(group_key), segment(user_key));
        self.client.delete(&url, &[]).await?;
        Ok(())
    }
}

fn check_password(password: &str) -> Result<()> {
    let len = password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(Error::invalid(format!(
            "Password needs to be between {}-{} characters",
            PASSWORD_MIN, PASSWORD_MAX
        )));
    }
    Ok(())
}

fn check_name(label: &str, name: &str) -> Result<()> {
    if name.chars().count() > NAME_MAX {
        return Err(Error::invalid(format!(
            "More than {} characters in {}",
            NAME_MAX, label
        )));
    }
    Ok(())
}

/// Directory photo MIME type for a file, based on its extension
fn photo_mime_type(path: &Path) -> Result<&'static str> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpeg" | "jpg" => Ok("JPEG"),
        "png" => Ok("PNG"),
        "gif" => Ok("GIF"),
        "bmp" => Ok("BMP"),
        "tiff" => Ok("TIFF"),
        _ => Err(Error::invalid("Filetype not supported")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::crypt::sha256_crypt;
    use crate::test_support::{self, MockServer};
    use axum::http::Method;

    async fn api(server: &MockServer) -> DirectoryApi {
        DirectoryApi::new(test_support::static_tokens(), "ingeniumua.be")
            .unwrap()
            .with_base_url(server.base_url())
    }

    fn user() -> Value {
        json!({
            "id": "u1",
            "primaryEmail": "ada@ingeniumua.be",
            "name": {"givenName": "Ada", "familyName": "Lovelace"}
        })
    }

    #[tokio::test]
    async fn test_get_users_queries_domain() {
        let server = MockServer::start().await;
        server.on(Method::GET, "/users", 200, json!({"users": [user()]}));

        let users = api(&server).await.get_users().await.unwrap();
        assert_eq!(users.len(), 1);

        let request = &server.requests()[0];
        assert_eq!(request.param("domain").as_deref(), Some("ingeniumua.be"));
        assert_eq!(request.param("orderBy").as_deref(), Some("email"));
    }

    #[tokio::test]
    async fn test_get_user_uses_admin_view() {
        let server = MockServer::start().await;
        server.on(Method::GET, "/users/ada@ingeniumua.be", 200, user());

        let fetched = api(&server).await.get_user("ada@ingeniumua.be").await.unwrap();
        assert_eq!(fetched["id"], "u1");

        let request = &server.requests()[0];
        assert_eq!(request.param("viewType").as_deref(), Some("admin_view"));
        assert_eq!(request.param("projection").as_deref(), Some("full"));
    }

    #[tokio::test]
    async fn test_create_user_validation() {
        let server = MockServer::start().await;
        let api = api(&server).await;

        let short = api.create_user("ada@ingeniumua.be", "short", "Ada", "Lovelace").await;
        assert!(matches!(short, Err(Error::InvalidArgument(_))));

        let long_name = "x".repeat(61);
        let name = api
            .create_user("ada@ingeniumua.be", "long-enough", &long_name, "Lovelace")
            .await;
        assert!(matches!(name, Err(Error::InvalidArgument(_))));

        let domain = api.create_user("ada@gmail.com", "long-enough", "Ada", "Lovelace").await;
        assert!(domain.unwrap_err().to_string().contains("ingeniumua.be"));

        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_create_user_sends_crypt_hash() {
        let server = MockServer::start().await;
        server.on(Method::POST, "/users", 200, user());

        api(&server)
            .await
            .create_user("ada@ingeniumua.be", "analytical-engine", "Ada", "Lovelace")
            .await
            .unwrap();

        let body = server.requests()[0].json();
        assert_eq!(body["hashFunction"], "crypt");
        assert_eq!(body["changePasswordAtNextLogin"], false);
        assert_eq!(body["name"]["familyName"], "Lovelace");

        let hash = body["password"].as_str().unwrap();
        let salt = hash.split('$').nth(2).unwrap();
        assert_eq!(sha256_crypt(b"analytical-engine", salt), hash);
    }

    #[tokio::test]
    async fn test_update_user_merges_names() {
        let server = MockServer::start().await;
        server.on(Method::GET, "/users/u1", 200, user());
        server.on(Method::PUT, "/users/u1", 200, user());

        api(&server)
            .await
            .update_user("u1", None, Some("Byron"))
            .await
            .unwrap();

        let put = &server.requests_to(Method::PUT, "/users/u1")[0];
        assert_eq!(
            put.json(),
            json!({"name": {"givenName": "Ada", "familyName": "Byron"}})
        );
    }

    #[tokio::test]
    async fn test_update_user_without_changes() {
        let server = MockServer::start().await;
        server.on(Method::GET, "/users/u1", 200, user());
        let api = api(&server).await;

        let none = api.update_user("u1", None, None).await;
        assert!(matches!(none, Err(Error::NothingToUpdate(_))));

        let same = api.update_user("u1", Some("Ada"), Some("Lovelace")).await;
        assert!(matches!(same, Err(Error::NothingToUpdate(_))));
        assert!(server.requests_to(Method::PUT, "/users/u1").is_empty());
    }

    #[tokio::test]
    async fn test_update_user_photo() {
        let server = MockServer::start().await;
        server.on(Method::PUT, "/users/u1/photos/thumbnail", 200, json!({"mimeType": "PNG"}));

        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("avatar.png");
        std::fs::write(&photo, [0x89, b'P', b'N', b'G', 0xff, 0xfe]).unwrap();

        api(&server).await.update_user_photo("u1", &photo).await.unwrap();

        let body = server.requests()[0].json();
        assert_eq!(body["mimeType"], "PNG");
        assert_eq!(body["photoData"], URL_SAFE.encode([0x89, b'P', b'N', b'G', 0xff, 0xfe]));
    }

    #[tokio::test]
    async fn test_update_user_photo_rejects_type() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("avatar.webp");
        std::fs::write(&photo, b"RIFF").unwrap();

        let err = api(&server).await.update_user_photo("u1", &photo).await.unwrap_err();
        assert!(err.to_string().contains("Filetype not supported"));
    }

    #[tokio::test]
    async fn test_update_group_checks_new_email_domain() {
        let server = MockServer::start().await;
        let err = api(&server)
            .await
            .update_group("board", Some("board@example.com"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_update_group_merges() {
        let server = MockServer::start().await;
        server.on(
            Method::GET,
            "/groups/board@ingeniumua.be",
            200,
            json!({"email": "board@ingeniumua.be", "name": "Board", "description": "The board"}),
        );
        server.on(Method::PUT, "/groups/board@ingeniumua.be", 200, json!({}));

        api(&server)
            .await
            .update_group("board@ingeniumua.be", None, Some("Board 2026"), None)
            .await
            .unwrap();

        let put = &server.requests_to(Method::PUT, "/groups/board@ingeniumua.be")[0];
        assert_eq!(
            put.json(),
            json!({"email": "board@ingeniumua.be", "name": "Board 2026", "description": "The board"})
        );
    }

    #[tokio::test]
    async fn test_add_group_member_resolves_user() {
        let server = MockServer::start().await;
        server.on(Method::GET, "/users/u1", 200, user());
        server.on(Method::POST, "/groups/board/members", 200, json!({"role": "MEMBER"}));

        api(&server).await.add_group_member("u1", "board").await.unwrap();

        let post = &server.requests_to(Method::POST, "/groups/board/members")[0];
        assert_eq!(post.json(), json!({"email": "ada@ingeniumua.be", "role": "MEMBER"}));
    }

    #[tokio::test]
    async fn test_remove_all_sessions() {
        let server = MockServer::start().await;
        server.on(
            Method::GET,
            "/users",
            200,
            json!({"users": [{"id": "u1"}, {"id": "u2"}]}),
        );
        server.on_raw(Method::POST, "/users/u1/signOut", 204, "");
        server.on_raw(Method::POST, "/users/u2/signOut", 204, "");

        let count = api(&server).await.remove_all_sessions().await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(server.requests_to(Method::POST, "/users/u2/signOut").len(), 1);
    }

    #[test]
    fn test_photo_mime_types() {
        assert_eq!(photo_mime_type(Path::new("a.JPG")).unwrap(), "JPEG");
        assert_eq!(photo_mime_type(Path::new("a.tiff")).unwrap(), "TIFF");
        assert!(photo_mime_type(Path::new("noext")).is_err());
    }
}
