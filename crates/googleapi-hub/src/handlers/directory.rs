//! Directory Handler
//!
//! Users, user photos, sessions and groups of the Workspace domain.

use serde_json::{json, Value};
use tracing::info;

use super::common::*;
use super::Hub;

pub async fn handle(hub: &Hub, action: &str, params: &Value) -> Option<HandlerResult> {
    let result = match action {
        "get_users" | "getUsers" => get_users(hub).await,
        "get_user" | "getUser" => get_user(hub, params).await,
        "delete_user" | "deleteUser" => delete_user(hub, params).await,
        "create_user" | "createUser" => create_user(hub, params).await,
        "update_user" | "updateUser" => update_user(hub, params).await,
        "update_user_password" | "updateUserPassword" => update_user_password(hub, params).await,
        "update_user_photo" | "updateUserPhoto" => update_user_photo(hub, params).await,
        "get_user_photo" | "getUserPhoto" => get_user_photo(hub, params).await,
        "delete_user_photo" | "deleteUserPhoto" => delete_user_photo(hub, params).await,
        "remove_all_sessions" | "removeAllSessions" => remove_all_sessions(hub).await,
        "get_groups" | "getGroups" => get_groups(hub).await,
        "get_group" | "getGroup" => get_group(hub, params).await,
        "delete_group" | "deleteGroup" => delete_group(hub, params).await,
        "create_group" | "createGroup" => create_group(hub, params).await,
        "update_group" | "updateGroup" => update_group(hub, params).await,
        "get_group_members" | "getGroupMembers" => get_group_members(hub, params).await,
        "add_group_member" | "addGroupMember" => add_group_member(hub, params).await,
        "delete_group_member" | "deleteGroupMember" => delete_group_member(hub, params).await,
        _ => return None,
    };
    Some(result)
}

fn user_key(params: &Value) -> Result<&str, HandlerError> {
    require_string_or(params, "userKey", "user_key")
}

fn group_key(params: &Value) -> Result<&str, HandlerError> {
    require_string_or(params, "groupKey", "group_key")
}

// ── Users ───────────────────────────────────────────────────────────────────

async fn get_users(hub: &Hub) -> HandlerResult {
    info!("Handling directory.get_users");
    let users = hub.directory().await?.get_users().await?;
    list_with_count("users", users)
}

async fn get_user(hub: &Hub, params: &Value) -> HandlerResult {
    let user_key = user_key(params)?;
    Ok(hub.directory().await?.get_user(user_key).await?)
}

async fn delete_user(hub: &Hub, params: &Value) -> HandlerResult {
    let user_key = user_key(params)?;
    hub.directory().await?.delete_user(user_key).await?;
    simple_success()
}

async fn create_user(hub: &Hub, params: &Value) -> HandlerResult {
    let email = require_string(params, "email")?;
    let password = require_string(params, "password")?;
    let first_name = require_string_or(params, "firstName", "first_name")?;
    let last_name = require_string_or(params, "lastName", "last_name")?;

    info!("Handling directory.create_user for {}", email);
    Ok(hub
        .directory()
        .await?
        .create_user(email, password, first_name, last_name)
        .await?)
}

async fn update_user(hub: &Hub, params: &Value) -> HandlerResult {
    let user_key = user_key(params)?;
    let first_name = optional_string_or(params, "firstName", "first_name");
    let last_name = optional_string_or(params, "lastName", "last_name");

    Ok(hub
        .directory()
        .await?
        .update_user(user_key, first_name, last_name)
        .await?)
}

async fn update_user_password(hub: &Hub, params: &Value) -> HandlerResult {
    let user_key = user_key(params)?;
    let password = require_string(params, "password")?;
    Ok(hub
        .directory()
        .await?
        .update_user_password(user_key, password)
        .await?)
}

async fn update_user_photo(hub: &Hub, params: &Value) -> HandlerResult {
    let user_key = user_key(params)?;
    let path = require_string_or(params, "photoPath", "photo_path")?;
    Ok(hub.directory().await?.update_user_photo(user_key, path).await?)
}

async fn get_user_photo(hub: &Hub, params: &Value) -> HandlerResult {
    let user_key = user_key(params)?;
    Ok(hub.directory().await?.get_user_photo(user_key).await?)
}

async fn delete_user_photo(hub: &Hub, params: &Value) -> HandlerResult {
    let user_key = user_key(params)?;
    hub.directory().await?.delete_user_photo(user_key).await?;
    simple_success()
}

async fn remove_all_sessions(hub: &Hub) -> HandlerResult {
    info!("Handling directory.remove_all_sessions");
    let signed_out = hub.directory().await?.remove_all_sessions().await?;
    Ok(json!({ "success": true, "count": signed_out }))
}

// ── Groups ──────────────────────────────────────────────────────────────────

async fn get_groups(hub: &Hub) -> HandlerResult {
    let groups = hub.directory().await?.get_groups().await?;
    list_with_count("groups", groups)
}

async fn get_group(hub: &Hub, params: &Value) -> HandlerResult {
    let group_key = group_key(params)?;
    Ok(hub.directory().await?.get_group(group_key).await?)
}

async fn delete_group(hub: &Hub, params: &Value) -> HandlerResult {
    let group_key = group_key(params)?;
    hub.directory().await?.delete_group(group_key).await?;
    simple_success()
}

async fn create_group(hub: &Hub, params: &Value) -> HandlerResult {
    let email = require_string(params, "email")?;
    let name = require_string(params, "name")?;
    let description = optional_string(params, "description");

    info!("Handling directory.create_group for {}", email);
    Ok(hub
        .directory()
        .await?
        .create_group(email, name, description)
        .await?)
}

async fn update_group(hub: &Hub, params: &Value) -> HandlerResult {
    let group_key = group_key(params)?;
    Ok(hub
        .directory()
        .await?
        .update_group(
            group_key,
            optional_string(params, "email"),
            optional_string(params, "name"),
            optional_string(params, "description"),
        )
        .await?)
}

async fn get_group_members(hub: &Hub, params: &Value) -> HandlerResult {
    let group_key = group_key(params)?;
    let members = hub.directory().await?.get_group_members(group_key).await?;
    list_with_count("members", members)
}

async fn add_group_member(hub: &Hub, params: &Value) -> HandlerResult {
    let user_key = user_key(params)?;
    let group_key = group_key(params)?;
    Ok(hub
        .directory()
        .await?
        .add_group_member(user_key, group_key)
        .await?)
}

async fn delete_group_member(hub: &Hub, params: &Value) -> HandlerResult {
    let user_key = user_key(params)?;
    let group_key = group_key(params)?;
    hub.directory()
        .await?
        .delete_group_member(user_key, group_key)
        .await?;
    simple_success()
}
