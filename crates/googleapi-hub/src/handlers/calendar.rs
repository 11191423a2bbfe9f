//! Calendar Handler
//!
//! Events, calendars and share rules. Timestamps travel as RFC 3339 strings.

use serde_json::Value;
use tracing::info;

use googleapi::google::calendar::{CalendarUpdate, EventUpdate, Role, ScopeType};

use super::common::*;
use super::Hub;

pub async fn handle(hub: &Hub, action: &str, params: &Value) -> Option<HandlerResult> {
    let result = match action {
        "add_event" | "addEvent" => add_event(hub, params).await,
        "get_events" | "getEvents" => get_events(hub, params).await,
        "get_event" | "getEvent" => get_event(hub, params).await,
        "remove_event" | "removeEvent" => remove_event(hub, params).await,
        "update_event" | "updateEvent" => update_event(hub, params).await,
        "move_event" | "moveEvent" => move_event(hub, params).await,
        "add_calendar" | "addCalendar" => add_calendar(hub, params).await,
        "get_calendars" | "getCalendars" => get_calendars(hub).await,
        "get_calendar" | "getCalendar" => get_calendar(hub, params).await,
        "update_calendar" | "updateCalendar" => update_calendar(hub, params).await,
        "remove_calendar" | "removeCalendar" => remove_calendar(hub, params).await,
        "clear_calendar" | "clearCalendar" => clear_calendar(hub, params).await,
        "add_share_rule" | "addShareRule" => add_share_rule(hub, params).await,
        "get_share_rules" | "getShareRules" => get_share_rules(hub, params).await,
        "get_share_rule" | "getShareRule" => get_share_rule(hub, params).await,
        "update_share_rule" | "updateShareRule" => update_share_rule(hub, params).await,
        "remove_share_rule" | "removeShareRule" => remove_share_rule(hub, params).await,
        _ => return None,
    };
    Some(result)
}

fn calendar_id(params: &Value) -> Result<&str, HandlerError> {
    require_string_or(params, "calendarId", "calendar_id")
}

fn event_id(params: &Value) -> Result<&str, HandlerError> {
    require_string_or(params, "eventId", "event_id")
}

fn rule_id(params: &Value) -> Result<&str, HandlerError> {
    require_string_or(params, "ruleId", "rule_id")
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

// ── Events ──────────────────────────────────────────────────────────────────

async fn add_event(hub: &Hub, params: &Value) -> HandlerResult {
    let calendar_id = calendar_id(params)?;
    let title = require_string(params, "title")?;
    let start = require_datetime_or(params, "start", "start_time")?;
    let end = require_datetime_or(params, "end", "end_time")?;
    let description = string_or_default(params, "description", "description");
    let location = string_or_default(params, "location", "location");

    info!("Handling calendar.add_event '{}'", title);
    Ok(hub
        .calendar()
        .await?
        .add_event(calendar_id, title, start, end, description, location)
        .await?)
}

async fn get_events(hub: &Hub, params: &Value) -> HandlerResult {
    let calendar_id = calendar_id(params)?;
    let get_all = bool_with_default(params, "getAllEvents", "get_all_events", false);

    let events = hub.calendar().await?.get_events(calendar_id, get_all).await?;
    list_with_count("events", events)
}

async fn get_event(hub: &Hub, params: &Value) -> HandlerResult {
    let calendar_id = calendar_id(params)?;
    let event_id = event_id(params)?;
    Ok(hub.calendar().await?.get_event(calendar_id, event_id).await?)
}

async fn remove_event(hub: &Hub, params: &Value) -> HandlerResult {
    let calendar_id = calendar_id(params)?;
    let event_id = event_id(params)?;
    hub.calendar().await?.remove_event(calendar_id, event_id).await?;
    simple_success()
}

async fn update_event(hub: &Hub, params: &Value) -> HandlerResult {
    let calendar_id = calendar_id(params)?;
    let event_id = event_id(params)?;
    let update = EventUpdate {
        title: owned(optional_string(params, "title")),
        start: optional_datetime_or(params, "start", "start_time")?,
        end: optional_datetime_or(params, "end", "end_time")?,
        description: owned(optional_string(params, "description")),
        location: owned(optional_string(params, "location")),
    };

    Ok(hub
        .calendar()
        .await?
        .update_event(calendar_id, event_id, update)
        .await?)
}

async fn move_event(hub: &Hub, params: &Value) -> HandlerResult {
    let event_id = event_id(params)?;
    let from = require_string_or(params, "oldCalendarId", "old_calendar_id")?;
    let to = require_string_or(params, "newCalendarId", "new_calendar_id")?;
    Ok(hub.calendar().await?.move_event(event_id, from, to).await?)
}

// ── Calendars ───────────────────────────────────────────────────────────────

async fn add_calendar(hub: &Hub, params: &Value) -> HandlerResult {
    let title = require_string(params, "title")?;
    let location = string_or_default(params, "location", "location");
    let description = string_or_default(params, "description", "description");
    Ok(hub
        .calendar()
        .await?
        .add_calendar(title, location, description)
        .await?)
}

async fn get_calendars(hub: &Hub) -> HandlerResult {
    let calendars = hub.calendar().await?.get_calendars().await?;
    list_with_count("calendars", calendars)
}

async fn get_calendar(hub: &Hub, params: &Value) -> HandlerResult {
    let calendar_id = calendar_id(params)?;
    Ok(hub.calendar().await?.get_calendar(calendar_id).await?)
}

async fn update_calendar(hub: &Hub, params: &Value) -> HandlerResult {
    let calendar_id = calendar_id(params)?;
    let update = CalendarUpdate {
        title: owned(optional_string(params, "title")),
        location: owned(optional_string(params, "location")),
        description: owned(optional_string(params, "description")),
    };
    Ok(hub
        .calendar()
        .await?
        .update_calendar(calendar_id, update)
        .await?)
}

async fn remove_calendar(hub: &Hub, params: &Value) -> HandlerResult {
    let calendar_id = calendar_id(params)?;
    hub.calendar().await?.remove_calendar(calendar_id).await?;
    simple_success()
}

async fn clear_calendar(hub: &Hub, params: &Value) -> HandlerResult {
    let calendar_id = calendar_id(params)?;
    hub.calendar().await?.clear_calendar(calendar_id).await?;
    simple_success()
}

// ── Share rules ─────────────────────────────────────────────────────────────

async fn add_share_rule(hub: &Hub, params: &Value) -> HandlerResult {
    let calendar_id = calendar_id(params)?;
    let scope_type: ScopeType = parse_param(require_string_or(params, "scopeType", "scope_type")?)?;
    let value = require_string(params, "value")?;
    let role: Role = parse_param(require_string(params, "role")?)?;

    Ok(hub
        .calendar()
        .await?
        .add_share_rule(calendar_id, scope_type, value, role)
        .await?)
}

async fn get_share_rules(hub: &Hub, params: &Value) -> HandlerResult {
    let calendar_id = calendar_id(params)?;
    let rules = hub.calendar().await?.get_share_rules(calendar_id).await?;
    list_with_count("rules", rules)
}

async fn get_share_rule(hub: &Hub, params: &Value) -> HandlerResult {
    let calendar_id = calendar_id(params)?;
    let rule_id = rule_id(params)?;
    Ok(hub.calendar().await?.get_share_rule(calendar_id, rule_id).await?)
}

async fn update_share_rule(hub: &Hub, params: &Value) -> HandlerResult {
    let calendar_id = calendar_id(params)?;
    let rule_id = rule_id(params)?;
    let scope_type = optional_string_or(params, "scopeType", "scope_type")
        .map(parse_param::<ScopeType>)
        .transpose()?;
    let role = optional_string(params, "role")
        .map(parse_param::<Role>)
        .transpose()?;
    let value = optional_string(params, "value");

    Ok(hub
        .calendar()
        .await?
        .update_share_rule(calendar_id, rule_id, scope_type, value, role)
        .await?)
}

async fn remove_share_rule(hub: &Hub, params: &Value) -> HandlerResult {
    let calendar_id = calendar_id(params)?;
    let rule_id = rule_id(params)?;
    hub.calendar().await?.remove_share_rule(calendar_id, rule_id).await?;
    simple_success()
}
