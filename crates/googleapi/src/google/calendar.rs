//! Google Calendar API v3 Client
//!
//! Provides methods for interacting with Google Calendar API:
//! - Create/list/get/update/move/delete events
//! - Create/list/get/update/clear/delete calendars
//! - Manage share rules (ACL)
//!
//! Event and calendar bodies carry the configured time zone.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::client::GoogleClient;
use super::common::{segment, str_at};
use crate::auth::{
    build_service_account_credentials, ServiceAccountKey, ServiceAccountTokenSource, TokenSource,
};
use crate::common::{Error, Result};

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

pub const CALENDAR_SCOPES: [&str; 1] = ["https://www.googleapis.com/auth/calendar"];

pub const DEFAULT_TIME_ZONE: &str = "Europe/Brussels";

/// Who a share rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeType {
    User,
    Group,
    Domain,
}

impl ScopeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Domain => "domain",
        }
    }
}

impl FromStr for ScopeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "group" => Ok(Self::Group),
            "domain" => Ok(Self::Domain),
            other => Err(Error::invalid(format!(
                "Wrong scope type '{}', expected user, group or domain",
                other
            ))),
        }
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access level granted by a share rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Reader,
    Writer,
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Writer => "writer",
            Self::Owner => "owner",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reader" => Ok(Self::Reader),
            "writer" => Ok(Self::Writer),
            "owner" => Ok(Self::Owner),
            other => Err(Error::invalid(format!(
                "Wrong role '{}', expected reader, writer or owner",
                other
            ))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional new values for an event; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
    pub description: Option<String>,
    pub location: Option<String>,
}

impl EventUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.description.is_none()
            && self.location.is_none()
    }
}

/// Optional new values for a calendar
#[derive(Debug, Clone, Default)]
pub struct CalendarUpdate {
    pub title: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

impl CalendarUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.location.is_none() && self.description.is_none()
    }
}

pub struct CalendarApi {
    client: GoogleClient,
    base_url: String,
    time_zone: String,
}

super::google_api_wrapper!(CalendarApi);

/// Build a calendar client acting as `subject`.
pub async fn create_calendar(service_file: impl AsRef<Path>, subject: &str) -> Result<CalendarApi> {
    let key = ServiceAccountKey::from_file(service_file).await?;
    CalendarApi::from_service_account(key, subject)
}

impl CalendarApi {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Result<Self> {
        Ok(Self {
            client: GoogleClient::new(tokens)?,
            base_url: CALENDAR_API_BASE.to_string(),
            time_zone: DEFAULT_TIME_ZONE.to_string(),
        })
    }

    pub fn from_service_account(key: ServiceAccountKey, subject: &str) -> Result<Self> {
        let credentials = build_service_account_credentials(key, &CALENDAR_SCOPES, subject);
        Self::new(Arc::new(ServiceAccountTokenSource::new(credentials)?))
    }

    /// IANA time zone written into event and calendar bodies
    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    pub fn time_zone(&self) -> &str {
        &self.time_zone
    }

    fn calendar_url(&self, calendar_id: &str) -> String {
        format!("{}/calendars/{}", self.base_url, segment(calendar_id))
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> String {
        format!("{}/events/{}", self.calendar_url(calendar_id), segment(event_id))
    }

    fn acl_url(&self, calendar_id: &str) -> String {
        format!("{}/acl", self.calendar_url(calendar_id))
    }

    fn build_event_body(
        &self,
        title: &str,
        description: &str,
        location: &str,
        start: &DateTime<FixedOffset>,
        end: &DateTime<FixedOffset>,
    ) -> Value {
        json!({
            "summary": title,
            "location": location,
            "description": description,
            "start": {"dateTime": format_time(start), "timeZone": self.time_zone},
            "end": {"dateTime": format_time(end), "timeZone": self.time_zone},
        })
    }

    fn build_calendar_body(&self, title: &str, location: &str, description: &str) -> Value {
        json!({
            "summary": title,
            "location": location,
            "description": description,
            "timeZone": self.time_zone,
        })
    }

    // ── Events ──────────────────────────────────────────────────────────────

    /// Add an event to a calendar
    pub async fn add_event(
        &self,
        calendar_id: &str,
        title: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        description: &str,
        location: &str,
    ) -> Result<Value> {
        check_interval(&start, &end)?;

        info!("Creating event: {} in calendar: {}", title, calendar_id);

        let body = self.build_event_body(title, description, location, &start, &end);
        let url = format!("{}/events", self.calendar_url(calendar_id));
        let response = self.client.post(&url, &[], &body).await?;

        info!("Event created successfully");
        Ok(response)
    }

    /// List events ordered by start time
    ///
    /// Unless `get_all_events` is set only events that have not ended yet
    /// are returned.
    pub async fn get_events(&self, calendar_id: &str, get_all_events: bool) -> Result<Vec<Value>> {
        info!("Listing events for calendar: {}", calendar_id);

        let mut query = vec![
            ("orderBy", "startTime".to_string()),
            ("singleEvents", "true".to_string()),
        ];
        if !get_all_events {
            query.push(("timeMin", Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)));
        }

        let url = format!("{}/events", self.calendar_url(calendar_id));
        let events = self.client.get_paginated(&url, &query, "items", None).await?;

        debug!("Retrieved {} events", events.len());
        Ok(events)
    }

    pub async fn get_event(&self, calendar_id: &str, event_id: &str) -> Result<Value> {
        info!("Fetching event: {} from calendar: {}", event_id, calendar_id);
        self.client.get(&self.event_url(calendar_id, event_id), &[]).await
    }

    pub async fn remove_event(&self, calendar_id: &str, event_id: &str) -> Result<()> {
        info!("Deleting event: {} from calendar: {}", event_id, calendar_id);

        self.client.delete(&self.event_url(calendar_id, event_id), &[]).await?;

        info!("Event deleted successfully");
        Ok(())
    }

    /// Update an existing event, keeping current values for unset fields
    pub async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        update: EventUpdate,
    ) -> Result<Value> {
        if update.is_empty() {
            return Err(Error::nothing_to_update("Update arguments don't have a value"));
        }

        let current = self.get_event(calendar_id, event_id).await?;

        let current_title = str_at(&current, "/summary");
        let current_description = str_at(&current, "/description");
        let current_location = str_at(&current, "/location");
        let current_start = event_time(&current, "/start/dateTime");
        let current_end = event_time(&current, "/end/dateTime");

        let start = update
            .start
            .or(current_start)
            .ok_or_else(|| Error::invalid("Event has no start time, provide one"))?;
        let end = update
            .end
            .or(current_end)
            .ok_or_else(|| Error::invalid("Event has no end time, provide one"))?;
        let title = update.title.unwrap_or_else(|| current_title.clone());
        let description = update.description.unwrap_or_else(|| current_description.clone());
        let location = update.location.unwrap_or_else(|| current_location.clone());

        if title == current_title
            && description == current_description
            && location == current_location
            && Some(start) == current_start
            && Some(end) == current_end
        {
            return Err(Error::nothing_to_update("Not a single parameter gets a new value"));
        }
        check_interval(&start, &end)?;

        info!("Updating event: {} in calendar: {}", event_id, calendar_id);

        let body = self.build_event_body(&title, &description, &location, &start, &end);
        let response = self
            .client
            .put(&self.event_url(calendar_id, event_id), &body)
            .await?;

        info!("Event updated successfully");
        Ok(response)
    }

    /// Move an event to another calendar
    pub async fn move_event(
        &self,
        event_id: &str,
        old_calendar_id: &str,
        new_calendar_id: &str,
    ) -> Result<Value> {
        info!(
            "Moving event: {} from {} to {}",
            event_id, old_calendar_id, new_calendar_id
        );

        let url = format!("{}/move", self.event_url(old_calendar_id, event_id));
        let query = [("destination", new_calendar_id.to_string())];
        self.client.post(&url, &query, &json!({})).await
    }

    // ── Calendars ───────────────────────────────────────────────────────────

    pub async fn add_calendar(&self, title: &str, location: &str, description: &str) -> Result<Value> {
        info!("Creating calendar: {}", title);

        let body = self.build_calendar_body(title, location, description);
        let url = format!("{}/calendars", self.base_url);
        self.client.post(&url, &[], &body).await
    }

    /// All calendars in the subject's calendar list
    pub async fn get_calendars(&self) -> Result<Vec<Value>> {
        info!("Listing Google calendars");

        let url = format!("{}/users/me/calendarList", self.base_url);
        let calendars = self.client.get_paginated(&url, &[], "items", None).await?;

        debug!("Retrieved {} calendars", calendars.len());
        Ok(calendars)
    }

    pub async fn get_calendar(&self, calendar_id: &str) -> Result<Value> {
        info!("Fetching calendar: {}", calendar_id);
        self.client.get(&self.calendar_url(calendar_id), &[]).await
    }

    pub async fn update_calendar(&self, calendar_id: &str, update: CalendarUpdate) -> Result<Value> {
        if update.is_empty() {
            return Err(Error::nothing_to_update("Not a single argument is updated"));
        }

        let current = self.get_calendar(calendar_id).await?;
        let current_title = str_at(&current, "/summary");
        let current_location = str_at(&current, "/location");
        let current_description = str_at(&current, "/description");

        let title = update.title.unwrap_or_else(|| current_title.clone());
        let location = update.location.unwrap_or_else(|| current_location.clone());
        let description = update.description.unwrap_or_else(|| current_description.clone());

        if title == current_title && location == current_location && description == current_description {
            return Err(Error::nothing_to_update("Not a single parameter gets a new value"));
        }

        info!("Updating calendar: {}", calendar_id);

        let body = self.build_calendar_body(&title, &location, &description);
        self.client.put(&self.calendar_url(calendar_id), &body).await
    }

    pub async fn remove_calendar(&self, calendar_id: &str) -> Result<()> {
        info!("Deleting calendar: {}", calendar_id);

        self.client.delete(&self.calendar_url(calendar_id), &[]).await?;
        Ok(())
    }

    /// Remove every event from a calendar
    pub async fn clear_calendar(&self, calendar_id: &str) -> Result<()> {
        info!("Clearing calendar: {}", calendar_id);

        let url = format!("{}/clear", self.calendar_url(calendar_id));
        self.client.post(&url, &[], &json!({})).await?;
        Ok(())
    }

    // ── Share rules ─────────────────────────────────────────────────────────

    /// Share a calendar; returns the created rule (its `id` identifies it)
    pub async fn add_share_rule(
        &self,
        calendar_id: &str,
        scope_type: ScopeType,
        value: &str,
        role: Role,
    ) -> Result<Value> {
        info!("Sharing calendar {} with {} {} as {}", calendar_id, scope_type, value, role);

        let rule = scope_body(scope_type.as_str(), value, role.as_str());
        self.client.post(&self.acl_url(calendar_id), &[], &rule).await
    }

    pub async fn get_share_rules(&self, calendar_id: &str) -> Result<Vec<Value>> {
        info!("Listing share rules of calendar: {}", calendar_id);

        let rules = self
            .client
            .get_paginated(&self.acl_url(calendar_id), &[], "items", None)
            .await?;

        debug!("Retrieved {} share rules", rules.len());
        Ok(rules)
    }

    pub async fn get_share_rule(&self, calendar_id: &str, rule_id: &str) -> Result<Value> {
        let url = format!("{}/{}", self.acl_url(calendar_id), segment(rule_id));
        self.client.get(&url, &[]).await
    }

    pub async fn update_share_rule(
        &self,
        calendar_id: &str,
        rule_id: &str,
        scope_type: Option<ScopeType>,
        value: Option<&str>,
        role: Option<Role>,
    ) -> Result<Value> {
        if scope_type.is_none() && value.is_none() && role.is_none() {
            return Err(Error::nothing_to_update("Not a single argument is updated"));
        }

        // Current values may use kinds this client never sets (`default`, `freeBusyReader`)
        let current = self.get_share_rule(calendar_id, rule_id).await?;
        let current_scope = str_at(&current, "/scope/type");
        let current_value = str_at(&current, "/scope/value");
        let current_role = str_at(&current, "/role");

        let scope_type = scope_type.map_or_else(|| current_scope.clone(), |s| s.as_str().to_string());
        let value = value.map(str::to_string).unwrap_or_else(|| current_value.clone());
        let role = role.map_or_else(|| current_role.clone(), |r| r.as_str().to_string());

        if scope_type == current_scope && value == current_value && role == current_role {
            return Err(Error::nothing_to_update("Not a single parameter gets a new value"));
        }

        info!("Updating share rule {} of calendar {}", rule_id, calendar_id);

        let url = format!("{}/{}", self.acl_url(calendar_id), segment(rule_id));
        self.client.put(&url, &scope_body(&scope_type, &value, &role)).await
    }

    pub async fn remove_share_rule(&self, calendar_id: &str, rule_id: &str) -> Result<()> {
        info!("Removing share rule {} from calendar {}", rule_id, calendar_id);

        let url = format!("{}/{}", self.acl_url(calendar_id), segment(rule_id));
        self.client.delete(&url, &[]).await?;
        Ok(())
    }
}

/// The `default` scope has no value
fn scope_body(scope_type: &str, value: &str, role: &str) -> Value {
    let mut scope = json!({ "type": scope_type });
    if !value.is_empty() {
        scope["value"] = json!(value);
    }
    json!({ "scope": scope, "role": role })
}

fn format_time(time: &DateTime<FixedOffset>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// RFC 3339 timestamp at `pointer`; all-day events have none
fn event_time(event: &Value, pointer: &str) -> Option<DateTime<FixedOffset>> {
    event
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

fn check_interval(start: &DateTime<FixedOffset>, end: &DateTime<FixedOffset>) -> Result<()> {
    if end < start {
        return Err(Error::invalid("Event end time is before its start time"));
    }
    Ok(())
}
