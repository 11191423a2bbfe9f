//! Async wrappers around the Google Workspace APIs a student-association hub
//! relies on: Admin SDK directory, Calendar, Gmail, Drive, Wallet, plus the
//! API-key based Places and Geocoding endpoints.
//!
//! All Workspace clients authenticate with a service account key, optionally
//! impersonating a domain user.

pub mod auth;
pub mod common;
pub mod config;
pub mod google;

#[cfg(test)]
mod test_support;

pub use auth::{ServiceAccountKey, StaticToken, TokenSource};
pub use common::{Error, Result};
pub use config::HubConfig;
pub use google::{
    CalendarApi, DirectoryApi, DriveApi, Geocoding, GmailApi, GoogleClient, Places, WalletApi,
};
