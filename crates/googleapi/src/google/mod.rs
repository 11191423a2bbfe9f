//! Google API Client Module
//!
//! Provides authenticated HTTP client access to Google APIs (Directory,
//! Calendar, Gmail, Drive, Wallet) plus the API-key based Maps endpoints
//! (Places, Geocoding).

pub mod calendar;
pub mod client;
pub mod common;
pub mod directory;
pub mod drive;
pub mod geocoding;
pub mod gmail;
pub mod places;
pub mod wallet;

pub use calendar::CalendarApi;
pub use client::GoogleClient;
pub use directory::DirectoryApi;
pub use drive::DriveApi;
pub use geocoding::Geocoding;
pub use gmail::GmailApi;
pub use places::Places;
pub use wallet::WalletApi;

/// Macro to implement the standard Google API wrapper base-URL override.
/// Each API struct stores its REST root in `base_url`.
macro_rules! google_api_wrapper {
    ($name:ident) => {
        impl $name {
            /// Point the client at another API root (local test servers, proxies)
            pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
                self.base_url = base_url.into().trim_end_matches('/').to_string();
                self
            }

            /// REST root this client talks to
            pub fn base_url(&self) -> &str {
                &self.base_url
            }
        }
    };
}

pub(crate) use google_api_wrapper;
