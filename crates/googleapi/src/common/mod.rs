//! Common Utilities
//!
//! Shared error type, result alias and HTTP client construction.

pub mod error;
pub mod http;
pub mod result;

pub use error::Error;
pub use http::{create_http_client, create_http_client_with_timeout};
pub use result::Result;
