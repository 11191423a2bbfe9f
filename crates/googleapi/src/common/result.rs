//! Common Result Type

use super::error::Error;

/// Library result type
pub type Result<T> = std::result::Result<T, Error>;
