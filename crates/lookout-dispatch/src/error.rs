use lookout_core::{ConfigError, LookoutError};
use thiserror::Error;

/// Errors surfaced at the whole-call boundary.
///
/// Individual adapter failures are never reported here; they are carried
/// in the returned result records.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid query '{query}': {reason}")]
    InvalidQuery { query: String, reason: String },

    #[error("service {service_id} is registered more than once")]
    DuplicateService { service_id: String },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid identifier: {0}")]
    InvalidId(#[from] LookoutError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
