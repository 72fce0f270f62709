//! Lookout Core - Foundation crate for the Lookout query-orchestration engine.
//!
//! This crate provides the shared types, the uniform result record, the
//! adapter capability, query classification and configuration that the
//! other Lookout crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`ServiceId`, `QueryKind`, `Category`, `FailureKind`)
//! - [`record`] - The immutable `ResultRecord`
//! - [`adapter`] - The `ServiceAdapter` capability
//! - [`classify`] - Pluggable query classification
//!
//! # Example
//!
//! ```rust
//! use lookout_core::{Classification, PatternClassifier, QueryClassifier, QueryKind};
//!
//! let classifier = PatternClassifier::new();
//! assert_eq!(
//!     classifier.classify("https://bit.ly/abc123"),
//!     Classification::Known(QueryKind::ShortLink)
//! );
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod adapter;
pub mod classify;
pub mod config;
pub mod error;
pub mod record;
pub mod types;

// Re-export commonly used types
pub use adapter::ServiceAdapter;
pub use classify::{is_username, Classification, PatternClassifier, QueryClassifier};
pub use config::{
    CacheConfig, DispatchConfig, HttpConfig, LookoutConfig, RateLimitConfig, RetryConfig,
};
pub use error::{ConfigError, ConfigResult, LookoutError, Result};
pub use record::{Payload, ResultRecord, PRESENCE_KEY, PROFILE_URL_KEY};
pub use types::{Category, FailureKind, Presence, QueryKind, ServiceId};
