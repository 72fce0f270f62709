//! Lookout Platforms - Platform definitions and existence probes.
//!
//! This crate describes the sites checked by bulk verification. It loads
//! TOML platform definitions, keeps them in a registry and turns each one
//! into a rule-based [`PlatformProbe`] adapter. It also provides the
//! fetch-backed link adapters used for shortened links and image URLs.
//!
//! # Architecture
//!
//! - **Definition Types** ([`definition`]): URL template and existence indicators
//! - **Loader** ([`loader`]): TOML file loading from `platform-definitions/`, plus the built-in set
//! - **Registry** ([`registry`]): In-memory, ID-ordered cache
//! - **Fetcher** ([`fetch`]): `PageFetcher` capability and its `reqwest` implementation
//! - **Probe** ([`probe`]): `ServiceAdapter` applying a definition's indicators
//! - **Links** ([`links`]): Link expansion and reverse-image search adapters
//! - **Errors** ([`error`]): Platform-specific error types
//!
//! # Example
//!
//! ```rust,no_run
//! use lookout_core::HttpConfig;
//! use lookout_platforms::{HttpFetcher, PlatformRegistry};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = PlatformRegistry::with_builtin()?;
//! let fetcher = Arc::new(HttpFetcher::new(&HttpConfig::default())?);
//! let probes = lookout_platforms::probes_for(&registry, fetcher);
//! assert_eq!(probes.len(), registry.count());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod definition;
pub mod error;
pub mod fetch;
pub mod links;
pub mod loader;
pub mod probe;
pub mod registry;

use std::sync::Arc;

// Re-export commonly used types
pub use definition::{Indicators, PlatformDefinition, PlatformMetadata};
pub use error::{PlatformError, Result};
pub use fetch::{FetchError, FetchedPage, HttpFetcher, PageFetcher};
pub use links::{LinkExpander, ReverseImageSearch};
pub use loader::{builtin_definitions, PlatformLoader};
pub use probe::{judge_page, PageVerdict, PlatformProbe};
pub use registry::PlatformRegistry;

/// Build one probe per registered platform, ordered by platform ID.
#[must_use]
pub fn probes_for(registry: &PlatformRegistry, fetcher: Arc<dyn PageFetcher>) -> Vec<PlatformProbe> {
    registry
        .get_all()
        .into_iter()
        .map(|definition| PlatformProbe::new(definition, Arc::clone(&fetcher)))
        .collect()
}
