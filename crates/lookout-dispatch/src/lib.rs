//! Lookout Dispatch - Query orchestration across lookup services.
//!
//! This crate fans a single query (username, email, image URL or link) out
//! to every registered [`ServiceAdapter`](lookout_core::ServiceAdapter) that
//! applies to it, and folds the results into a report.
//!
//! # Features
//!
//! - Bounded concurrency with a shared in-flight ceiling
//! - Per-service rate limiting
//! - Retry with exponential backoff and a longer wait after service blocks
//! - LRU result cache with per-kind TTLs
//! - Per-call timeouts and optional batch deadlines
//! - Bulk existence checks across platform probes
//! - Deterministic reports with cross-service correlation
//!
//! # Example
//!
//! ```rust,ignore
//! use lookout_dispatch::{Dispatcher, SearchRequest};
//!
//! let dispatcher = Dispatcher::builder()
//!     .adapter(github_adapter)
//!     .probes(platform_probes)
//!     .build()?;
//!
//! let records = dispatcher.search(SearchRequest::new("octocat")).await?;
//! let report = dispatcher.build_report(&records);
//!
//! let matrix = dispatcher.check_all("octocat", None).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[allow(missing_docs)]
pub mod bulk;
#[allow(missing_docs)]
pub mod cache;
pub mod dispatcher;
#[allow(missing_docs)]
pub mod error;
#[allow(missing_docs)]
pub mod filter;
pub mod rate_limit;
#[allow(missing_docs)]
pub mod report;
pub mod retry;

// Re-export commonly used types
pub use bulk::{reduce, ExistenceMatrix, PlatformStatus};
pub use cache::{is_cacheable, CacheStats, Fingerprint, ResultCache};
pub use dispatcher::{Dispatcher, DispatcherBuilder, SearchRequest};
pub use error::{DispatchError, Result};
pub use filter::AdapterFilter;
pub use rate_limit::RateLimiter;
pub use report::{
    build_report, CorrelationEntry, Report, ServiceGroup, Source, Summary, ValueShape,
};
pub use retry::{RetryDecision, RetryPolicy};
