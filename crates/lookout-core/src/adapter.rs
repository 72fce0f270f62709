//! The capability every lookup service implements.

use crate::record::ResultRecord;
use crate::types::{Category, QueryKind, ServiceId};
use async_trait::async_trait;

/// A component wrapping one external lookup service.
///
/// Adapters are registered once with a dispatcher and shared across tasks,
/// so implementations must be `Send + Sync`.
#[async_trait]
pub trait ServiceAdapter: Send + Sync {
    /// Identifier of the wrapped service. Also the rate-limiter and cache key.
    fn service_id(&self) -> &ServiceId;

    /// Category used to filter dispatch.
    fn category(&self) -> Category;

    /// Whether the adapter can handle queries of this kind.
    ///
    /// Adapters that return `false` are never invoked for that kind.
    fn applies(&self, kind: QueryKind) -> bool;

    /// Run one lookup attempt.
    ///
    /// Must not panic or return early with an error: every failure mode is
    /// reported as a failed [`ResultRecord`] with a populated error.
    async fn execute(&self, query: &str, kind: QueryKind) -> ResultRecord;
}
