//! Bulk existence verification.
//!
//! Checks one identifier against every registered platform probe (or a
//! requested subset) and reduces the records into an [`ExistenceMatrix`].

use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, Result};
use lookout_core::{is_username, Presence, QueryKind, ResultRecord, ServiceAdapter, ServiceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of checking one platform.
///
/// `exists` is only `Some` when the platform answered conclusively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformStatus {
    pub checked: bool,
    pub exists: Option<bool>,
    pub profile_url: Option<String>,
    pub error: Option<String>,
}

impl PlatformStatus {
    fn unchecked(error: impl Into<String>) -> Self {
        Self {
            checked: false,
            exists: None,
            profile_url: None,
            error: Some(error.into()),
        }
    }
}

/// Existence of one identifier across platforms, keyed by platform ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistenceMatrix {
    pub identifier: String,
    pub platforms: BTreeMap<String, PlatformStatus>,
}

impl ExistenceMatrix {
    /// Status for one platform.
    #[must_use]
    pub fn get(&self, platform: &str) -> Option<&PlatformStatus> {
        self.platforms.get(platform)
    }

    /// Platforms where the identifier was found, with their profile URLs.
    pub fn found(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.platforms
            .iter()
            .filter(|(_, status)| status.exists == Some(true))
            .map(|(id, status)| (id.as_str(), status.profile_url.as_deref()))
    }

    /// Number of platforms that answered conclusively.
    #[must_use]
    pub fn conclusive_count(&self) -> usize {
        self.platforms
            .values()
            .filter(|status| status.exists.is_some())
            .count()
    }

    /// Number of platforms that could not be checked.
    #[must_use]
    pub fn unchecked_count(&self) -> usize {
        self.platforms.values().filter(|status| !status.checked).count()
    }
}

/// Reduce a probe record to a platform status.
#[must_use]
pub fn reduce(record: &ResultRecord) -> PlatformStatus {
    if let Some(failure) = record.failure() {
        return PlatformStatus {
            checked: !failure.is_timeout(),
            exists: None,
            profile_url: None,
            error: record.error().map(str::to_string),
        };
    }

    match record.presence() {
        Some(Presence::Found) => PlatformStatus {
            checked: true,
            exists: Some(true),
            profile_url: record.profile_url().map(str::to_string),
            error: None,
        },
        Some(Presence::NotFound) => PlatformStatus {
            checked: true,
            exists: Some(false),
            profile_url: None,
            error: None,
        },
        Some(Presence::Ambiguous) | None => PlatformStatus {
            checked: true,
            exists: None,
            profile_url: record.profile_url().map(str::to_string),
            error: Some("ambiguous response".to_string()),
        },
    }
}

impl Dispatcher {
    /// Check whether `identifier` exists on each registered platform.
    ///
    /// With `platforms`, only those platform IDs are checked; IDs without a
    /// registered probe are reported as unchecked. Probes share the
    /// dispatcher's concurrency ceiling, rate limiter, retry policy and
    /// cache.
    ///
    /// # Errors
    /// Returns [`DispatchError::InvalidQuery`] if the identifier is empty or
    /// is not shaped like a username.
    pub async fn check_all(
        &self,
        identifier: &str,
        platforms: Option<&[ServiceId]>,
    ) -> Result<ExistenceMatrix> {
        self.check(identifier, platforms, self.default_deadline).await
    }

    /// Like [`Dispatcher::check_all`], but stop waiting after `deadline`.
    ///
    /// Platforms still pending at the deadline are reported as unchecked.
    ///
    /// # Errors
    /// Returns [`DispatchError::InvalidQuery`] if the identifier is empty or
    /// is not shaped like a username.
    pub async fn check_all_within(
        &self,
        identifier: &str,
        platforms: Option<&[ServiceId]>,
        deadline: Duration,
    ) -> Result<ExistenceMatrix> {
        self.check(identifier, platforms, Some(deadline)).await
    }

    async fn check(
        &self,
        identifier: &str,
        platforms: Option<&[ServiceId]>,
        deadline: Option<Duration>,
    ) -> Result<ExistenceMatrix> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(DispatchError::InvalidQuery {
                query: identifier.to_string(),
                reason: "identifier is empty".to_string(),
            });
        }
        if !is_username(identifier) {
            return Err(DispatchError::InvalidQuery {
                query: identifier.to_string(),
                reason: "identifier must be 2-30 letters, digits, '_', '.' or '-'".to_string(),
            });
        }

        let requested = |probe: &Arc<dyn ServiceAdapter>| {
            platforms.map_or(true, |ids| ids.contains(probe.service_id()))
        };
        let selected: Vec<_> = self
            .probes
            .iter()
            .filter(|&probe| probe.applies(QueryKind::Username) && requested(probe))
            .cloned()
            .collect();

        tracing::info!(
            identifier,
            platforms = selected.len(),
            "checking identifier across platforms"
        );

        let records = self
            .run_batch(&selected, identifier, QueryKind::Username, deadline)
            .await;

        let mut matrix = ExistenceMatrix {
            identifier: identifier.to_string(),
            platforms: records
                .iter()
                .map(|record| (record.service().to_string(), reduce(record)))
                .collect(),
        };

        for id in platforms.unwrap_or_default() {
            matrix
                .platforms
                .entry(id.to_string())
                .or_insert_with(|| PlatformStatus::unchecked("no probe registered"));
        }

        Ok(matrix)
    }
}
