//! Rule-based existence probe.
//!
//! [`PlatformProbe`] adapts a [`PlatformDefinition`] into a
//! [`ServiceAdapter`]: it fetches the profile page and applies the
//! definition's indicators to decide whether the account exists.

use crate::definition::PlatformDefinition;
use crate::fetch::{FetchedPage, PageFetcher};
use async_trait::async_trait;
use lookout_core::record::presence_value;
use lookout_core::{
    is_username, Category, FailureKind, Payload, Presence, QueryKind, ResultRecord,
    ServiceAdapter, ServiceId, PRESENCE_KEY, PROFILE_URL_KEY,
};
use serde_json::Value;
use std::sync::Arc;

/// Markers of an interstitial challenge page.
const CAPTCHA_MARKERS: &[&str] = &["g-recaptcha", "h-captcha", "cf-challenge"];

/// What a fetched page says about the probed account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageVerdict {
    /// A found indicator matched
    Found,
    /// The status or a not-found indicator proves absence
    NotFound,
    /// The page carried neither indicator
    Ambiguous,
    /// The platform refused the request (403/429 or a CAPTCHA wall)
    Blocked,
    /// The platform failed server-side (5xx)
    ServerError,
    /// Any other status
    Unexpected,
}

/// Apply a definition's rules to a fetched page.
///
/// Not-found indicators win over found indicators. A 2xx page matching
/// neither is [`PageVerdict::Ambiguous`]; existence is never assumed.
#[must_use]
pub fn judge_page(definition: &PlatformDefinition, page: &FetchedPage) -> PageVerdict {
    match page.status {
        404 | 410 => return PageVerdict::NotFound,
        403 | 429 => return PageVerdict::Blocked,
        500..=599 => return PageVerdict::ServerError,
        200..=299 => {}
        _ => return PageVerdict::Unexpected,
    }

    let body = page.body.to_lowercase();
    let contains = |needle: &String| body.contains(&needle.to_lowercase());

    if CAPTCHA_MARKERS.iter().any(|marker| body.contains(marker)) {
        PageVerdict::Blocked
    } else if definition.indicators.not_found.iter().any(contains) {
        PageVerdict::NotFound
    } else if definition.indicators.found.iter().any(contains) {
        PageVerdict::Found
    } else {
        PageVerdict::Ambiguous
    }
}

/// Existence probe for one platform.
pub struct PlatformProbe {
    definition: PlatformDefinition,
    fetcher: Arc<dyn PageFetcher>,
}

impl PlatformProbe {
    /// Create a probe from a definition and a fetcher.
    #[must_use]
    pub fn new(definition: PlatformDefinition, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            definition,
            fetcher,
        }
    }

    /// The definition this probe applies.
    #[must_use]
    pub fn definition(&self) -> &PlatformDefinition {
        &self.definition
    }

    fn payload(&self, presence: Presence, url: &str) -> Payload {
        let mut payload = Payload::new();
        payload.insert(PRESENCE_KEY.to_string(), presence_value(presence));
        payload.insert(PROFILE_URL_KEY.to_string(), Value::from(url));
        payload.insert(
            "platform".to_string(),
            Value::from(self.definition.name()),
        );
        payload
    }
}

#[async_trait]
impl ServiceAdapter for PlatformProbe {
    fn service_id(&self) -> &ServiceId {
        self.definition.id()
    }

    fn category(&self) -> Category {
        Category::Platform
    }

    fn applies(&self, kind: QueryKind) -> bool {
        kind == QueryKind::Username
    }

    async fn execute(&self, query: &str, kind: QueryKind) -> ResultRecord {
        let service = self.definition.id().clone();
        if !is_username(query.trim()) {
            return ResultRecord::failed(
                service,
                query,
                kind,
                FailureKind::Adapter,
                format!("'{}' is not a probeable username", query.trim()),
            );
        }
        let url = self.definition.profile_url(query);

        let page = match self.fetcher.fetch(&url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::debug!(platform = %service, error = %e, "probe fetch failed");
                return ResultRecord::failed(
                    service,
                    query,
                    kind,
                    FailureKind::Transport,
                    e.to_string(),
                );
            }
        };

        let status = page.status;
        let record = match judge_page(&self.definition, &page) {
            PageVerdict::Found => {
                ResultRecord::success(service, query, kind, self.payload(Presence::Found, &url))
            }
            PageVerdict::NotFound => ResultRecord::not_found(service, query, kind),
            PageVerdict::Ambiguous => {
                ResultRecord::success(service, query, kind, self.payload(Presence::Ambiguous, &url))
            }
            PageVerdict::Blocked => ResultRecord::failed(
                service,
                query,
                kind,
                FailureKind::Blocked,
                format!("{} blocked the request (HTTP {status})", self.definition.name()),
            ),
            PageVerdict::ServerError => ResultRecord::failed(
                service,
                query,
                kind,
                FailureKind::Transport,
                format!("{} returned server error HTTP {status}", self.definition.name()),
            ),
            PageVerdict::Unexpected => ResultRecord::failed(
                service,
                query,
                kind,
                FailureKind::Adapter,
                format!("unexpected HTTP {status} from {url}"),
            ),
        };

        record.with_status(status)
    }
}
