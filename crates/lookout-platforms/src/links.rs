//! Link adapters.
//!
//! [`LinkExpander`] follows a shortened or plain link to its destination.
//! [`ReverseImageSearch`] confirms an image is reachable and emits the
//! reverse-image search and EXIF viewer links for it.

use crate::error::Result;
use crate::fetch::{FetchedPage, PageFetcher};
use async_trait::async_trait;
use lookout_core::{
    Category, FailureKind, Payload, QueryKind, ResultRecord, ServiceAdapter, ServiceId,
};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Service ID of the link expander.
pub const LINK_EXPANDER_ID: &str = "link-expander";

/// Service ID of the reverse-image link builder.
pub const REVERSE_IMAGE_ID: &str = "reverse-image";

/// Reverse-image search engines, as `(name, template)` with one `{}` for the
/// encoded image URL.
pub const REVERSE_IMAGE_ENGINES: &[(&str, &str)] = &[
    ("google", "https://www.google.com/searchbyimage?&image_url={}"),
    (
        "yandex",
        "https://yandex.com/images/search?source=collections&rpt=imageview&url={}",
    ),
    ("tineye", "https://www.tineye.com/search/?url={}"),
    (
        "bing",
        "https://www.bing.com/images/search?view=detailv2&iss=sbi&form=SBIIRP&sbisrc=UrlPaste&q=imgurl:{}",
    ),
    (
        "baidu",
        "https://graph.baidu.com/details?isfromtusoupc=1&tn=pc&carousel=0&image={}",
    ),
];

/// EXIF viewer template.
pub const EXIF_VIEWER: &str = "http://exif.regex.info/exif.cgi?&url={}";

/// Parse a link query, assuming `https://` when the scheme is missing.
fn parse_link(query: &str) -> Option<Url> {
    let query = query.trim();
    let lowered = query.to_ascii_lowercase();
    let candidate = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        query.to_string()
    } else {
        format!("https://{query}")
    };

    Url::parse(&candidate)
        .ok()
        .filter(|url| url.host_str().is_some_and(|host| !host.is_empty()))
}

/// Map a fetched page onto a record, leaving 2xx pages to `on_success`.
fn record_for_page(
    service: ServiceId,
    query: &str,
    kind: QueryKind,
    page: &FetchedPage,
    on_success: impl FnOnce() -> Payload,
) -> ResultRecord {
    let status = page.status;
    let record = match status {
        200..=299 => ResultRecord::success(service, query, kind, on_success()),
        404 | 410 => ResultRecord::not_found(service, query, kind),
        403 | 429 => ResultRecord::failed(
            service,
            query,
            kind,
            FailureKind::Blocked,
            format!("request blocked (HTTP {status})"),
        ),
        500..=599 => ResultRecord::failed(
            service,
            query,
            kind,
            FailureKind::Transport,
            format!("server error HTTP {status}"),
        ),
        _ => ResultRecord::failed(
            service,
            query,
            kind,
            FailureKind::Adapter,
            format!("unexpected HTTP {status}"),
        ),
    };
    record.with_status(status)
}

fn invalid_link(service: ServiceId, query: &str, kind: QueryKind) -> ResultRecord {
    ResultRecord::failed(
        service,
        query,
        kind,
        FailureKind::Adapter,
        format!("'{}' is not a valid link", query.trim()),
    )
}

/// Follows redirects to reveal where a link leads.
pub struct LinkExpander {
    id: ServiceId,
    fetcher: Arc<dyn PageFetcher>,
}

impl LinkExpander {
    /// Create an expander using `fetcher`, which must follow redirects.
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        Ok(Self {
            id: ServiceId::new(LINK_EXPANDER_ID)?,
            fetcher,
        })
    }
}

#[async_trait]
impl ServiceAdapter for LinkExpander {
    fn service_id(&self) -> &ServiceId {
        &self.id
    }

    fn category(&self) -> Category {
        Category::Utility
    }

    fn applies(&self, kind: QueryKind) -> bool {
        matches!(kind, QueryKind::ShortLink | QueryKind::Url)
    }

    async fn execute(&self, query: &str, kind: QueryKind) -> ResultRecord {
        let Some(link) = parse_link(query) else {
            return invalid_link(self.id.clone(), query, kind);
        };

        let page = match self.fetcher.fetch(link.as_str()).await {
            Ok(page) => page,
            Err(e) => {
                tracing::debug!(link = %link, error = %e, "link expansion failed");
                return ResultRecord::failed(
                    self.id.clone(),
                    query,
                    kind,
                    FailureKind::Transport,
                    e.to_string(),
                );
            }
        };

        record_for_page(self.id.clone(), query, kind, &page, || {
            let destination = page
                .final_url
                .as_deref()
                .and_then(|url| Url::parse(url).ok())
                .unwrap_or_else(|| link.clone());

            let mut payload = Payload::new();
            payload.insert(
                "expanded_url".to_string(),
                Value::from(destination.as_str()),
            );
            payload.insert(
                "redirected".to_string(),
                Value::from(destination != link),
            );
            if let Some(host) = destination.host_str() {
                payload.insert("host".to_string(), Value::from(host));
            }
            payload
        })
    }
}

/// Builds reverse-image search links for a reachable image.
pub struct ReverseImageSearch {
    id: ServiceId,
    fetcher: Arc<dyn PageFetcher>,
}

impl ReverseImageSearch {
    /// Create the adapter using `fetcher` to confirm images are reachable.
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        Ok(Self {
            id: ServiceId::new(REVERSE_IMAGE_ID)?,
            fetcher,
        })
    }

    /// Search and EXIF viewer links for `image`.
    #[must_use]
    pub fn links_for(image: &Url) -> Payload {
        let encoded = urlencoding::encode(image.as_str());

        let engines: Payload = REVERSE_IMAGE_ENGINES
            .iter()
            .map(|(name, template)| {
                (
                    (*name).to_string(),
                    Value::from(template.replacen("{}", &encoded, 1)),
                )
            })
            .collect();

        let mut payload = Payload::new();
        payload.insert("image_url".to_string(), Value::from(image.as_str()));
        payload.insert("search_links".to_string(), Value::Object(engines));
        payload.insert(
            "exif_url".to_string(),
            Value::from(EXIF_VIEWER.replacen("{}", &encoded, 1)),
        );
        payload
    }
}

#[async_trait]
impl ServiceAdapter for ReverseImageSearch {
    fn service_id(&self) -> &ServiceId {
        &self.id
    }

    fn category(&self) -> Category {
        Category::Image
    }

    fn applies(&self, kind: QueryKind) -> bool {
        kind == QueryKind::ImageUrl
    }

    async fn execute(&self, query: &str, kind: QueryKind) -> ResultRecord {
        let Some(image) = parse_link(query) else {
            return invalid_link(self.id.clone(), query, kind);
        };

        let page = match self.fetcher.fetch(image.as_str()).await {
            Ok(page) => page,
            Err(e) => {
                return ResultRecord::failed(
                    self.id.clone(),
                    query,
                    kind,
                    FailureKind::Transport,
                    e.to_string(),
                );
            }
        };

        record_for_page(self.id.clone(), query, kind, &page, || {
            let mut payload = Self::links_for(&image);
            payload.insert("content_length".to_string(), Value::from(page.body.len()));
            payload
        })
    }
}
