//! Integration tests for link and image searches.

use async_trait::async_trait;
use lookout_core::{QueryKind, ServiceAdapter};
use lookout_dispatch::{Dispatcher, RateLimiter, SearchRequest};
use lookout_platforms::{FetchError, FetchedPage, LinkExpander, PageFetcher, ReverseImageSearch};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Serves canned pages by URL; anything else is a 404.
struct ScriptedFetcher {
    pages: HashMap<&'static str, FetchedPage>,
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        Ok(self.pages.get(url).cloned().unwrap_or(FetchedPage {
            status: 404,
            body: String::new(),
            final_url: None,
        }))
    }
}

fn dispatcher() -> Dispatcher {
    let fetcher: Arc<dyn PageFetcher> = Arc::new(ScriptedFetcher {
        pages: HashMap::from([
            (
                "https://bit.ly/3abc",
                FetchedPage {
                    status: 200,
                    body: "<html>article</html>".to_string(),
                    final_url: Some("https://news.example.com/story".to_string()),
                },
            ),
            (
                "https://cdn.example.com/photo.jpg",
                FetchedPage {
                    status: 200,
                    body: "binary".to_string(),
                    final_url: None,
                },
            ),
        ]),
    });

    let expander = LinkExpander::new(Arc::clone(&fetcher)).expect("create expander");
    let images = ReverseImageSearch::new(fetcher).expect("create reverse image adapter");

    Dispatcher::builder()
        .adapter(Arc::new(expander) as Arc<dyn ServiceAdapter>)
        .adapter(Arc::new(images) as Arc<dyn ServiceAdapter>)
        .rate_limiter(Arc::new(RateLimiter::new(Duration::ZERO)))
        .build()
        .expect("build dispatcher")
}

#[tokio::test]
async fn test_short_link_search_expands_link() {
    let dispatcher = dispatcher();

    let records = dispatcher
        .search(SearchRequest::new("https://bit.ly/3abc"))
        .await
        .expect("search");

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].service().as_str(), "link-expander");
    assert_eq!(records[0].query_kind(), QueryKind::ShortLink);
    assert_eq!(
        records[0].payload()["expanded_url"],
        "https://news.example.com/story"
    );

    let report = dispatcher.build_report(&records);
    assert!(report
        .correlation
        .iter()
        .any(|entry| entry.value == "https://news.example.com/story"));
}

#[tokio::test]
async fn test_image_search_emits_reverse_search_links() {
    let dispatcher = dispatcher();

    let records = dispatcher
        .search(SearchRequest::new("https://cdn.example.com/photo.jpg"))
        .await
        .expect("search");

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].service().as_str(), "reverse-image");
    assert!(records[0].is_success());
    assert!(records[0].payload()["search_links"]["google"]
        .as_str()
        .is_some_and(|url| url.starts_with("https://www.google.com/searchbyimage")));
}

#[tokio::test]
async fn test_dead_short_link_is_not_found() {
    let dispatcher = dispatcher();

    let records = dispatcher
        .search(SearchRequest::new("https://bit.ly/missing"))
        .await
        .expect("search");

    assert!(records[0].is_not_found());
    assert_eq!(dispatcher.build_report(&records).summary.not_found, 1);
}
