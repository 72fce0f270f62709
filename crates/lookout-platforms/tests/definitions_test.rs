use async_trait::async_trait;
use lookout_core::{Presence, QueryKind, ServiceAdapter, ServiceId};
use lookout_platforms::{
    builtin_definitions, probes_for, FetchError, FetchedPage, PageFetcher, PlatformLoader,
    PlatformRegistry,
};
use std::sync::{Arc, Mutex};

/// Fetcher that records requested URLs and serves a fixed page.
struct RecordingFetcher {
    urls: Mutex<Vec<String>>,
    page: FetchedPage,
}

#[async_trait]
impl PageFetcher for RecordingFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.urls.lock().expect("lock urls").push(url.to_string());
        Ok(self.page.clone())
    }
}

#[test]
fn test_workspace_definitions_match_builtin_set() {
    let loader = PlatformLoader::with_default_dir().expect("find platform-definitions/");
    let registry = PlatformRegistry::load_from(&loader).expect("load definitions");

    let builtin = builtin_definitions().expect("parse built-in definitions");
    assert_eq!(registry.count(), builtin.len());

    for definition in builtin {
        let loaded = registry.get(definition.id()).expect("definition on disk");
        assert_eq!(loaded, definition);
    }
}

#[test]
fn test_builtin_intervals_are_declared_for_strict_platforms() {
    let registry = PlatformRegistry::with_builtin().expect("load built-in platforms");
    let slow: Vec<String> = registry
        .min_intervals()
        .into_iter()
        .map(|(id, _)| id.to_string())
        .collect();

    assert!(slow.contains(&"twitter".to_string()));
    assert!(slow.contains(&"instagram".to_string()));
}

#[tokio::test]
async fn test_probes_follow_registry_order_and_templates() {
    let registry = PlatformRegistry::with_builtin().expect("load built-in platforms");
    let fetcher = Arc::new(RecordingFetcher {
        urls: Mutex::new(Vec::new()),
        page: FetchedPage {
            status: 200,
            body: "1,024 followers and 300 videos, 12 contributions, karma 5, 7 tweets".to_string(),
            final_url: None,
        },
    });

    let probes = probes_for(&registry, fetcher.clone());
    let ids: Vec<&ServiceId> = probes.iter().map(|p| p.service_id()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);

    for probe in &probes {
        let record = probe.execute("octocat", QueryKind::Username).await;
        assert_eq!(record.presence(), Some(Presence::Found), "{}", probe.service_id());
    }

    let urls = fetcher.urls.lock().expect("lock urls").clone();
    assert!(urls.contains(&"https://github.com/octocat".to_string()));
    assert!(urls.contains(&"https://youtube.com/@octocat".to_string()));
    assert!(urls.contains(&"https://reddit.com/user/octocat".to_string()));
}
