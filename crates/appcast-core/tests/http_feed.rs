use std::sync::Arc;

use appcast_core::{
    AppIdentity, CheckContext, CheckError, CheckOutcome, Cycle, DecisionState, DecisionStore,
    FeedFetcher, FetchError, HttpFeedFetcher, MemoryDecisionStore, PointerWidth, UpdateEngine,
    Version,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<item>
    <version>1.1.0.0</version>
    <title>Widget 1.1</title>
    <url>files/widget-setup.exe</url>
    <changelog>https://example.com/widget/changes</changelog>
</item>"#;

fn fetcher() -> HttpFeedFetcher {
    HttpFeedFetcher::new(reqwest::Client::new())
}

fn v(s: &str) -> Version {
    s.parse().expect("test version should parse")
}

fn engine_for(feed_url: String) -> (UpdateEngine, Arc<MemoryDecisionStore>) {
    let store = Arc::new(MemoryDecisionStore::new());
    let identity = AppIdentity::new(Some("Acme"), "Widget");
    let context =
        CheckContext::new(feed_url, v("1.0.0"), identity).with_pointer_width(PointerWidth::Bits32);
    let (engine, _outcomes) = UpdateEngine::new(context, Arc::new(fetcher()), store.clone());
    (engine, store)
}

#[tokio::test]
async fn fetch_bypasses_caches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .expect(1)
        .mount(&server)
        .await;

    let fetched = fetcher()
        .fetch(&format!("{}/feed.xml", server.uri()))
        .await
        .expect("feed should be fetched");

    assert_eq!(fetched.body, FEED.as_bytes());
    assert_eq!(fetched.origin.path(), "/feed.xml");

    let requests = server
        .received_requests()
        .await
        .expect("request recording should be enabled");
    let cache_control = requests[0]
        .headers
        .get("cache-control")
        .and_then(|value| value.to_str().ok())
        .expect("cache-control header should be sent");
    assert!(cache_control.contains("no-cache"));
    assert!(cache_control.contains("no-store"));
    assert_eq!(
        requests[0]
            .headers
            .get("pragma")
            .and_then(|value| value.to_str().ok()),
        Some("no-cache")
    );
}

#[tokio::test]
async fn non_success_status_is_a_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let error = fetcher()
        .fetch(&format!("{}/feed.xml", server.uri()))
        .await
        .expect_err("503 should fail");

    match error {
        FetchError::HttpStatus {
            status,
            body_snippet,
        } => {
            assert_eq!(status.as_u16(), 503);
            assert_eq!(body_snippet, ": maintenance");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unreachable_host_is_a_fetch_error() {
    let server = MockServer::start().await;
    let url = format!("{}/feed.xml", server.uri());
    drop(server);

    let error = fetcher().fetch(&url).await.expect_err("closed port should fail");

    assert!(matches!(error, FetchError::Request(_)));
}

#[tokio::test]
async fn invalid_url_is_a_fetch_error() {
    let error = fetcher()
        .fetch("not a url")
        .await
        .expect_err("garbage URL should fail");

    assert!(matches!(error, FetchError::InvalidUrl { .. }));
}

#[tokio::test]
async fn relative_links_resolve_against_redirect_target() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latest.xml"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/releases/feed.xml", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/releases/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .mount(&server)
        .await;

    let (engine, _store) = engine_for(format!("{}/latest.xml", server.uri()));
    let Cycle::Finished(CheckOutcome::Checked(result)) = engine.check_once().await else {
        panic!("check should complete");
    };

    assert!(result.update_available);
    assert_eq!(result.latest_version, Some(v("1.1")));
    assert_eq!(
        result.download_url,
        Some(format!("{}/releases/files/widget-setup.exe", server.uri()))
    );
    assert_eq!(
        result.changelog_url.as_deref(),
        Some("https://example.com/widget/changes")
    );
}

#[tokio::test]
async fn server_error_fails_check_without_touching_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let (engine, store) = engine_for(format!("{}/feed.xml", server.uri()));
    let namespace = engine.namespace().clone();

    let cycle = engine.check_once().await;

    assert!(matches!(
        cycle,
        Cycle::Finished(CheckOutcome::Failed(CheckError::Fetch(
            FetchError::HttpStatus { .. }
        )))
    ));
    assert_eq!(
        store.read_state(&namespace).expect("read state"),
        DecisionState::default()
    );
}
