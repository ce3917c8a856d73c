use async_trait::async_trait;
use log::debug;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use thiserror::Error;
use url::Url;

const NO_CACHE: &str = "no-cache, no-store, max-age=0";

/// Raw feed bytes plus the URL they were finally served from.
///
/// `origin` is the post-redirect URL; relative links in the document are
/// resolved against it.
#[derive(Debug, Clone)]
pub struct FetchedFeed {
    pub body: Vec<u8>,
    pub origin: Url,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid feed URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to fetch update feed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("update feed request failed with HTTP {status}{body_snippet}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body_snippet: String,
    },
    #[error("failed to read update feed body: {0}")]
    Body(#[source] reqwest::Error),
}

#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Retrieve the feed at `url`, live, in a single attempt.
    async fn fetch(&self, url: &str) -> Result<FetchedFeed, FetchError>;
}

/// Fetches feeds over HTTP(S), asking every cache on the way to step aside.
#[derive(Debug, Clone)]
pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed, FetchError> {
        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        debug!("Fetching update feed from {parsed}");
        let response = self
            .client
            .get(parsed)
            .header(CACHE_CONTROL, NO_CACHE)
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(FetchError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body_snippet = response
                .text()
                .await
                .ok()
                .map(|body| response_snippet(&body, 160))
                .unwrap_or_default();
            return Err(FetchError::HttpStatus {
                status,
                body_snippet,
            });
        }

        let origin = response.url().clone();
        let body = response.bytes().await.map_err(FetchError::Body)?;
        debug!("Fetched {} bytes of update feed from {origin}", body.len());

        Ok(FetchedFeed {
            body: body.to_vec(),
            origin,
        })
    }
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.trim().chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}
