//! Plain HTTP page loading with CSS selection via `scraper`.
//!
//! The public job search and posting pages are server-rendered for guests, so
//! no JavaScript engine is needed to read cards and descriptions.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::header::{self, HeaderMap, HeaderValue};
use scraper::Html;
use tracing::debug;

use super::{select_in, Browser, Element, PageSession};
use crate::error::BrowseError;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Opens [`HttpPage`]s that share one client and one rate limiter.
pub struct HttpBrowser {
    client: reqwest::Client,
    limiter: Arc<DirectRateLimiter>,
}

impl HttpBrowser {
    /// `requests_per_second` caps page loads across every page opened here.
    pub fn new(requests_per_second: NonZeroU32) -> Result<Self, BrowseError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| BrowseError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(requests_per_second))),
        })
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    type Session = HttpPage;

    async fn new_page(&self) -> Result<HttpPage, BrowseError> {
        Ok(HttpPage {
            client: self.client.clone(),
            limiter: Arc::clone(&self.limiter),
            html: String::new(),
        })
    }
}

/// The most recently loaded document, kept as text.
///
/// `scraper::Html` is not `Send`, so the document is parsed per query.
pub struct HttpPage {
    client: reqwest::Client,
    limiter: Arc<DirectRateLimiter>,
    html: String,
}

#[async_trait]
impl PageSession for HttpPage {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), BrowseError> {
        let parsed = url::Url::parse(url)?;
        self.limiter.until_ready().await;

        let load = async {
            let response = self
                .client
                .get(parsed)
                .send()
                .await
                .map_err(|source| BrowseError::Navigation {
                    url: url.to_string(),
                    source,
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(BrowseError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            response.text().await.map_err(|source| BrowseError::Navigation {
                url: url.to_string(),
                source,
            })
        };

        let html = tokio::time::timeout(timeout, load)
            .await
            .map_err(|_| BrowseError::Timeout {
                url: url.to_string(),
                timeout,
            })??;

        debug!(url, bytes = html.len(), "Page loaded");
        self.html = html;
        Ok(())
    }

    fn query_all(&self, selector: &str) -> Vec<Element> {
        select_in(&Html::parse_document(&self.html), selector)
    }
}
