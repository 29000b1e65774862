//! Page loading and DOM queries against the listings source.
//!
//! The acquisition engine drives one [`PageSession`] at a time: navigate, wait,
//! query elements by CSS selector, read text and attributes. Sessions are not
//! shared between tasks.

mod http;

pub use http::{HttpBrowser, HttpPage};

use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::BrowseError;

/// Opens page sessions.
#[async_trait]
pub trait Browser: Send + Sync {
    type Session: PageSession;

    async fn new_page(&self) -> Result<Self::Session, BrowseError>;
}

/// A single page that can be pointed at one URL after another.
#[async_trait]
pub trait PageSession: Send {
    /// Load `url`, failing if it takes longer than `timeout`.
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), BrowseError>;

    /// Let the page settle.
    async fn wait(&mut self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    /// All elements of the loaded page matching `selector`.
    fn query_all(&self, selector: &str) -> Vec<Element>;

    fn query(&self, selector: &str) -> Option<Element> {
        self.query_all(selector).into_iter().next()
    }
}

/// Detached snapshot of one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    html: String,
    text_nodes: Vec<String>,
    attrs: Vec<(String, String)>,
}

impl Element {
    fn snapshot(element: ElementRef<'_>) -> Self {
        Self {
            html: element.html(),
            text_nodes: element
                .text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            attrs: element
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Text content collapsed onto one line.
    pub fn text(&self) -> String {
        self.text_nodes
            .iter()
            .flat_map(|t| t.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Text content with one line per text node, for long-form content.
    pub fn inner_text(&self) -> String {
        self.text_nodes.join("\n")
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Descendants matching `selector`.
    pub fn select(&self, selector: &str) -> Vec<Element> {
        let fragment = Html::parse_fragment(&self.html);
        select_in(&fragment, selector)
    }

    pub fn select_first(&self, selector: &str) -> Option<Element> {
        self.select(selector).into_iter().next()
    }
}

/// Query a parsed document, returning owned snapshots.
pub fn select_in(document: &Html, selector: &str) -> Vec<Element> {
    match Selector::parse(selector) {
        Ok(sel) => document.select(&sel).map(Element::snapshot).collect(),
        Err(e) => {
            debug!(selector, error = ?e, "Invalid selector");
            Vec::new()
        }
    }
}

/// Query raw HTML.
pub fn select_html(html: &str, selector: &str) -> Vec<Element> {
    select_in(&Html::parse_document(html), selector)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD: &str = r#"
        <ul>
          <li class="job-search-card">
            <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/software-engineer-at-acme-3812345678?refId=abc">link</a>
            <h3 class="base-search-card__title">
                Software   Engineer
            </h3>
            <h4 class="base-search-card__subtitle"><a>Acme</a></h4>
            <span class="job-search-card__location">Remote</span>
            <time datetime="2024-03-01">2 days ago</time>
          </li>
        </ul>"#;

    #[test]
    fn test_nested_selection_and_text() {
        let cards = select_html(CARD, ".job-search-card");
        assert_eq!(cards.len(), 1);

        let card = &cards[0];
        assert_eq!(
            card.select_first(".base-search-card__title").unwrap().text(),
            "Software Engineer"
        );
        assert_eq!(card.select_first(".base-search-card__subtitle").unwrap().text(), "Acme");
        assert_eq!(
            card.select_first("time").unwrap().attr("datetime"),
            Some("2024-03-01")
        );
        assert!(card
            .select_first("a")
            .unwrap()
            .attr("href")
            .unwrap()
            .contains("3812345678"));
    }

    #[test]
    fn test_inner_text_keeps_lines() {
        let html = "<div class='d'><p>First line</p><ul><li>Rust</li><li>Tokio</li></ul></div>";
        let el = select_html(html, ".d").remove(0);
        assert_eq!(el.inner_text(), "First line\nRust\nTokio");
    }

    #[test]
    fn test_invalid_selector_matches_nothing() {
        assert!(select_html(CARD, "li[[").is_empty());
    }
}
