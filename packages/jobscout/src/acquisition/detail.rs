//! Posting detail pages.

use crate::browser::PageSession;
use crate::error::BrowseError;

use super::source::ListingSource;

/// Header fields and description read from one posting page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingDetails {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
}

async fn load<P: PageSession>(page: &mut P, url: &str, source: &ListingSource) -> Result<(), BrowseError> {
    page.goto(url, source.pacing.detail_timeout).await?;
    page.wait(source.pacing.detail_settle).await;
    Ok(())
}

fn description_on<P: PageSession>(page: &P, source: &ListingSource) -> String {
    source
        .detail
        .description
        .iter()
        .find_map(|selector| page.query(selector))
        .map(|el| el.inner_text().trim().to_string())
        .unwrap_or_default()
}

/// Description text from the first matching region, empty if none match.
pub async fn fetch_description<P: PageSession>(
    page: &mut P,
    url: &str,
    source: &ListingSource,
) -> Result<String, BrowseError> {
    load(page, url, source).await?;
    Ok(description_on(page, source))
}

/// Title, organization, location and description for a manual retry.
pub async fn fetch_posting<P: PageSession>(
    page: &mut P,
    url: &str,
    source: &ListingSource,
) -> Result<PostingDetails, BrowseError> {
    load(page, url, source).await?;
    let text = |selector: &str| page.query(selector).map(|el| el.text()).unwrap_or_default();

    Ok(PostingDetails {
        title: text(&source.detail.title),
        company: text(&source.detail.company),
        location: text(&source.detail.location),
        description: description_on(page, source),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::Pacing;
    use crate::testing::ScriptedBrowser;
    use crate::browser::Browser;

    const POSTING: &str = r#"
        <h1 class="top-card-layout__title">Backend Engineer</h1>
        <a class="topcard__org-name-link">  Acme Corp </a>
        <span class="topcard__flavor--bullet">Remote</span>
        <div id="job-details"><p>Build APIs.</p><p>Rust a plus.</p></div>"#;

    fn source() -> ListingSource {
        ListingSource::default().with_pacing(Pacing::immediate())
    }

    #[tokio::test]
    async fn test_description_uses_first_matching_selector() {
        let browser = ScriptedBrowser::new().with_page("https://x.test/jobs/view/1234567", POSTING);
        let mut page = browser.new_page().await.unwrap();

        let description = fetch_description(&mut page, "https://x.test/jobs/view/1234567", &source())
            .await
            .unwrap();
        assert_eq!(description, "Build APIs.\nRust a plus.");
    }

    #[tokio::test]
    async fn test_posting_header_fields() {
        let browser = ScriptedBrowser::new().with_page("https://x.test/jobs/view/1234567", POSTING);
        let mut page = browser.new_page().await.unwrap();

        let details = fetch_posting(&mut page, "https://x.test/jobs/view/1234567", &source())
            .await
            .unwrap();
        assert_eq!(details.title, "Backend Engineer");
        assert_eq!(details.company, "Acme Corp");
        assert_eq!(details.location, "Remote");
    }

    #[tokio::test]
    async fn test_page_without_description_yields_empty() {
        let browser = ScriptedBrowser::new().with_page("https://x.test/p", "<h1>Only a title</h1>");
        let mut page = browser.new_page().await.unwrap();
        let description = fetch_description(&mut page, "https://x.test/p", &source()).await.unwrap();
        assert!(description.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_page_is_an_error() {
        let browser = ScriptedBrowser::new();
        let mut page = browser.new_page().await.unwrap();
        assert!(fetch_description(&mut page, "https://x.test/missing", &source())
            .await
            .is_err());
    }
}
