//! Page fetching and DOM access for listing pages.
//!
//! A [`PageFetcher`] performs the single navigation of a run and hands back a
//! parsed [`ListingPage`]. Field lookups on the page go through [`Entry`],
//! whose accessors return `Option` so that one absent field only affects the
//! entry it belongs to.
//!
//! # Fetchers
//!
//! | Fetcher | Source |
//! |---------|--------|
//! | [`HttpFetcher`] | Live page over HTTP(S) |
//! | [`FileFetcher`] | Saved HTML snapshot on disk |
//!
//! The extraction itself lives in [`front_page`].

pub mod front_page;

use std::path::PathBuf;
use std::time::Duration;

use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::FetchError;

/// Capability to open a listing page.
///
/// The returned page is the whole "session": it is released when dropped.
pub trait PageFetcher {
    async fn navigate(&self, url: &Url) -> Result<ListingPage, FetchError>;
}

/// A parsed listing page together with the URL it was loaded from.
pub struct ListingPage {
    url: Url,
    document: Html,
}

impl ListingPage {
    pub fn parse(url: Url, html: &str) -> Self {
        Self {
            url,
            document: Html::parse_document(html),
        }
    }

    /// Base URL for resolving relative links.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Elements matching `selector`, in document order.
    pub fn entries<'a>(&'a self, selector: &'a Selector) -> impl Iterator<Item = Entry<'a>> + 'a {
        self.document
            .select(selector)
            .map(|element| Entry { element })
    }
}

/// One repeated list item on a listing page.
#[derive(Clone, Copy)]
pub struct Entry<'a> {
    element: ElementRef<'a>,
}

impl Entry<'_> {
    /// All text of the entry with whitespace runs collapsed.
    pub fn text(&self) -> String {
        self.element.text().flat_map(str::split_whitespace).join(" ")
    }

    /// Text of the first matching descendant, if any and non-empty.
    pub fn first_text(&self, selector: &Selector) -> Option<String> {
        self.nth_text(selector, 0)
    }

    /// Text of the `n`-th matching descendant (zero-based), on one line with
    /// whitespace runs collapsed to single spaces.
    pub fn nth_text(&self, selector: &Selector, n: usize) -> Option<String> {
        self.element
            .select(selector)
            .nth(n)
            .map(|el| el.text().flat_map(str::split_whitespace).join(" "))
            .filter(|text| !text.is_empty())
    }

    /// Attribute value of the first matching descendant.
    pub fn first_attr(&self, selector: &Selector, attr: &str) -> Option<String> {
        self.element
            .select(selector)
            .next()
            .and_then(|el| el.value().attr(attr))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

/// Parse a CSS selector, reporting the offending text on failure.
pub fn compile_selector(selector: &str) -> Result<Selector, FetchError> {
    Selector::parse(selector).map_err(|e| FetchError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Fetches listing pages over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn navigate(&self, url: &Url) -> Result<ListingPage, FetchError> {
        let http_err = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(http_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(http_err)?;
        info!(bytes = html.len(), "Fetched listing page");
        Ok(ListingPage::parse(url.clone(), &html))
    }
}

/// Loads a listing page from a saved HTML file.
///
/// The navigation URL is only used as the base for relative links.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    path: PathBuf,
}

impl FileFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PageFetcher for FileFetcher {
    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), %url))]
    async fn navigate(&self, url: &Url) -> Result<ListingPage, FetchError> {
        let html = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| FetchError::Io {
                path: self.path.clone(),
                source,
            })?;
        debug!(bytes = html.len(), "Loaded listing snapshot");
        Ok(ListingPage::parse(url.clone(), &html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"
        <ul>
          <li class="story"><a href="/one"> First </a><span>Ann</span><span>Mar 1</span></li>
          <li class="story"><a href="">Second</a><span>   </span></li>
        </ul>
    "#;

    fn page() -> ListingPage {
        ListingPage::parse(Url::parse("https://news.example.com/").unwrap(), HTML)
    }

    #[test]
    fn test_entries_in_document_order() {
        let page = page();
        let item = compile_selector("li.story").unwrap();
        let a = compile_selector("a").unwrap();
        let texts: Vec<_> = page.entries(&item).map(|e| e.first_text(&a)).collect();
        assert_eq!(texts, vec![Some("First".to_string()), Some("Second".to_string())]);
    }

    #[test]
    fn test_absent_or_blank_fields_are_none() {
        let page = page();
        let item = compile_selector("li.story").unwrap();
        let a = compile_selector("a").unwrap();
        let span = compile_selector("span").unwrap();

        let entries: Vec<_> = page.entries(&item).collect();
        assert_eq!(entries[0].nth_text(&span, 1).as_deref(), Some("Mar 1"));
        assert_eq!(entries[0].nth_text(&span, 2), None);
        assert_eq!(entries[1].first_text(&span), None);
        assert_eq!(entries[1].first_attr(&a, "href"), None);
        assert_eq!(entries[0].first_attr(&a, "href").as_deref(), Some("/one"));
    }

    #[test]
    fn test_wrapped_markup_reads_as_one_line() {
        let html = "<div class=\"story\"><a>Big\n          news <em>today</em>\t</a></div>";
        let page = ListingPage::parse(Url::parse("https://news.example.com/").unwrap(), html);
        let item = compile_selector("div.story").unwrap();
        let a = compile_selector("a").unwrap();

        let entry = page.entries(&item).next().unwrap();
        assert_eq!(entry.first_text(&a).as_deref(), Some("Big news today"));
    }

    #[test]
    fn test_invalid_selector() {
        let err = compile_selector("li[").unwrap_err();
        assert!(matches!(err, FetchError::Selector { .. }));
    }

    #[tokio::test]
    async fn test_file_fetcher_reads_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("front.html");
        std::fs::write(&path, HTML).unwrap();

        let url = Url::parse("https://news.example.com/").unwrap();
        let page = FileFetcher::new(&path).navigate(&url).await.unwrap();
        let item = compile_selector("li.story").unwrap();
        assert_eq!(page.entries(&item).count(), 2);
        assert_eq!(page.url(), &url);
    }

    #[tokio::test]
    async fn test_file_fetcher_missing_file() {
        let url = Url::parse("https://news.example.com/").unwrap();
        let err = FileFetcher::new("/no/such/snapshot.html")
            .navigate(&url)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, FetchError::Io { .. }));
    }
}
