//! Front page extraction.
//!
//! One navigation per call. Each listing entry yields a headline, the link
//! target, and two byline spans (author, then date). An entry missing any of
//! them is skipped and reported; the remaining entries are still extracted.

use scraper::Selector;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{Entry, ListingPage, PageFetcher, compile_selector};
use crate::config::Selectors;
use crate::error::{ExtractionFieldMissing, FetchError};
use crate::models::ArticleRecord;
use crate::utils::truncate_for_log;

/// Selectors parsed once per run.
#[derive(Debug)]
pub struct CompiledSelectors {
    item: Selector,
    headline: Selector,
    link: Selector,
    byline: Selector,
}

impl CompiledSelectors {
    pub fn compile(selectors: &Selectors) -> Result<Self, FetchError> {
        Ok(Self {
            item: compile_selector(&selectors.item)?,
            headline: compile_selector(&selectors.headline)?,
            link: compile_selector(&selectors.link)?,
            byline: compile_selector(&selectors.byline)?,
        })
    }
}

/// Outcome of one extraction: the batch plus the entries that were dropped.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Extracted articles in document order.
    pub articles: Vec<ArticleRecord>,
    pub skipped: Vec<ExtractionFieldMissing>,
}

/// Navigate to `url` and extract every listing entry.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn extract<F: PageFetcher>(
    fetcher: &F,
    url: &Url,
    selectors: &Selectors,
) -> Result<Extraction, FetchError> {
    let compiled = CompiledSelectors::compile(selectors)?;
    let page = fetcher.navigate(url).await?;
    Ok(extract_from_page(&page, &compiled))
}

/// Extract all entries of an already loaded page.
pub fn extract_from_page(page: &ListingPage, selectors: &CompiledSelectors) -> Extraction {
    let mut extraction = Extraction::default();

    for (index, entry) in page.entries(&selectors.item).enumerate() {
        match read_entry(index, &entry, page.url(), selectors) {
            Ok(article) => {
                debug!(index, url = %article.url, "Extracted entry");
                extraction.articles.push(article);
            }
            Err(missing) => {
                warn!(
                    index,
                    field = missing.field,
                    entry_text = %truncate_for_log(&entry.text(), 120),
                    "Entry is missing a required field; skipping"
                );
                extraction.skipped.push(missing);
            }
        }
    }

    info!(
        extracted = extraction.articles.len(),
        skipped = extraction.skipped.len(),
        source = %page.url(),
        "Extracted front page entries"
    );
    extraction
}

fn read_entry(
    index: usize,
    entry: &Entry<'_>,
    base: &Url,
    selectors: &CompiledSelectors,
) -> Result<ArticleRecord, ExtractionFieldMissing> {
    let missing = |field| ExtractionFieldMissing { index, field };

    let headline = entry
        .first_text(&selectors.headline)
        .ok_or_else(|| missing("headline"))?;
    let url = entry
        .first_attr(&selectors.link, "href")
        .and_then(|href| base.join(&href).ok())
        .filter(|resolved| matches!(resolved.scheme(), "http" | "https"))
        .ok_or_else(|| missing("link"))?;
    let author = entry
        .nth_text(&selectors.byline, 0)
        .ok_or_else(|| missing("author"))?;
    let raw_date = entry
        .nth_text(&selectors.byline, 1)
        .ok_or_else(|| missing("date"))?;

    Ok(ArticleRecord::new(url, headline, author, raw_date))
}
