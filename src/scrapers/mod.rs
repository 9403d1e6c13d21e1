//! Indexer and fetcher traits plus common types for reader-site scrapers.
//!
//! This module defines the interface a site implementation must provide:
//! listing a series' chapters and listing a chapter's page images.

mod madara;

pub use madara::MadaraScraper;

use crate::config::DownloadConfig;
use crate::error::ScraperError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

/// A chapter as found in the series index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRef {
    /// Unique address of the chapter page.
    pub locator: String,

    /// Display title shown in the index.
    pub title: String,
}

impl ChapterRef {
    pub fn new(locator: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            title: title.into(),
        }
    }
}

/// Produces the chapter index of a series.
#[async_trait]
pub trait ChapterIndexer: Send + Sync {
    /// Returns the deduplicated chapters listed on the series page.
    async fn index(&self, series_url: &str) -> Result<Vec<ChapterRef>, ScraperError>;
}

/// Lists the page images of a single chapter.
#[async_trait]
pub trait ChapterFetcher: Send + Sync {
    /// Returns the chapter's image URLs in reading order.
    async fn image_urls(&self, chapter_url: &str) -> Result<Vec<String>, ScraperError>;
}

/// Common HTTP client configuration for scrapers and image downloads.
pub fn create_http_client(config: &DownloadConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_sec))
        .build()
}

/// Builds chapter refs from raw `(href, text)` pairs.
///
/// Keeps the first occurrence of each locator and fills empty titles
/// from the locator itself.
pub fn collect_chapters<I>(links: I) -> Vec<ChapterRef>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut seen = HashSet::new();
    let mut chapters = Vec::new();

    for (locator, text) in links {
        let locator = locator.trim().to_string();
        if locator.is_empty() || !seen.insert(locator.clone()) {
            continue;
        }

        let text = text.trim();
        let title = if text.is_empty() {
            title_from_locator(&locator)
        } else {
            text.to_string()
        };

        chapters.push(ChapterRef { locator, title });
    }

    chapters
}

/// Derives a title from the last path segment of a locator.
///
/// `https://site/manga/x/chapter-12/` becomes `Chapter 12`.
pub fn title_from_locator(locator: &str) -> String {
    let segment = locator
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    segment
        .split('-')
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Resolves a possibly relative URL against the page it was found on.
pub fn resolve_url(base: &str, relative: &str) -> String {
    if relative.starts_with("http://") || relative.starts_with("https://") {
        return relative.to_string();
    }

    if let Ok(base_url) = url::Url::parse(base)
        && let Ok(resolved) = base_url.join(relative)
    {
        return resolved.to_string();
    }

    relative.to_string()
}
