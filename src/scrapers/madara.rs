//! Scraper for reader sites built on the WordPress "Madara" manga theme
//! (mangaread.org and friends).
//!
//! Chapter pages lazy-load their images, so the real address usually sits in
//! `data-src` or `data-lazy-src` and `src` holds a placeholder.

use super::{ChapterFetcher, ChapterIndexer, ChapterRef, collect_chapters, resolve_url};
use crate::config::ScrapingConfig;
use crate::error::ScraperError;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;

/// Attributes checked for an image address, most specific first.
const IMAGE_ATTRIBUTES: [&str; 3] = ["data-src", "data-lazy-src", "src"];

/// CSS selectors used for parsing.
struct Selectors {
    /// Chapter link in the series index.
    chapter: Selector,
    /// Primary page image selector.
    image_primary: Selector,
    /// Fallback for chapters that don't tag their images.
    image_fallback: Selector,
}

impl Selectors {
    fn new() -> Self {
        Self {
            chapter: Selector::parse(".wp-manga-chapter a").unwrap(),
            image_primary: Selector::parse("img.wp-manga-chapter-img").unwrap(),
            image_fallback: Selector::parse(".reading-content img").unwrap(),
        }
    }
}

/// Madara theme scraper.
pub struct MadaraScraper {
    client: reqwest::Client,
    config: ScrapingConfig,
    selectors: Selectors,
}

impl MadaraScraper {
    /// Creates a scraper sharing the given HTTP client.
    pub fn new(client: reqwest::Client, config: ScrapingConfig) -> Self {
        Self {
            client,
            config,
            selectors: Selectors::new(),
        }
    }

    /// Fetches a page and returns its body.
    async fn fetch_page(&self, url: &str) -> Result<String, ScraperError> {
        let response = self.client.get(url).send().await?;
        check_status(&response, url)?;
        Ok(response.text().await?)
    }

    /// Newer Madara versions render an empty list and fill it from this endpoint.
    async fn fetch_ajax_chapters(&self, series_url: &str) -> Result<String, ScraperError> {
        let url = format!("{}/ajax/chapters/", series_url.trim_end_matches('/'));
        let response = self.client.post(&url).send().await?;
        check_status(&response, &url)?;
        Ok(response.text().await?)
    }

    async fn index_inner(&self, series_url: &str) -> Result<Vec<ChapterRef>, ScraperError> {
        let html = self.fetch_page(series_url).await?;
        let chapters = self.parse_index(&html, series_url);
        if !chapters.is_empty() {
            return Ok(chapters);
        }

        if self.config.debug {
            println!("[Madara Debug] Index empty on {}, trying ajax list", series_url);
        }

        let html = self.fetch_ajax_chapters(series_url).await?;
        Ok(self.parse_index(&html, series_url))
    }

    /// Extracts chapter links from an index page.
    fn parse_index(&self, html: &str, base_url: &str) -> Vec<ChapterRef> {
        let doc = Html::parse_document(html);
        let links = doc.select(&self.selectors.chapter).filter_map(|elem| {
            let href = elem.value().attr("href")?;
            let text = elem.text().collect::<String>();
            Some((resolve_url(base_url, href.trim()), text))
        });
        collect_chapters(links)
    }

    /// Extracts page image URLs from a chapter page.
    fn parse_images(&self, html: &str, page_url: &str) -> Vec<String> {
        let doc = Html::parse_document(html);

        let mut urls = image_sources(doc.select(&self.selectors.image_primary), page_url);
        if urls.is_empty() {
            urls = image_sources(doc.select(&self.selectors.image_fallback), page_url);
        }

        urls
    }
}

fn image_sources<'a>(elems: impl Iterator<Item = ElementRef<'a>>, page_url: &str) -> Vec<String> {
    elems
        .filter_map(|elem| {
            IMAGE_ATTRIBUTES
                .iter()
                .filter_map(|attr| elem.value().attr(attr))
                .map(str::trim)
                .find(|value| !value.is_empty() && !value.starts_with("data:"))
        })
        .map(|src| resolve_url(page_url, src))
        .collect()
}

fn check_status(response: &reqwest::Response, url: &str) -> Result<(), ScraperError> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(ScraperError::Status {
        status: response.status().as_u16(),
        url: url.to_string(),
    })
}

#[async_trait]
impl ChapterIndexer for MadaraScraper {
    async fn index(&self, series_url: &str) -> Result<Vec<ChapterRef>, ScraperError> {
        let wait = self.config.index_timeout_sec;
        tokio::time::timeout(Duration::from_secs(wait), self.index_inner(series_url))
            .await
            .map_err(|_| ScraperError::IndexingTimeout(wait))?
    }
}

#[async_trait]
impl ChapterFetcher for MadaraScraper {
    async fn image_urls(&self, chapter_url: &str) -> Result<Vec<String>, ScraperError> {
        let html = self.fetch_page(chapter_url).await?;
        Ok(self.parse_images(&html, chapter_url))
    }
}
