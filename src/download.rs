//! Page image retrieval.
//!
//! Images are fetched through an [`ImageSource`] and fanned out over a
//! bounded pool by [`fetch_all`]. A failed image is dropped, never retried,
//! and never stops its siblings.

use crate::console::Console;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Worker pool width used when none is configured.
pub const DEFAULT_WORKERS: usize = 10;

/// A normalized page ready for assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    /// Position of the image in the chapter's URL list.
    pub index: usize,
    /// JPEG-encoded RGB pixels.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// An image decoded and re-encoded as baseline RGB JPEG.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decodes any supported format and re-encodes it as RGB JPEG.
///
/// Alpha channels and palettes are flattened so every page embeds the same way.
pub fn normalize_image(bytes: &[u8]) -> Result<NormalizedImage, image::ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut data = Vec::new();
    DynamicImage::ImageRgb8(rgb).write_to(&mut Cursor::new(&mut data), ImageFormat::Jpeg)?;

    Ok(NormalizedImage {
        data,
        width,
        height,
    })
}

/// Source of page images.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Downloads and normalizes one image, or `None` on any failure.
    async fn fetch(&self, url: &str) -> Option<NormalizedImage>;
}

/// Downloads images over HTTP with a shared client.
pub struct HttpImageRetriever {
    client: reqwest::Client,
    console: Console,
}

impl HttpImageRetriever {
    /// Creates a retriever around a client that already carries the
    /// User-Agent and per-request timeout.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            console: Console::new(),
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<NormalizedImage, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(|e| e.to_string())?;

        tokio::task::spawn_blocking(move || normalize_image(&bytes))
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl ImageSource for HttpImageRetriever {
    async fn fetch(&self, url: &str) -> Option<NormalizedImage> {
        match self.try_fetch(url).await {
            Ok(image) => Some(image),
            Err(e) => {
                self.console
                    .warning(&format!("Error downloading {}: {}", url, e));
                None
            }
        }
    }
}

/// Fetches every URL with at most `workers` in flight.
///
/// Waits for all fetches. The result keeps the input order of the successful
/// images; failures leave no placeholder, so it may be shorter than `urls`.
pub async fn fetch_all<S>(source: &S, urls: &[String], workers: usize) -> Vec<PageImage>
where
    S: ImageSource + ?Sized,
{
    let mut slots: Vec<Option<NormalizedImage>> = vec![None; urls.len()];

    let results: Vec<(usize, Option<NormalizedImage>)> = stream::iter(urls.iter().enumerate())
        .map(|(index, url)| async move { (index, source.fetch(url).await) })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    for (index, image) in results {
        slots[index] = image;
    }

    slots
        .into_iter()
        .enumerate()
        .filter_map(|(index, image)| {
            image.map(|img| PageImage {
                index,
                data: img.data,
                width: img.width,
                height: img.height,
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::DownloadConfig;
    use crate::scrapers::create_http_client;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use wiremock::matchers::{header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// In-memory source: URLs containing "fail" return `None`.
    pub(crate) struct FakeSource {
        pub(crate) delay_ms: u64,
        pub(crate) requested: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        pub(crate) max_in_flight: AtomicUsize,
    }

    impl FakeSource {
        pub(crate) fn new(delay_ms: u64) -> Self {
            Self {
                delay_ms,
                requested: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ImageSource for FakeSource {
        async fn fetch(&self, url: &str) -> Option<NormalizedImage> {
            self.requested.lock().unwrap().push(url.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            // Later URLs finish first to shake the completion order.
            let weight = 20u64.saturating_sub(url.len() as u64 % 20);
            tokio::time::sleep(Duration::from_millis(self.delay_ms * weight)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if url.contains("fail") {
                return None;
            }
            Some(NormalizedImage {
                data: url.as_bytes().to_vec(),
                width: 10,
                height: 20,
            })
        }
    }

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 10, 10, 128]));
        let mut data = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
            .unwrap();
        data
    }

    #[test]
    fn test_normalize_png_to_jpeg() {
        let normalized = normalize_image(&png_bytes(4, 3)).unwrap();
        assert_eq!((normalized.width, normalized.height), (4, 3));
        assert_eq!(&normalized.data[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(normalize_image(b"<html>not an image</html>").is_err());
    }

    #[tokio::test]
    async fn test_fetch_all_drops_failures_and_keeps_order() {
        let source = FakeSource::new(1);
        let urls = vec![
            "https://cdn/u1".to_string(),
            "https://cdn/u2-fail".to_string(),
            "https://cdn/u3".to_string(),
        ];

        let pages = fetch_all(&source, &urls, 10).await;

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].data, b"https://cdn/u1".to_vec());
        assert_eq!(pages[0].index, 0);
        assert_eq!(pages[1].data, b"https://cdn/u3".to_vec());
        assert_eq!(pages[1].index, 2);
    }

    #[tokio::test]
    async fn test_fetch_all_bounded_and_complete() {
        let source = FakeSource::new(1);
        let urls: Vec<String> = (0..25).map(|i| format!("https://cdn/{:0>width$}", i, width = i % 7 + 1)).collect();

        let pages = fetch_all(&source, &urls, 4).await;

        assert_eq!(pages.len(), 25);
        let indexes: Vec<usize> = pages.iter().map(|p| p.index).collect();
        assert_eq!(indexes, (0..25).collect::<Vec<_>>());
        let max_in_flight = source.max_in_flight.load(Ordering::SeqCst);
        assert!(max_in_flight <= 4);
        assert!(max_in_flight > 1);

        let requested: HashSet<String> = source.requested.lock().unwrap().iter().cloned().collect();
        assert_eq!(requested.len(), 25);
    }

    #[tokio::test]
    async fn test_fetch_all_zero_workers_still_runs() {
        let source = FakeSource::new(0);
        let urls = vec!["https://cdn/a".to_string()];
        assert_eq!(fetch_all(&source, &urls, 0).await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_http_retriever() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(8, 6)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not an image".to_vec()))
            .mount(&server)
            .await;

        let retriever = HttpImageRetriever::new(reqwest::Client::new());

        let ok = retriever.fetch(&format!("{}/ok.png", server.uri())).await;
        assert_eq!(ok.map(|img| (img.width, img.height)), Some((8, 6)));

        assert!(retriever.fetch(&format!("{}/missing.png", server.uri())).await.is_none());
        assert!(retriever.fetch(&format!("{}/broken.png", server.uri())).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shared_client_identifies_itself_and_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page.png"))
            .and(header_regex("user-agent", r"^Mozilla/5\.0 .*Chrome/"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(5, 5)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/slow.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(png_bytes(5, 5))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let config = DownloadConfig {
            timeout_sec: 1,
            ..DownloadConfig::default()
        };
        let retriever = HttpImageRetriever::new(create_http_client(&config).unwrap());

        // Unmatched requests get a 404, so this only succeeds with the header.
        let page = retriever.fetch(&format!("{}/page.png", server.uri())).await;
        assert!(page.is_some());

        let started = Instant::now();
        let slow = retriever.fetch(&format!("{}/slow.png", server.uri())).await;
        assert!(slow.is_none());
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
