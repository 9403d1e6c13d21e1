//! Drives a download run: index, select, then each chapter in turn.
//!
//! Chapters are processed one after another. Only the images inside a
//! chapter are fetched concurrently. A chapter that fails is reported and
//! the run moves on to the next one.

use crate::assembler::{AssembleOutcome, ChapterAssembler, sanitize_name};
use crate::console::Console;
use crate::download::{DEFAULT_WORKERS, ImageSource, fetch_all};
use crate::error::{ScraperError, SelectionError};
use crate::scrapers::{ChapterFetcher, ChapterIndexer, ChapterRef};
use crate::selection::{SelectionRange, select_range};
use std::path::PathBuf;
use std::sync::Arc;

/// How a single chapter ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ChapterOutcome {
    /// Artifact already present; no network activity happened.
    Skipped,
    /// Artifact written.
    Done { path: PathBuf, pages: usize },
    /// The chapter page listed no images.
    NoImages,
    /// Images were listed but none could be downloaded.
    NoImageData,
    /// Fetching the chapter page or writing the artifact failed.
    Failed(String),
}

impl ChapterOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ChapterOutcome::NoImages | ChapterOutcome::NoImageData | ChapterOutcome::Failed(_)
        )
    }
}

/// Per-chapter results of a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<(ChapterRef, ChapterOutcome)>,
}

impl RunSummary {
    pub fn done(&self) -> usize {
        self.count(|o| matches!(o, ChapterOutcome::Done { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ChapterOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(ChapterOutcome::is_failure)
    }

    fn count(&self, pred: impl Fn(&ChapterOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Wires the indexer, fetcher, image source and assembler together.
pub struct Pipeline {
    indexer: Arc<dyn ChapterIndexer>,
    fetcher: Arc<dyn ChapterFetcher>,
    images: Arc<dyn ImageSource>,
    assembler: ChapterAssembler,
    workers: usize,
    console: Console,
}

impl Pipeline {
    pub fn new(
        indexer: Arc<dyn ChapterIndexer>,
        fetcher: Arc<dyn ChapterFetcher>,
        images: Arc<dyn ImageSource>,
        assembler: ChapterAssembler,
    ) -> Self {
        Self {
            indexer,
            fetcher,
            images,
            assembler,
            workers: DEFAULT_WORKERS,
            console: Console::new(),
        }
    }

    /// Sets the number of concurrent image downloads per chapter.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    /// Runs the whole pipeline for `expr` against the series at `series_url`.
    ///
    /// Only a malformed selection is returned as an error, and it is detected
    /// before any chapter work starts.
    pub async fn run(&self, series_url: &str, expr: &str) -> Result<RunSummary, SelectionError> {
        let range = SelectionRange::parse(expr)?;

        self.console.step("Indexing series structure...");
        let chapters = self.index(series_url).await;
        self.console
            .info(&format!("Indexed {} chapters", self.console.count(chapters.len())));

        let selected = select_range(&chapters, range);
        self.console.info(&format!(
            "Queueing {} chapters ({})",
            self.console.count(selected.len()),
            range
        ));

        let mut summary = RunSummary::default();
        for chapter in selected {
            let outcome = self.process_chapter(&chapter).await;
            self.report(&chapter, &outcome);
            summary.outcomes.push((chapter, outcome));
        }

        Ok(summary)
    }

    /// Indexes the series, recovering from failures with an empty index.
    async fn index(&self, series_url: &str) -> Vec<ChapterRef> {
        match self.indexer.index(series_url).await {
            Ok(chapters) => chapters,
            Err(ScraperError::IndexingTimeout(secs)) => {
                self.console.warning(&format!(
                    "Timeout after {}s waiting for chapters. Proceeding anyway.",
                    secs
                ));
                Vec::new()
            }
            Err(e) => {
                self.console
                    .error(&format!("Failed to index {}: {}", series_url, e));
                Vec::new()
            }
        }
    }

    /// Takes one chapter from pending to a final outcome.
    pub async fn process_chapter(&self, chapter: &ChapterRef) -> ChapterOutcome {
        let name = sanitize_name(&chapter.title);

        if self.assembler.already_done(&name) {
            return ChapterOutcome::Skipped;
        }

        self.console
            .step(&format!("Downloading: {}", self.console.chapter(&chapter.title)));

        let urls = match self.fetcher.image_urls(&chapter.locator).await {
            Ok(urls) => urls,
            Err(e) => return ChapterOutcome::Failed(e.to_string()),
        };

        if urls.is_empty() {
            return ChapterOutcome::NoImages;
        }
        self.console
            .info(&format!("Found {} images.", self.console.count(urls.len())));

        let pages = fetch_all(self.images.as_ref(), &urls, self.workers).await;
        if pages.len() < urls.len() {
            self.console.warning(&format!(
                "{} of {} images could not be retrieved",
                urls.len() - pages.len(),
                urls.len()
            ));
        }

        match self.assembler.assemble(&name, &pages) {
            Ok(AssembleOutcome::Written { path, pages }) => ChapterOutcome::Done { path, pages },
            Ok(AssembleOutcome::Empty) => ChapterOutcome::NoImageData,
            Ok(AssembleOutcome::AlreadyPresent(_)) => ChapterOutcome::Skipped,
            Err(e) => ChapterOutcome::Failed(e.to_string()),
        }
    }

    fn report(&self, chapter: &ChapterRef, outcome: &ChapterOutcome) {
        let title = &chapter.title;
        match outcome {
            ChapterOutcome::Skipped => self.console.skip(&format!("{} (exists)", title)),
            ChapterOutcome::Done { path, pages } => self.console.success(&format!(
                "{} ({} pages) {}",
                title,
                pages,
                self.console.muted(&path.display().to_string())
            )),
            ChapterOutcome::NoImages => {
                self.console.error(&format!("No images found for {}", title))
            }
            ChapterOutcome::NoImageData => self
                .console
                .error(&format!("No image data retrieved for {}", title)),
            ChapterOutcome::Failed(e) => self.console.error(&format!("{}: {}", title, e)),
        }
    }
}
