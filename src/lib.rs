//! Mangapdf - chapter-range manga downloader.
//!
//! This library provides functionality for:
//! - Indexing the chapters of a series on a Madara-themed reader site
//! - Selecting chapters by number (`34`, `34:60`, `34::`)
//! - Downloading a chapter's pages concurrently and saving them as one PDF

pub mod assembler;
pub mod config;
pub mod console;
pub mod download;
pub mod error;
pub mod pipeline;
pub mod scrapers;
pub mod selection;

// Re-export commonly used types
pub use assembler::{ArtifactStore, ChapterAssembler, FsStore};
pub use config::Config;
pub use console::Console;
pub use download::{HttpImageRetriever, ImageSource, PageImage};
pub use error::{AssemblyError, ConfigError, ScraperError, SelectionError};
pub use pipeline::{ChapterOutcome, Pipeline, RunSummary};
pub use scrapers::{ChapterFetcher, ChapterIndexer, ChapterRef, MadaraScraper};
pub use selection::SelectionRange;
