//! Mangapdf CLI - download a range of manga chapters as PDFs.

use anyhow::Context;
use clap::{CommandFactory, Parser};
use mangapdf::config::Config;
use mangapdf::console::Console;
use mangapdf::error::Result;
use mangapdf::scrapers::{MadaraScraper, create_http_client};
use mangapdf::{ChapterAssembler, HttpImageRetriever, Pipeline};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SELECTION_HELP: &str = "Examples:
  mangapdf 34      download chapter 34
  mangapdf 34:60   download chapters 34 to 60
  mangapdf 34::    download chapter 34 and everything after it";

/// Download manga chapters as one PDF per chapter.
#[derive(Parser, Debug)]
#[command(name = "mangapdf")]
#[command(author, version, about, long_about = None, after_help = SELECTION_HELP)]
struct Args {
    /// Chapters to download: N, N:M or N::
    selection: Option<String>,

    /// Series page to index instead of the configured one.
    #[arg(long)]
    series_url: Option<String>,

    /// Directory receiving the PDFs.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Concurrent image downloads per chapter.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    workers: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let console = Console::new();

    let Some(selection) = args.selection.as_deref() else {
        let _ = Args::command().print_help();
        return Ok(());
    };

    console.section("Mangapdf - Chapter Downloader");

    console.step("Loading configuration...");
    let config = match Config::config_path()
        .map_err(anyhow::Error::from)
        .and_then(|path| load_config(&args, &path))
    {
        Ok(config) => config,
        Err(e) => {
            console.error(&format!("{:#}", e));
            return Ok(());
        }
    };
    console.success("Configuration loaded");

    let pipeline = match build_pipeline(&config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            console.error(&format!("{:#}", e));
            return Ok(());
        }
    };

    match pipeline.run(&config.series.url, selection).await {
        Ok(summary) => {
            console.section("Done!");
            console.info(&format!(
                "{} downloaded, {} skipped, {} failed",
                console.count(summary.done()),
                console.count(summary.skipped()),
                console.count(summary.failed())
            ));
        }
        Err(e) => {
            console.error(&format!(
                "Input Error: Ensure you used numbers correctly. {}",
                e
            ));
        }
    }

    Ok(())
}

/// Loads the config file at `path` and applies command-line overrides.
fn load_config(args: &Args, path: &Path) -> Result<Config> {
    let mut config = Config::load_from(path).context("Failed to load configuration")?;
    if let Some(url) = &args.series_url {
        config.series.url = url.clone();
    }
    if let Some(dir) = &args.output {
        config.paths.output_directory = dir.clone();
    }
    if let Some(workers) = args.workers {
        config.download.workers = workers as usize;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let client = create_http_client(&config.download).context("Failed to create HTTP client")?;
    let scraper = Arc::new(MadaraScraper::new(client.clone(), config.scraping.clone()));

    Ok(Pipeline::new(
        scraper.clone(),
        scraper,
        Arc::new(HttpImageRetriever::new(client)),
        ChapterAssembler::on_disk(&config.paths.output_directory),
    )
    .with_workers(config.download.workers))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["mangapdf", "34"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_malformed_config_is_an_error_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[download]\nworkers = \"x\"\n").unwrap();

        let err = load_config(&args(&[]), &path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to load configuration"));
    }

    #[test]
    fn test_invalid_config_is_an_error_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[download]\ntimeout_sec = 0\n").unwrap();

        let err = load_config(&args(&[]), &path).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid configuration"));
    }

    #[test]
    fn test_overrides_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = load_config(
            &args(&["--workers", "3", "--output", "out", "--series-url", "https://s/m/x/"]),
            &path,
        )
        .unwrap();

        assert_eq!(config.download.workers, 3);
        assert_eq!(config.paths.output_directory, PathBuf::from("out"));
        assert_eq!(config.series.url, "https://s/m/x/");
        assert!(build_pipeline(&config).is_ok());
    }
}
