use anyhow::Result;
use clap::Parser;
use gallery_common::GalleryError;
use gallery_common::observability::{LogConfig, LogFormat, init_logging};
use gallery_config::{GalleryConfig, GalleryConfigLoader};
use std::path::PathBuf;
use tracing::info;

mod input;
mod output;
mod pipeline;
mod settings;

use settings::AppSettings;

/// Build a static image gallery from a CSV list of links.
#[derive(Debug, Parser)]
#[command(name = "gallery", version, about)]
struct Cli {
    /// CSV file with a `Link` or `URL` column.
    #[arg(short, long, env = "GALLERY_INPUT")]
    input: PathBuf,

    /// Output directory (overrides `output.dir`).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file; a missing default file is not an error.
    #[arg(short, long, env = "GALLERY_CONFIG")]
    config: Option<PathBuf>,

    /// Show the browser window instead of running headless.
    #[arg(long)]
    headed: bool,

    #[arg(long, value_enum)]
    log_format: Option<CliLogFormat>,

    /// Debug-level logging and a stderr mirror.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliLogFormat {
    Text,
    Json,
}

const DEFAULT_CONFIG_FILE: &str = "gallery.yaml";
const PROVIDER_URL_ENV: &str = "CLOUDINARY_URL";

fn load_config(cli: &Cli) -> Result<GalleryConfig> {
    let loader = match &cli.config {
        Some(path) => GalleryConfigLoader::new().with_file(path),
        None => GalleryConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE),
    };
    let mut cfg = loader
        .load()
        .map_err(|e| GalleryError::Config(format!("failed to load configuration: {e}")))?;

    if cfg.hosting.url.is_none() {
        cfg.hosting.url = std::env::var(PROVIDER_URL_ENV).ok();
    }
    if let Some(dir) = &cli.output {
        cfg.output.dir = dir.clone();
    }
    if cli.headed {
        cfg.browser.headless = false;
    }
    if let Some(format) = cli.log_format {
        cfg.logging.format = match format {
            CliLogFormat::Text => LogFormat::Text,
            CliLogFormat::Json => LogFormat::Json,
        };
    }
    if cli.verbose {
        cfg.logging.filter = "debug".into();
        cfg.logging.emit_stderr = true;
    }

    cfg.validate()
        .map_err(|e| GalleryError::Config(format!("invalid configuration: {e}")))?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Config (file, then env, then flags)
    let cfg = load_config(&cli)?;

    // 2) Logging from the resolved config
    let log_path = init_logging(LogConfig {
        app_name: "gallery",
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.emit_stderr,
        format: cfg.logging.format,
        default_filter: cfg.logging.filter.clone(),
    })?;
    info!(target: "app", log = %log_path.display(), "gallery starting");

    let settings = AppSettings::from_config(&cfg)?;

    // 3) Input, pipeline, output
    let links = input::read_links(&cli.input)?;
    info!(target: "app", links = links.len(), input = %cli.input.display(), "links loaded");

    let items = pipeline::run(&links, &settings).await?;
    let written = output::write_all(&items, &settings.page)?;

    info!(
        target: "app",
        json = %written.json.display(),
        csv = %written.csv.display(),
        html = %written.html.display(),
        "done"
    );
    Ok(())
}
