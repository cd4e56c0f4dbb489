//! Text Highlighter - find text in uploaded images with OCR and outline every match.

mod annotate;
mod config;
mod error;
mod matcher;
mod ocr;
mod pipeline;
mod scan;
mod server;
mod storage;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::ServerConfig;
use matcher::SearchQuery;
use ocr::ocrs_engine::OcrsDetector;
use pipeline::Highlighter;
use server::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "text-highlighter", version, about = "Find text in images and highlight it")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP upload/download server (default)
    Serve {
        /// Listen address, overrides HIGHLIGHTER_BIND
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Search the images in a directory and stop at the first match
    Scan {
        /// Directory to search
        #[arg(long, default_value = "tmp")]
        dir: PathBuf,
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "Output")]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "text_highlighter=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::from_env()?;

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            config.ensure_dirs()?;

            let highlighter = load_highlighter(&config)?;
            info!("Text detector initialized: {}", highlighter.detector_name());

            server::serve(AppState::new(highlighter, config)).await
        }
        Command::Scan {
            dir,
            query,
            output_dir,
        } => {
            let query = SearchQuery::new(&query).context("No search text provided")?;
            let images = scan::find_images(&dir)?;
            if images.is_empty() {
                anyhow::bail!("No images found in {:?}", dir);
            }
            println!("Found {} image(s) in {:?}", images.len(), dir);
            println!("Searching for: '{}'\n", query);

            let highlighter = load_highlighter(&config)?;
            let outcome = tokio::task::spawn_blocking(move || {
                scan::scan_images(&highlighter, &images, &query, &output_dir)
            })
            .await?;

            match outcome.matched {
                Some((source, output)) => {
                    println!(
                        "Text found in {:?} ({} of {} scanned), highlighted image saved to {:?}",
                        source, outcome.scanned, outcome.total, output
                    );
                }
                None => println!("Text not found in any of {} image(s).", outcome.total),
            }
            Ok(())
        }
    }
}

/// Load the OCR models once; the detector is shared for the process lifetime.
fn load_highlighter(config: &ServerConfig) -> anyhow::Result<Highlighter> {
    let detector = OcrsDetector::from_model_files(&config.detection_model, &config.recognition_model)?;
    Ok(Highlighter::new(Arc::new(detector)))
}
