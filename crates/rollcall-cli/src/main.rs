use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rollcall_core::{FaceLocator, FacePipeline, GalleryEntry, MatchSettings};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall face attendance CLI")]
struct Cli {
    /// Path to the SeetaFace detector model (overrides ROLLCALL_MODEL_PATH).
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a face descriptor from an image
    Enroll {
        /// Image file (raw bytes, or a base64 data-URL payload)
        image: PathBuf,
    },
    /// Match a face image against a gallery of enrolled descriptors
    Verify {
        /// Image file (raw bytes, or a base64 data-URL payload)
        image: PathBuf,
        /// JSON file with [{"id", "name", "stage"?, "embedding"}] records
        #[arg(short, long)]
        gallery: PathBuf,
    },
    /// Compare two descriptor JSON files directly
    Compare {
        /// JSON file with a descriptor array
        first: PathBuf,
        /// JSON file with a descriptor array
        second: PathBuf,
    },
    /// Count faces in an image without extracting a descriptor
    Detect {
        /// Image file (raw bytes, or a base64 data-URL payload)
        image: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Enroll { image } => {
            let pipeline = build_pipeline(cli.model.as_deref(), &config)?;
            let payload = read_image_payload(&image)?;
            print_json(&pipeline.enroll(&payload))
        }
        Commands::Verify { image, gallery } => {
            let pipeline = build_pipeline(cli.model.as_deref(), &config)?;
            let payload = read_image_payload(&image)?;
            let entries: Vec<GalleryEntry> = serde_json::from_slice(
                &fs::read(&gallery)
                    .with_context(|| format!("reading gallery file {}", gallery.display()))?,
            )
            .context("parsing gallery JSON")?;
            print_json(&pipeline.verify(&payload, &entries))
        }
        Commands::Compare { first, second } => {
            let a = read_descriptor(&first)?;
            let b = read_descriptor(&second)?;
            print_json(&rollcall_core::matcher::compare(
                &a,
                &b,
                config.pair_threshold,
            ))
        }
        Commands::Detect { image } => {
            let pipeline = build_pipeline(cli.model.as_deref(), &config)?;
            let payload = read_image_payload(&image)?;
            print_json(&pipeline.detect_only(&payload))
        }
    }
}

fn build_pipeline(model_override: Option<&Path>, config: &Config) -> Result<FacePipeline> {
    let path = model_override.unwrap_or(&config.model_path);
    let locator = FaceLocator::from_model_file(&path.to_string_lossy())?;
    Ok(FacePipeline::with_settings(
        locator,
        MatchSettings {
            gallery_threshold: config.gallery_threshold,
            pair_threshold: config.pair_threshold,
        },
    ))
}

/// Read an image file. Files holding a `data:` URL (as captured from a
/// browser) are base64-decoded; anything else is passed through as raw
/// encoded image bytes.
fn read_image_payload(path: &Path) -> Result<Vec<u8>> {
    let bytes =
        fs::read(path).with_context(|| format!("reading image file {}", path.display()))?;
    if bytes.starts_with(b"data:") {
        let text = std::str::from_utf8(&bytes).context("data-URL payload is not valid UTF-8")?;
        return Ok(rollcall_core::decode::decode_payload(text.trim_end())?);
    }
    Ok(bytes)
}

fn read_descriptor(path: &Path) -> Result<Vec<f32>> {
    let bytes =
        fs::read(path).with_context(|| format!("reading descriptor file {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing descriptor JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
