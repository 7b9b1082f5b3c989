mod config;
mod engine;
mod kiosk;
mod panel;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use facegate_core::{FaceAnalyzer, Gallery, Identity, Tolerance};
use facegate_remote::StatusClient;
use kiosk::{InputMode, RunOptions};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "facegate", version, about = "Face recognition kiosk with a remote hardware gate")]
struct Cli {
    /// TOML configuration file (defaults to $FACEGATE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for the hardware, then recognize faces from pictures or the webcam
    Run {
        #[arg(long, value_enum, default_value_t = InputMode::Picture)]
        input: InputMode,
        /// Match tolerance in [0, 1]; lower is stricter
        #[arg(short, long)]
        tolerance: Option<Tolerance>,
        /// Start without polling the hardware-status endpoint
        #[arg(long)]
        skip_hardware_check: bool,
        /// Give up waiting for the hardware after this many seconds
        #[arg(long, value_name = "SECS")]
        ready_timeout: Option<u64>,
        /// Rebuild the dataset before recognizing
        #[arg(long)]
        rebuild: bool,
        /// Pictures to recognize (picture input only)
        pictures: Vec<PathBuf>,
    },
    /// Re-encode the dataset directory into the gallery
    Rebuild,
    /// Inspect or edit the enrolled gallery
    Gallery {
        #[command(subcommand)]
        action: GalleryAction,
    },
    /// Query the hardware-status endpoint once
    Status,
    /// List V4L2 capture devices
    Devices,
}

#[derive(Subcommand)]
enum GalleryAction {
    /// List enrolled identities
    List,
    /// Show one enrolled identity
    Show { id: String },
    /// Copy a picture into the dataset and enroll it
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        id: String,
        image: PathBuf,
    },
    /// Remove an identity and its dataset picture
    Remove { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { input, tolerance, skip_hardware_check, ready_timeout, rebuild, pictures } => {
            let opts = RunOptions {
                input,
                tolerance: tolerance.unwrap_or(config.recognition.tolerance),
                skip_hardware_check,
                ready_timeout: ready_timeout.map(Duration::from_secs),
                rebuild,
                pictures,
            };
            kiosk::run(&config, opts).await?;
        }
        Commands::Rebuild => {
            let analyzer = load_analyzer(&config)?;
            let engine = engine::spawn_engine(analyzer, kiosk::dataset_paths(&config), None)?;
            println!("Rebuilding dataset from {}...", config.paths.dataset_dir.display());
            let report = engine.rebuild().await?;
            println!(
                "Dataset has been rebuilt: {} encoded, {} unchanged, {} skipped",
                report.encoded, report.reused, report.skipped
            );
            println!("Gallery written to {}", config.paths.gallery_path.display());
        }
        Commands::Gallery { action } => gallery(&config, action)?,
        Commands::Status => {
            let client = StatusClient::new(&config.remote.status_url, config.remote.request_timeout())?;
            match client.fetch().await? {
                Some(value) if value == config.remote.ready_value => println!("ready ({value})"),
                Some(value) => println!("not ready ({value})"),
                None => println!("not ready (endpoint returned an error status)"),
            }
        }
        Commands::Devices => {
            let devices = facegate_hw::Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for dev in devices {
                println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
        }
    }

    Ok(())
}

fn load_analyzer(config: &Config) -> Result<FaceAnalyzer> {
    FaceAnalyzer::load(&config.paths.model_dir)
        .with_context(|| format!("loading models from {}", config.paths.model_dir.display()))
}

fn gallery(config: &Config, action: GalleryAction) -> Result<()> {
    let gallery_path = &config.paths.gallery_path;
    let mut gallery = Gallery::load(gallery_path)?;

    match action {
        GalleryAction::List => {
            if gallery.is_empty() {
                println!("Gallery is empty; run `facegate rebuild` after adding pictures.");
            }
            for entry in gallery.entries() {
                println!("{:<12} {:<24} {}", entry.id, entry.name, entry.source);
            }
        }
        GalleryAction::Show { id } => {
            let entry = gallery.find(&id).with_context(|| format!("no enrolled identity with id {id}"))?;
            let summary = serde_json::json!({
                "id": entry.id,
                "name": entry.name,
                "source": entry.source,
                "source_sha256": entry.source_sha256,
                "embedding_dim": entry.embedding.values.len(),
                "model_version": entry.embedding.model_version,
                "created_at": entry.created_at,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        GalleryAction::Add { name, id, image } => {
            let mut analyzer = load_analyzer(config)?;
            let entry = facegate_core::enroll_image(
                &mut analyzer,
                &config.paths.dataset_dir,
                &mut gallery,
                &image,
                Identity::new(name, id),
            )?;
            gallery.save(gallery_path)?;
            println!("Enrolled {} ({}) from {}", entry.name, entry.id, entry.source);
        }
        GalleryAction::Remove { id } => {
            let removed = facegate_core::remove_identity(&config.paths.dataset_dir, &mut gallery, &id)
                .with_context(|| format!("no enrolled identity with id {id}"))?;
            gallery.save(gallery_path)?;
            println!("Removed {} ({})", removed.name, removed.id);
        }
    }

    Ok(())
}
