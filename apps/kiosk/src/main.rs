use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use capture::DirectoryCamera;
use clap::{Parser, Subcommand};
use client_core::{HttpBackend, KioskContext};
use shared::{domain::RecognitionModel, error::WorkflowError};
use storage::Storage;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod render;

use config::{load_settings, normalize_database_url};

#[derive(Parser, Debug)]
#[command(name = "kiosk", about = "Face recognition attendance kiosk")]
struct Cli {
    /// Settings file; defaults to ./kiosk.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    backend_url: Option<String>,
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Registered users, attendance totals, and recent activity.
    Dashboard {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Runs one attendance check against a frame from the camera directory.
    Verify {
        #[arg(long)]
        camera_dir: PathBuf,
        #[arg(long, default_value_t = RecognitionModel::Facenet)]
        model: RecognitionModel,
    },
    /// Captures three poses and registers a new face.
    Register {
        #[arg(long)]
        camera_dir: PathBuf,
        #[arg(long)]
        nim: String,
        #[arg(long)]
        name: String,
    },
    /// Uploads existing photos for an already registered NIM.
    UploadDataset {
        #[arg(long)]
        nim: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Prints the local attendance log.
    Logs {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref())?;
    settings.apply_cli(cli.backend_url, cli.database_url);
    settings.validate()?;

    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url)
        .await
        .with_context(|| format!("failed to open activity log database '{database_url}'"))?;
    let backend = HttpBackend::new(&settings.backend_url, settings.request_timeout())?;
    info!(backend = %settings.backend_url, database = %database_url, "kiosk starting");

    let context =
        KioskContext::initialize(Arc::new(backend), Arc::new(storage), settings.jpeg_quality)
            .await?;

    if let Err(err) = run(cli.command, &context).await {
        if let Some(workflow) = err.downcast_ref::<WorkflowError>() {
            eprintln!("{workflow}: {}", render::failure_hint(workflow));
        }
        return Err(err);
    }
    Ok(())
}

async fn run(command: Command, context: &KioskContext) -> Result<()> {
    match command {
        Command::Dashboard { limit } => {
            let view = context.dashboard(limit).await;
            print!("{}", render::dashboard(&view));
        }
        Command::Verify { camera_dir, model } => {
            let attendance = context.attendance();
            attendance.enter(&DirectoryCamera::new(camera_dir)).await?;
            let result = attendance.submit_verification(model).await;
            attendance.exit().await;
            let result = result?;
            print!("{}", render::attendance_result(&result));
            println!("{}", render::connectivity_banner(context.connectivity().is_connected()));
        }
        Command::Register {
            camera_dir,
            nim,
            name,
        } => {
            let wizard = context.registration(Arc::new(DirectoryCamera::new(camera_dir)));
            wizard.advance_from_identity(&nim, &name).await?;
            loop {
                let step = wizard.step().await;
                if !step.is_capture() {
                    break;
                }
                println!("[{}/3] {}", step.index(), step.instruction());
                wizard.capture_pose().await?;
            }
            let outcome = wizard.submit_registration().await;
            wizard.reset().await;
            println!("{}", outcome?);
        }
        Command::UploadDataset { nim, files } => {
            let dataset = context.dataset();
            dataset.add_files(files).await;
            for slot in dataset.files().await {
                match slot.preview() {
                    Some(preview) => println!(
                        "  {} (preview {} bytes)",
                        slot.path().display(),
                        preview.decoded_len()
                    ),
                    None => {
                        warn!(path = %slot.path().display(), "no preview available");
                        println!("  {} (no preview)", slot.path().display());
                    }
                }
            }
            println!("{}", dataset.submit_batch(&nim).await?);
        }
        Command::Logs { limit, json } => {
            let entries = match limit {
                Some(limit) => context.log().recent(limit).await,
                None => context.log().entries().await,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print!("{}", render::log_table(&entries));
            }
        }
    }

    Ok(())
}
