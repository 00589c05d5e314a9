//! `mailat-inbound` - inbound mail processor
//!
//! Ingests receiving-service notifications into the local store, decodes the
//! raw messages and applies filter rules. Also validates and generates Sieve
//! scripts.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use mailat_core::identity::OrgId;
use mailat_core::ingest::parse_payload;
use mailat_core::{
    ChannelQueue, Database, Decoder, Evaluator, FilterRepository, FsObjectStore,
    IdentityRepository, Intake, IntakeOutcome, MailRepository, Processor, SieveScript, run_worker,
    sieve,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Settings;

#[derive(Debug, Parser)]
#[command(name = "mailat-inbound", version, about = "Inbound mail processor")]
struct Cli {
    /// Settings file (defaults to `<config dir>/mailat/inbound.json`)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ingest notification payloads and run decoding and filtering
    Ingest {
        /// JSON payloads, either bare notifications or pub/sub envelopes
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },
    /// Sieve script tooling
    Sieve {
        #[command(subcommand)]
        command: SieveCommand,
    },
}

#[derive(Debug, Subcommand)]
enum SieveCommand {
    /// Check a script for structural errors
    Validate {
        /// Script file
        file: PathBuf,
    },
    /// Print the script compiled from an organization's filter rules
    Generate {
        /// Organization id
        #[arg(long)]
        org: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Ingest { files } => ingest(&settings, &files).await,
        Command::Sieve {
            command: SieveCommand::Validate { file },
        } => validate_script(&file),
        Command::Sieve {
            command: SieveCommand::Generate { org },
        } => generate_script(&settings, OrgId::new(org)).await,
    }
}

async fn open_database(settings: &Settings) -> anyhow::Result<Database> {
    if let Some(parent) = settings.database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let path = settings.database_path.to_string_lossy();
    Database::open(&path)
        .await
        .with_context(|| format!("opening database {path}"))
}

async fn ingest(settings: &Settings, files: &[PathBuf]) -> anyhow::Result<()> {
    let db = open_database(settings).await?;
    let pool = db.pool().clone();
    let mail = MailRepository::new(pool.clone());
    let store = FsObjectStore::new(&settings.object_root);

    let processor = Processor::new(
        Decoder::new(mail.clone(), store),
        Evaluator::new(mail.clone(), FilterRepository::new(pool.clone())),
    );
    let (queue, receiver) = ChannelQueue::new();
    let worker = tokio::spawn(run_worker(receiver, processor));

    let intake = Intake::new(IdentityRepository::new(pool), mail, queue);
    let mut failures = 0_usize;
    for file in files {
        match ingest_file(&intake, file).await {
            Ok(outcome) => info!("{}: {outcome:?}", file.display()),
            Err(e) => {
                warn!("{}: {e:#}", file.display());
                failures += 1;
            }
        }
    }

    // Dropping the intake closes the queue so the worker can finish.
    drop(intake);
    worker.await.context("background worker failed")?;

    if failures > 0 {
        bail!("{failures} of {} payload(s) failed", files.len());
    }
    Ok(())
}

async fn ingest_file(intake: &Intake<ChannelQueue>, file: &Path) -> anyhow::Result<IntakeOutcome> {
    let payload = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let Some(notification) = parse_payload(&payload)? else {
        return Ok(IntakeOutcome::Ignored);
    };
    Ok(intake.ingest(&notification).await?)
}

fn validate_script(file: &Path) -> anyhow::Result<()> {
    let text =
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let name = file
        .file_stem()
        .map_or_else(|| "script".to_string(), |s| s.to_string_lossy().into_owned());

    let script = SieveScript::new(name, text, false);
    match script.last_error() {
        None => {
            println!("{}: valid", script.name());
            Ok(())
        }
        Some(e) => bail!("{}: {e}", script.name()),
    }
}

async fn generate_script(settings: &Settings, org: OrgId) -> anyhow::Result<()> {
    let db = open_database(settings).await?;
    let rules = FilterRepository::new(db.pool().clone())
        .rules_for_org(org)
        .await?;
    print!("{}", sieve::generate(&rules));
    Ok(())
}
