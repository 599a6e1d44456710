use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use kinlink::checkpoint::CheckpointStore;
use kinlink::config::{Config, DEFAULT_CONFIG_PATH, DirectoryConfig};
use kinlink::fetch::challenge::{ChallengeSolver, EnvTokenSolver, NoSolver};
use kinlink::fetch::http::HttpSession;
use kinlink::harvest::harvest;
use kinlink::harvest::listing::{ListingSource, read_records, write_records};
use kinlink::harvest::retry::blocking_sleep;
use kinlink::link::{BatchStatus, Linker};

const EXIT_ABORTED: u8 = 2;

#[derive(Parser)]
#[command(name = "kinlink", version, about = "Obituary harvester and next-of-kin linker")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Harvest the obituary listing into the input file
    Harvest,
    /// Link input records against the directory, resuming from the checkpoint
    Link {
        /// Hide the progress bar
        #[arg(long)]
        quiet: bool,
    },
    /// Harvest, then link
    Run {
        #[arg(long)]
        quiet: bool,
    },
    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(BatchStatus::Completed) => ExitCode::SUCCESS,
        Ok(BatchStatus::Aborted) => ExitCode::from(EXIT_ABORTED),
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<BatchStatus> {
    if let Command::InitConfig { force } = cli.command {
        return init_config(&cli.config, force).map(|()| BatchStatus::Completed);
    }

    let config = Config::load(&cli.config)?;
    config.validate().context("invalid configuration")?;
    let session = HttpSession::open(&config.http).context("failed to open HTTP session")?;

    match cli.command {
        Command::Harvest => harvest_listing(&config, &session),
        Command::Link { quiet } => link_records(&config, &session, !quiet),
        Command::Run { quiet } => {
            harvest_listing(&config, &session)?;
            link_records(&config, &session, !quiet)
        }
        Command::InitConfig { .. } => Ok(BatchStatus::Completed),
    }
}

fn init_config(path: &str, force: bool) -> Result<()> {
    if Path::new(path).exists() && !force {
        anyhow::bail!("{path} already exists (use --force to overwrite)");
    }
    Config::default().save(path)?;
    info!("Wrote default configuration to {path}");
    Ok(())
}

fn harvest_listing(config: &Config, session: &HttpSession) -> Result<BatchStatus> {
    let listing = &config.obituaries;
    info!("Harvesting obituaries from {}", listing.url);

    let mut source = ListingSource::new(session, listing);
    let settings = config.retry.harvest_settings(listing.page_ceiling);
    let report = harvest(&mut source, &settings, &mut blocking_sleep);

    if let Some(failure) = &report.failure {
        warn!("Harvest stopped early: {failure:?}");
    }
    write_records(Path::new(&config.input_path), &report.records)?;
    Ok(BatchStatus::Completed)
}

fn link_records(config: &Config, session: &HttpSession, progress: bool) -> Result<BatchStatus> {
    let records = read_records(Path::new(&config.input_path))?;
    let store = CheckpointStore::new(&config.checkpoint_path);

    let token_env = match &config.directory {
        DirectoryConfig::Genealogy {
            challenge: Some(challenge),
            ..
        } => challenge.token_env.clone(),
        _ => None,
    };
    let solver: Box<dyn ChallengeSolver> = match token_env {
        Some(var) => Box::new(EnvTokenSolver::new(var)),
        None => Box::new(NoSolver),
    };

    let summary = Linker::new(session, solver.as_ref(), blocking_sleep, config)
        .with_progress(progress)
        .run_batch(&records, &store)
        .with_context(|| format!("linking stopped: {}", store.path().display()))?;

    info!(
        "{} records: {} resumed, {} linked, {} without match, {} skipped",
        summary.total, summary.resumed, summary.linked, summary.no_match, summary.skipped
    );
    Ok(summary.status)
}
