//! plandeploy - main entry point
//!
//! Runs a plan manifest headlessly, as a deployment job or (with --dry-run)
//! a preflight check, and prints the resulting record as JSON.

use anyhow::{Context, Result};
use plandeploy::cancel::{request_cancel, CancelStore, InMemoryCancelStore};
use plandeploy::cli::{Cli, Commands};
use plandeploy::config::DeployConfig;
use plandeploy::deploy;
use plandeploy::manifest::PlanManifest;
use plandeploy::models::{JobStatus, PreflightStatus, UserId};
use plandeploy::store::PlanCatalog;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber; RUST_LOG overrides the default `info` level
fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<DeployConfig> {
    let config = match path {
        Some(path) => {
            info!("Loading configuration from: {:?}", path);
            DeployConfig::load_from_file(path)?
        }
        None => DeployConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    init_logger();
    info!("plandeploy starting up");

    let cli = Cli::parse_args();
    debug!("CLI arguments parsed");

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate { manifest } => {
            info!("Validating manifest: {:?}", manifest);
            let loaded = PlanManifest::load_from_file(&manifest)
                .with_context(|| format!("Failed to load manifest {:?}", manifest))?;
            if let Err(e) = loaded.validate() {
                error!("Manifest validation failed: {}", e);
                eprintln!("✗ Manifest validation failed: {}", e);
                std::process::exit(1);
            }
            println!("✓ Manifest is valid: plan '{}' with {} step(s)", loaded.plan, loaded.steps.len());
        }
        Commands::Run { manifest, user } => {
            let loaded = PlanManifest::load_from_file(&manifest)
                .with_context(|| format!("Failed to load manifest {:?}", manifest))?;
            let user = user.map(UserId);
            let ok = if cli.dry_run {
                run_preflight(&loaded, user)?
            } else {
                run_job(&loaded, user, &config)?
            };
            if !ok {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Run the job; Ctrl-C requests cancellation at the next task boundary
fn run_job(manifest: &PlanManifest, user: Option<UserId>, config: &DeployConfig) -> Result<bool> {
    let mut catalog = PlanCatalog::new();
    let job = deploy::prepare_job(manifest, &mut catalog, user)?;

    let store = Arc::new(InMemoryCancelStore::new());
    let handler_store = Arc::clone(&store);
    let job_id = job.id;
    let ttl = config.cancel_ttl();
    if let Err(e) = ctrlc::set_handler(move || {
        request_cancel(handler_store.as_ref(), job_id, ttl);
    }) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    let store: Arc<dyn CancelStore> = store;
    let (job, summary) = deploy::run_job(manifest, &catalog, job, config, store)?;
    info!("Job {} {}", job.id, summary.outcome);

    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(job.status == JobStatus::Complete)
}

fn run_preflight(manifest: &PlanManifest, user: Option<UserId>) -> Result<bool> {
    let mut catalog = PlanCatalog::new();
    let (preflight, summary) = deploy::run_preflight(manifest, &mut catalog, user)?;
    info!("Preflight {} {}", preflight.id, summary.outcome);

    println!("{}", serde_json::to_string_pretty(&preflight)?);
    Ok(preflight.status == PreflightStatus::Complete && !preflight.has_errors())
}
