//! Headless runs of a manifest: a deployment job or a preflight check.

use crate::cancel::CancelStore;
use crate::config::DeployConfig;
use crate::executor::{FlowCoordinator, RunSummary};
use crate::flows::{JobFlowCallback, PreflightFlowCallback};
use crate::manifest::PlanManifest;
use crate::models::{Job, PreflightResult, UserId};
use crate::store::PlanCatalog;
use std::sync::Arc;
use tracing::info;

/// Register the manifest's plan and create a job for its selected steps.
pub fn prepare_job(
    manifest: &PlanManifest,
    catalog: &mut PlanCatalog,
    user: Option<UserId>,
) -> crate::error::Result<Job> {
    let loaded = manifest.register(catalog)?;
    let job = catalog.create_job(loaded.plan.id, loaded.selected, user)?;
    info!("Prepared job {} for plan '{}'", job.id, loaded.plan.title);
    Ok(job)
}

/// Run the manifest's job tasks for `job`, honoring cancellation through `cancel_store`.
pub fn run_job(
    manifest: &PlanManifest,
    catalog: &PlanCatalog,
    job: Job,
    config: &DeployConfig,
    cancel_store: Arc<dyn CancelStore>,
) -> crate::error::Result<(Job, RunSummary)> {
    let mut callback = JobFlowCallback::from_catalog(catalog, job, cancel_store)?
        .with_log_limit(config.job_log_limit);

    let summary = FlowCoordinator::new()
        .stop_on_error(config.stop_on_error)
        .run(&manifest.job_tasks(), &mut callback);

    Ok((callback.into_context(), summary))
}

/// Register the manifest's plan and run its preflight tasks.
pub fn run_preflight(
    manifest: &PlanManifest,
    catalog: &mut PlanCatalog,
    user: Option<UserId>,
) -> crate::error::Result<(PreflightResult, RunSummary)> {
    let loaded = manifest.register(catalog)?;
    let preflight = catalog.create_preflight(loaded.plan.id, user)?;
    let mut callback = PreflightFlowCallback::new(preflight, loaded.steps);

    // Preflight checks never stop early: every check reports
    let summary = FlowCoordinator::new().run(&manifest.preflight_tasks(), &mut callback);

    Ok((callback.into_context(), summary))
}
