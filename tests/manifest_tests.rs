//! Tests for manifest loading and headless runs
//!
//! These tests verify:
//! - Manifests and configs load from disk
//! - A job run records outcomes per selected step
//! - Cancellation stops a run between tasks
//! - A preflight run records only flagged steps

use plandeploy::cancel::{request_cancel, CancelStore, InMemoryCancelStore};
use plandeploy::config::DeployConfig;
use plandeploy::deploy;
use plandeploy::executor::{FlowCoordinator, RunOutcome};
use plandeploy::manifest::{ManifestError, PlanManifest};
use plandeploy::models::{JobStatus, Outcome, PreflightStatus, ResultKey, StatusCode};
use plandeploy::store::PlanCatalog;
use plandeploy::task::{Task, TaskError, TaskIdentity, TaskResult};
use plandeploy::{FlowCallback, JobFlowCallback};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

const MANIFEST: &str = r#"{
    "plan": "Starter package",
    "steps": [
        { "path": "deploy_pre", "name": "Pre-install" },
        { "path": "deploy", "name": "Install package" },
        { "path": "deploy_post", "name": "Post-install" }
    ],
    "tasks": [
        { "name": "deploy_pre", "outcome": { "result": "ok" } },
        { "name": "update_admin_profile", "outcome": { "result": "ok" } },
        { "name": "deploy", "outcome": { "result": "error", "message": "Org is locked" } },
        { "name": "deploy_post", "outcome": { "result": "ok" } }
    ],
    "preflight_tasks": [
        { "name": "get_preflight", "outcome": { "result": "ok", "return_values": [
            { "path": "deploy_pre", "status_code": "ok" },
            { "path": "deploy", "status_code": "warn", "msg": "Missing licenses" },
            { "path": "deploy_post", "status_code": "skip", "msg": "Already installed" }
        ] } }
    ]
}"#;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Should create temp file");
    file.write_all(contents.as_bytes()).expect("Should write");
    file
}

fn manifest() -> PlanManifest {
    PlanManifest::from_json(MANIFEST).expect("Should parse manifest")
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_load_manifest_from_file() {
    let file = write_temp(MANIFEST);
    let loaded = PlanManifest::load_from_file(file.path()).expect("Should load");
    assert_eq!(loaded, manifest());
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_missing_manifest_is_io_error() {
    let err = PlanManifest::load_from_file("/nonexistent/plan.json").unwrap_err();
    assert!(matches!(err, ManifestError::IoError { .. }));
}

#[test]
fn test_duplicate_step_path_rejected() {
    let mut manifest = manifest();
    let first = manifest.steps[0].clone();
    manifest.steps.push(first);
    assert!(matches!(
        manifest.validate(),
        Err(ManifestError::DuplicatePath { .. })
    ));
}

#[test]
fn test_config_roundtrip_through_file() {
    let config = DeployConfig {
        cancel_ttl_secs: 60,
        stop_on_error: true,
        job_log_limit: 50,
    };
    let file = NamedTempFile::new().unwrap();
    config.save_to_file(file.path()).expect("Should save");

    let loaded = DeployConfig::load_from_file(file.path()).expect("Should load");
    assert_eq!(loaded, config);
}

#[test]
fn test_invalid_config_file() {
    let file = write_temp("{ \"cancel_ttl_secs\": \"soon\" }");
    assert!(DeployConfig::load_from_file(file.path()).is_err());
}

// =============================================================================
// Job runs
// =============================================================================

#[test]
fn test_job_run_records_each_step() {
    let manifest = manifest();
    let mut catalog = PlanCatalog::new();
    let job = deploy::prepare_job(&manifest, &mut catalog, None).unwrap();
    let step_ids = job.steps.clone();

    let (job, summary) = deploy::run_job(
        &manifest,
        &catalog,
        job,
        &DeployConfig::default(),
        Arc::new(InMemoryCancelStore::new()),
    )
    .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.tasks_run, 4);
    assert_eq!(summary.tasks_failed, 1);

    // update_admin_profile is not a plan step and leaves no trace
    assert_eq!(job.results.len(), 3);
    assert_eq!(job.results[&ResultKey::Step(step_ids[0])], vec![Outcome::ok()]);
    assert_eq!(
        job.results[&ResultKey::Step(step_ids[1])],
        vec![Outcome::error("Org is locked")]
    );
    assert_eq!(job.results[&ResultKey::Step(step_ids[2])], vec![Outcome::ok()]);
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.log.contains("Task deploy failed: Org is locked"));
}

#[test]
fn test_job_run_stop_on_error() {
    let manifest = manifest();
    let mut catalog = PlanCatalog::new();
    let job = deploy::prepare_job(&manifest, &mut catalog, None).unwrap();
    let config = DeployConfig {
        stop_on_error: true,
        ..Default::default()
    };

    let (job, summary) = deploy::run_job(
        &manifest,
        &catalog,
        job,
        &config,
        Arc::new(InMemoryCancelStore::new()),
    )
    .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Stopped);
    assert_eq!(summary.tasks_run, 3);
    assert_eq!(job.results.len(), 2);
    assert_eq!(job.status, JobStatus::Failed);
}

/// Task that cancels its own job while running
struct CancelsJob {
    name: &'static str,
    store: Arc<InMemoryCancelStore>,
    job_id: plandeploy::JobId,
}

impl TaskIdentity for CancelsJob {
    fn identifying_path(&self) -> &str {
        self.name
    }
}

impl Task for CancelsJob {
    fn run(&self) -> Result<TaskResult, TaskError> {
        request_cancel(self.store.as_ref(), self.job_id, Duration::from_secs(60));
        Ok(TaskResult::default())
    }
}

#[test]
fn test_cancel_mid_run_stops_at_next_task() {
    let manifest = manifest();
    let mut catalog = PlanCatalog::new();
    let job = deploy::prepare_job(&manifest, &mut catalog, None).unwrap();
    let job_id = job.id;
    let first_step = job.steps[0];

    let store = Arc::new(InMemoryCancelStore::new());
    let tasks: Vec<Box<dyn Task>> = vec![
        Box::new(CancelsJob {
            name: "deploy_pre",
            store: Arc::clone(&store),
            job_id,
        }),
        manifest.job_tasks().remove(2),
    ];

    let mut callback = JobFlowCallback::from_catalog(&catalog, job, store.clone()).unwrap();
    let summary = FlowCoordinator::new().run(&tasks, &mut callback);
    let job = callback.into_context();

    assert_eq!(summary.outcome, RunOutcome::Cancelled);
    assert_eq!(summary.tasks_run, 1);
    // The task that requested the cancel still finished and was recorded
    assert_eq!(job.results.len(), 1);
    assert_eq!(job.results[&ResultKey::Step(first_step)], vec![Outcome::ok()]);
    assert_eq!(job.status, JobStatus::Canceled);
    assert!(store.is_flag_set(&plandeploy::job_cancel_key(job_id)));
}

#[test]
fn test_post_flow_not_called_after_cancel() {
    let manifest = manifest();
    let mut catalog = PlanCatalog::new();
    let job = deploy::prepare_job(&manifest, &mut catalog, None).unwrap();
    let store = Arc::new(InMemoryCancelStore::new());
    request_cancel(store.as_ref(), job.id, Duration::from_secs(60));

    let mut callback = JobFlowCallback::from_catalog(&catalog, job, store).unwrap();
    let summary = FlowCoordinator::new().run(&manifest.job_tasks(), &mut callback);
    assert_eq!(summary.tasks_run, 0);

    // A stray post_flow after the abort changes nothing
    callback.post_flow();
    assert_eq!(callback.context().status, JobStatus::Canceled);
    assert!(callback.context().results.is_empty());
}

// =============================================================================
// Preflight runs
// =============================================================================

#[test]
fn test_preflight_run_records_flagged_steps() {
    let manifest = manifest();
    let mut catalog = PlanCatalog::new();
    let (preflight, summary) = deploy::run_preflight(&manifest, &mut catalog, None).unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(preflight.status, PreflightStatus::Complete);

    let steps = catalog.steps_for_plan(preflight.plan_id).unwrap();
    let results = &preflight.results;
    assert_eq!(results.len(), 2);
    assert!(!results.contains_key(&ResultKey::Step(steps[0].id)));
    assert_eq!(
        results[&ResultKey::Step(steps[1].id)],
        vec![Outcome::new(StatusCode::Warn, "Missing licenses")]
    );
    assert_eq!(
        results[&ResultKey::Step(steps[2].id)],
        vec![Outcome::new(StatusCode::Skip, "Already installed")]
    );
    assert!(!preflight.has_errors());
}

#[test]
fn test_preflight_run_level_failure() {
    let manifest = PlanManifest::from_json(
        r#"{
            "plan": "Broken",
            "steps": [{ "path": "deploy", "name": "Deploy" }],
            "preflight_tasks": [
                { "name": "get_preflight", "outcome": { "result": "error", "message": "Org unreachable" } }
            ]
        }"#,
    )
    .unwrap();
    let mut catalog = PlanCatalog::new();
    let (preflight, _) = deploy::run_preflight(&manifest, &mut catalog, None).unwrap();

    assert_eq!(preflight.status, PreflightStatus::Failed);
    assert_eq!(
        preflight.results[&ResultKey::Plan],
        vec![Outcome::error("Org unreachable")]
    );
    assert_eq!(preflight.results.len(), 1);
}
