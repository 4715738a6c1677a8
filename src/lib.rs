//! plandeploy library
//!
//! Flow callbacks that drive installation plans: deployment jobs with
//! cancellation, preflight checks with per-step verdicts, and the plan,
//! permission and manifest plumbing around them.

pub mod cancel;
pub mod cli;
pub mod config;
pub mod deploy;
pub mod error;
pub mod executor;
pub mod flows;
pub mod manifest;
pub mod models;
pub mod permissions;
pub mod run_state;
pub mod store;
pub mod task;

// Re-export main types for convenience
pub use cancel::{job_cancel_key, request_cancel, CancelStore, InMemoryCancelStore, JOB_CANCEL_KEY};
pub use config::DeployConfig;
pub use error::DeployError;
pub use executor::{FlowCoordinator, RunOutcome, RunSummary};
pub use flows::{
    BasicFlowCallback, FlowCallback, FlowControl, JobFlowCallback, PreflightFlowCallback,
    StepResolver,
};
pub use manifest::{ManifestError, PlanManifest, ScriptedOutcome, ScriptedTask};
pub use models::{
    Job, JobId, JobStatus, Outcome, Plan, PlanId, PreflightId, PreflightResult, PreflightStatus,
    ResultKey, Results, StatusCode, Step, StepId, UserId,
};
pub use permissions::{allow_delete, Actor, Method, OnlyOwnerOrSuperuserCanDelete, Owned};
pub use run_state::{RunState, RunStateError, RunTracker};
pub use store::{PlanCatalog, StoreError};
pub use task::{NamedTask, StepReturnValue, Task, TaskError, TaskIdentity, TaskResult};
