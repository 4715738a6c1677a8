//! Flow callbacks - the hooks an executor calls while it runs a plan.
//!
//! An executor runs tasks one after another and reports each lifecycle event
//! to a [`FlowCallback`]. The callbacks translate those events into domain
//! records:
//!
//! - [`JobFlowCallback`] - live deployment: per-task outcomes, cancellation
//! - [`PreflightFlowCallback`] - dry run: aggregate step verdicts, classify at the end
//! - [`BasicFlowCallback`] - the shared part: context plus step resolution
//!
//! # Hook order
//!
//! ```text
//! pre_flow
//!   for each task:
//!     pre_task ──Abort──→ stop (no post_flow)
//!     run
//!     post_task | post_task_exception
//! post_flow
//! ```

pub mod job;
pub mod preflight;

pub use job::JobFlowCallback;
pub use preflight::PreflightFlowCallback;

use crate::models::{Step, StepId};
use crate::task::{TaskError, TaskIdentity, TaskResult};

/// Decision returned by [`FlowCallback::pre_task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    /// Dispatch the task
    Continue,
    /// Stop the run now; no further task may start
    Abort,
}

impl FlowControl {
    #[inline]
    pub const fn is_abort(self) -> bool {
        matches!(self, Self::Abort)
    }
}

/// Lifecycle hooks invoked synchronously by the executor.
///
/// Every hook has a no-op default so a callback only implements what it
/// cares about. `post_task_exception` receives `None` when the failure is not
/// tied to a task (e.g. the flow itself failed to start).
pub trait FlowCallback {
    fn pre_flow(&mut self) {}

    fn pre_task(&mut self, _task: &dyn TaskIdentity) -> FlowControl {
        FlowControl::Continue
    }

    fn post_task(&mut self, _task: &dyn TaskIdentity, _result: &TaskResult) {}

    fn post_task_exception(&mut self, _task: Option<&dyn TaskIdentity>, _err: &TaskError) {}

    fn post_flow(&mut self) {}
}

/// Maps task paths to the steps relevant to one run.
///
/// Only the steps handed in are searched: a job resolves against the steps it
/// selected, a preflight against every step of the plan.
#[derive(Debug, Clone, Default)]
pub struct StepResolver {
    steps: Vec<Step>,
}

impl StepResolver {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Resolver that matches nothing
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Id of the step whose path equals `task_path`, or `None` if no step in
    /// the run matches
    pub fn resolve_step_id(&self, task_path: &str) -> Option<StepId> {
        self.steps
            .iter()
            .find(|step| step.path == task_path)
            .map(|step| step.id)
    }
}

/// Context plus step resolution, shared by the job and preflight callbacks.
///
/// The context is held opaquely; on its own this callback records nothing.
#[derive(Debug, Clone)]
pub struct BasicFlowCallback<C> {
    context: C,
    resolver: StepResolver,
}

impl<C> BasicFlowCallback<C> {
    pub fn new(context: C, steps: Vec<Step>) -> Self {
        Self {
            context,
            resolver: StepResolver::new(steps),
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn into_context(self) -> C {
        self.context
    }

    pub fn resolver(&self) -> &StepResolver {
        &self.resolver
    }

    pub fn resolve_step_id(&self, task_path: &str) -> Option<StepId> {
        self.resolver.resolve_step_id(task_path)
    }
}

impl<C> FlowCallback for BasicFlowCallback<C> {}
