//! Job flow callback - records a live deployment run.
//!
//! Each successful task appends an `ok` outcome to its step, each failing
//! task an `error` outcome carrying the task's message. Task errors never
//! escape: they become data and the run goes on. The one way to stop a run
//! is a cancellation flag, checked before every task.

use super::{BasicFlowCallback, FlowCallback, FlowControl};
use crate::cancel::{self, CancelStore};
use crate::models::{record_outcome, Job, JobStatus, Outcome, Step};
use crate::run_state::{RunState, RunTracker};
use crate::store::{PlanCatalog, StoreError};
use crate::task::{TaskError, TaskIdentity, TaskResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default cap on buffered run-log lines
pub const DEFAULT_LOG_LIMIT: usize = 1000;

/// Run log lines kept until the flow finishes.
#[derive(Debug, Clone)]
struct RunLog {
    lines: Vec<String>,
    limit: usize,
    dropped: usize,
}

impl RunLog {
    fn new(limit: usize) -> Self {
        Self {
            lines: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    fn push(&mut self, line: String) {
        if self.lines.len() >= self.limit {
            self.lines.remove(0);
            self.dropped += 1;
        }
        self.lines.push(line);
    }

    /// Drain buffered lines into one text block
    fn take(&mut self) -> String {
        let mut text = String::new();
        if self.dropped > 0 {
            text.push_str(&format!("[{} earlier line(s) dropped]\n", self.dropped));
            self.dropped = 0;
        }
        text.push_str(&self.lines.join("\n"));
        self.lines.clear();
        text
    }
}

/// Drives a deployment [`Job`] through the flow hooks.
pub struct JobFlowCallback {
    base: BasicFlowCallback<Job>,
    cancel_store: Arc<dyn CancelStore>,
    tracker: RunTracker,
    log: RunLog,
    failed_tasks: usize,
}

impl JobFlowCallback {
    /// `steps` are the steps selected for this job; tasks outside them are not tracked.
    pub fn new(job: Job, steps: Vec<Step>, cancel_store: Arc<dyn CancelStore>) -> Self {
        Self {
            base: BasicFlowCallback::new(job, steps),
            cancel_store,
            tracker: RunTracker::new(),
            log: RunLog::new(DEFAULT_LOG_LIMIT),
            failed_tasks: 0,
        }
    }

    /// Build the callback with the job's selected steps looked up in the catalog
    pub fn from_catalog(
        catalog: &PlanCatalog,
        job: Job,
        cancel_store: Arc<dyn CancelStore>,
    ) -> Result<Self, StoreError> {
        let steps = catalog.steps_by_ids(&job.steps)?;
        Ok(Self::new(job, steps, cancel_store))
    }

    /// Cap the number of run-log lines kept in memory
    pub fn with_log_limit(mut self, limit: usize) -> Self {
        self.log.limit = limit.max(1);
        self
    }

    pub fn context(&self) -> &Job {
        self.base.context()
    }

    pub fn into_context(self) -> Job {
        self.base.into_context()
    }

    pub fn state(&self) -> RunState {
        self.tracker.current()
    }

    pub fn resolve_step_id(&self, task_path: &str) -> Option<crate::models::StepId> {
        self.base.resolve_step_id(task_path)
    }

    fn log_line(&mut self, line: String) {
        self.log.push(line);
    }

    fn flush_log(&mut self) {
        let text = self.log.take();
        if text.is_empty() {
            return;
        }
        let job = self.base.context_mut();
        if !job.log.is_empty() {
            job.log.push('\n');
        }
        job.log.push_str(&text);
    }

    fn finish(&mut self, state: RunState, status: JobStatus) {
        if let Err(e) = self.tracker.transition_to(state) {
            warn!("Job {}: {}", self.context().id, e);
            return;
        }
        self.base.context_mut().status = status;
        self.flush_log();
    }
}

impl FlowCallback for JobFlowCallback {
    fn pre_flow(&mut self) {
        let job = self.context();
        info!("Job {}: starting flow for plan {}", job.id, job.plan_id);
        let line = format!("Starting job {}", job.id);
        self.log_line(line);
    }

    fn pre_task(&mut self, task: &dyn TaskIdentity) -> FlowControl {
        let job_id = self.context().id;

        if self.tracker.is_terminal() {
            warn!("Job {}: task dispatched after run ended ({})", job_id, self.tracker.current());
            return FlowControl::Abort;
        }

        if cancel::is_cancel_requested(self.cancel_store.as_ref(), job_id) {
            info!("Job {}: cancellation requested, stopping before {}", job_id, task.identifying_path());
            self.log_line(format!("Job canceled before task {}", task.identifying_path()));
            self.finish(RunState::Cancelled, JobStatus::Canceled);
            return FlowControl::Abort;
        }

        if let Err(e) = self.tracker.start() {
            warn!("Job {}: {}", job_id, e);
        }
        debug!("Job {}: running task {}", job_id, task.identifying_path());
        self.log_line(format!("Running task {}", task.identifying_path()));
        FlowControl::Continue
    }

    fn post_task(&mut self, task: &dyn TaskIdentity, _result: &TaskResult) {
        let path = task.identifying_path();
        let Some(step_id) = self.base.resolve_step_id(path) else {
            debug!("Job {}: task {} is not a tracked step", self.context().id, path);
            return;
        };

        record_outcome(&mut self.base.context_mut().results, step_id, Outcome::ok());
        info!("Job {}: step {} ({}) succeeded", self.context().id, step_id, path);
        self.log_line(format!("Task {} completed", path));
    }

    fn post_task_exception(&mut self, task: Option<&dyn TaskIdentity>, err: &TaskError) {
        self.failed_tasks += 1;
        let Some(task) = task else {
            warn!("Job {}: flow error outside any task: {}", self.context().id, err);
            self.log_line(format!("Flow error: {}", err));
            return;
        };

        let path = task.identifying_path();
        self.log_line(format!("Task {} failed: {}", path, err));
        let Some(step_id) = self.base.resolve_step_id(path) else {
            debug!("Job {}: failed task {} is not a tracked step", self.context().id, path);
            return;
        };

        record_outcome(
            &mut self.base.context_mut().results,
            step_id,
            Outcome::error(err.to_string()),
        );
        warn!("Job {}: step {} ({}) failed: {}", self.context().id, step_id, path, err);
    }

    fn post_flow(&mut self) {
        if self.tracker.is_terminal() {
            debug!("Job {}: flow already finalized ({})", self.context().id, self.tracker.current());
            return;
        }

        let (state, status) = if self.failed_tasks > 0 {
            (RunState::Failed, JobStatus::Failed)
        } else {
            (RunState::Completed, JobStatus::Complete)
        };
        info!("Job {}: flow finished, {}", self.context().id, state);
        self.log_line(format!("Job {}", status));
        self.finish(state, status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::{request_cancel, InMemoryCancelStore};
    use crate::models::{JobId, PlanId, ResultKey, StepId};
    use crate::task::NamedTask;
    use std::time::Duration;

    fn steps(n: u64) -> Vec<Step> {
        (0..n)
            .map(|i| Step {
                id: StepId(100 + i),
                plan_id: PlanId(1),
                path: format!("task_{}", i),
                name: format!("Task {}", i),
                step_num: i as u32,
            })
            .collect()
    }

    fn flow_with(store: Arc<InMemoryCancelStore>) -> JobFlowCallback {
        let steps = steps(3);
        let job = Job::new(JobId(7), PlanId(1), steps.iter().map(|s| s.id).collect(), None);
        JobFlowCallback::new(job, steps, store)
    }

    #[test]
    fn test_init_holds_job() {
        let flow = flow_with(Arc::new(InMemoryCancelStore::new()));
        assert_eq!(flow.context().id, JobId(7));
        assert_eq!(flow.state(), RunState::Idle);
    }

    #[test]
    fn test_untracked_task_is_ignored() {
        let mut flow = flow_with(Arc::new(InMemoryCancelStore::new()));
        let task = NamedTask::new("not_a_step");
        flow.post_task(&task, &TaskResult::default());
        flow.post_task_exception(Some(&task), &TaskError::new("nope"));
        assert!(flow.context().results.is_empty());
    }

    #[test]
    fn test_repeated_task_keeps_all_outcomes() {
        let mut flow = flow_with(Arc::new(InMemoryCancelStore::new()));
        let task = NamedTask::new("task_1");
        flow.post_task(&task, &TaskResult::default());
        flow.post_task_exception(Some(&task), &TaskError::new("retry failed"));

        let outcomes = &flow.context().results[&ResultKey::Step(StepId(101))];
        assert_eq!(outcomes, &vec![Outcome::ok(), Outcome::error("retry failed")]);
    }

    #[test]
    fn test_cancel_stops_before_task() {
        let store = Arc::new(InMemoryCancelStore::new());
        let mut flow = flow_with(Arc::clone(&store));
        request_cancel(store.as_ref(), JobId(7), Duration::from_secs(60));

        let control = flow.pre_task(&NamedTask::new("task_0"));
        assert_eq!(control, FlowControl::Abort);
        assert_eq!(flow.state(), RunState::Cancelled);
        assert_eq!(flow.context().status, JobStatus::Canceled);
        assert!(flow.context().results.is_empty());
        assert!(flow.context().log.contains("canceled before task task_0"));

        // Stays stopped
        assert!(flow.pre_task(&NamedTask::new("task_1")).is_abort());
    }

    #[test]
    fn test_post_flow_writes_log_once() {
        let mut flow = flow_with(Arc::new(InMemoryCancelStore::new()));
        let task = NamedTask::new("task_0");
        flow.pre_flow();
        assert!(!flow.pre_task(&task).is_abort());
        flow.post_task(&task, &TaskResult::default());

        assert!(flow.context().log.is_empty(), "log is buffered until post_flow");
        flow.post_flow();
        let log = flow.context().log.clone();
        assert!(log.contains("Running task task_0"));
        assert!(log.contains("Task task_0 completed"));
        assert_eq!(flow.context().status, JobStatus::Complete);

        flow.post_flow();
        assert_eq!(flow.context().log, log);
    }

    #[test]
    fn test_failed_task_fails_job() {
        let mut flow = flow_with(Arc::new(InMemoryCancelStore::new()));
        flow.post_task_exception(Some(&NamedTask::new("task_2")), &TaskError::new("boom"));
        flow.post_flow();
        assert_eq!(flow.state(), RunState::Failed);
        assert_eq!(flow.context().status, JobStatus::Failed);
    }

    #[test]
    fn test_log_limit_drops_oldest_lines() {
        let mut flow =
            flow_with(Arc::new(InMemoryCancelStore::new())).with_log_limit(2);
        for i in 0..3 {
            flow.pre_task(&NamedTask::new(format!("task_{}", i)));
        }
        flow.post_flow();

        let log = &flow.context().log;
        assert!(log.starts_with("[2 earlier line(s) dropped]"));
        assert!(!log.contains("task_0"));
        assert!(log.contains("Job complete"));
    }
}
