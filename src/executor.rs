//! Flow coordinator - runs tasks in order and drives a flow callback.
//!
//! This is the executor side of the callback contract: it owns dispatch, the
//! callback owns bookkeeping. Tasks run one at a time on the calling thread.

use crate::flows::FlowCallback;
use crate::task::{Task, TaskIdentity};
use std::fmt;
use tracing::{info, warn};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every task was dispatched
    Completed,
    /// The callback aborted the run before a task (cancellation)
    Cancelled,
    /// A task failed and `stop_on_error` halted dispatch
    Stopped,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Stopped => write!(f, "stopped after task failure"),
        }
    }
}

/// Counters for a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub tasks_run: usize,
    pub tasks_failed: usize,
}

/// Sequential executor.
#[derive(Debug, Clone, Default)]
pub struct FlowCoordinator {
    stop_on_error: bool,
}

impl FlowCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop dispatching after the first task error (the error is still reported)
    pub fn stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    /// Run `tasks` in order, reporting every lifecycle event to `callback`.
    ///
    /// `post_flow` is called when the run ends normally or is stopped by a
    /// task error; it is skipped when the callback aborts the run.
    pub fn run(&self, tasks: &[Box<dyn Task>], callback: &mut dyn FlowCallback) -> RunSummary {
        let mut summary = RunSummary {
            outcome: RunOutcome::Completed,
            tasks_run: 0,
            tasks_failed: 0,
        };

        callback.pre_flow();

        for task in tasks {
            let task: &dyn Task = task.as_ref();
            let identity: &dyn TaskIdentity = task;
            if callback.pre_task(identity).is_abort() {
                info!("Run aborted before task {}", task.identifying_path());
                summary.outcome = RunOutcome::Cancelled;
                return summary;
            }

            summary.tasks_run += 1;
            match task.run() {
                Ok(result) => callback.post_task(identity, &result),
                Err(err) => {
                    summary.tasks_failed += 1;
                    warn!("Task {} failed: {}", task.identifying_path(), err);
                    callback.post_task_exception(Some(identity), &err);
                    if self.stop_on_error {
                        summary.outcome = RunOutcome::Stopped;
                        break;
                    }
                }
            }
        }

        callback.post_flow();
        info!(
            "Run {}: {} task(s) run, {} failed",
            summary.outcome, summary.tasks_run, summary.tasks_failed
        );
        summary
    }
}
