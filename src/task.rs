//! Task contracts between the executor and the flow callbacks.
//!
//! Callbacks never see what a task does. They only need to know which step a
//! task belongs to, which they learn from the task's identifying path, and
//! what it reported back.
//!
//! # Contract
//!
//! - `identifying_path()`: the task's path within the flow. It matches a
//!   step's `path` when the task is tracked as part of a plan.
//! - `run()`: executes the task. Failures are reported as `TaskError` and
//!   never panic across the executor boundary.

use crate::models::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a callback may know about a task.
pub trait TaskIdentity {
    /// Path used to map the task onto a plan step (e.g. "deploy_pre.update_dependencies")
    fn identifying_path(&self) -> &str;
}

/// A unit of work the coordinator can dispatch.
pub trait Task: TaskIdentity {
    fn run(&self) -> Result<TaskResult, TaskError>;
}

/// One step's verdict, reported by a task during a preflight run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReturnValue {
    /// Step path the verdict applies to
    pub path: String,
    pub status_code: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl StepReturnValue {
    pub fn new(path: impl Into<String>, status_code: StatusCode) -> Self {
        Self {
            path: path.into(),
            status_code,
            msg: None,
        }
    }

    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }
}

/// Result of a task that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Per-step verdicts; only preflight checks report these
    #[serde(default)]
    pub return_values: Vec<StepReturnValue>,
}

impl TaskResult {
    pub fn with_return_values(return_values: Vec<StepReturnValue>) -> Self {
        Self { return_values }
    }
}

/// Error raised by a task's execution. Displays as the bare message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TaskError {
    pub message: String,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Plain path-only task identity, for tasks known only by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedTask(pub String);

impl NamedTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl TaskIdentity for NamedTask {
    fn identifying_path(&self) -> &str {
        &self.0
    }
}
