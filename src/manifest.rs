//! Plan Manifests
//!
//! A manifest describes a plan and a scripted run against it, so a flow can
//! be exercised end to end without a real task engine.
//!
//! # Manifest Format
//!
//! ```json
//! {
//!   "plan": "Starter package",
//!   "steps": [
//!     { "path": "deploy_pre", "name": "Pre-install" },
//!     { "path": "deploy", "name": "Install package" }
//!   ],
//!   "selected_steps": ["deploy"],
//!   "tasks": [
//!     { "name": "deploy_pre", "outcome": { "result": "ok" } },
//!     { "name": "deploy", "outcome": { "result": "error", "message": "Org is locked" } }
//!   ],
//!   "preflight_tasks": [
//!     { "name": "get_preflight", "outcome": { "result": "ok", "return_values": [
//!       { "path": "deploy", "status_code": "warn", "msg": "Missing licenses" }
//!     ] } }
//!   ]
//! }
//! ```
//!
//! `selected_steps` defaults to every step of the plan.

use crate::models::{Plan, Step, StepId};
use crate::store::{PlanCatalog, StoreError};
use crate::task::{StepReturnValue, Task, TaskError, TaskIdentity, TaskResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading or validating a manifest
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("Invalid manifest format: {reason}")]
    InvalidFormat { reason: String },

    #[error("Plan '{plan}' has no steps")]
    EmptyPlan { plan: String },

    #[error("Duplicate step path '{path}'")]
    DuplicatePath { path: String },

    #[error("Selected step '{path}' is not part of the plan")]
    UnknownSelectedStep { path: String },

    #[error("Failed to read manifest: {reason}")]
    IoError { reason: String },

    #[error("Catalog rejected manifest: {0}")]
    Store(#[from] StoreError),
}

impl From<std::io::Error> for ManifestError {
    fn from(err: std::io::Error) -> Self {
        ManifestError::IoError {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ManifestError {
    fn from(err: serde_json::Error) -> Self {
        ManifestError::InvalidFormat {
            reason: err.to_string(),
        }
    }
}

impl From<ManifestError> for crate::error::DeployError {
    fn from(err: ManifestError) -> Self {
        crate::error::DeployError::Manifest(err.to_string())
    }
}

/// Step declaration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepSpec {
    pub path: String,
    pub name: String,
}

/// Scripted result of a task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum ScriptedOutcome {
    Ok {
        #[serde(default)]
        return_values: Vec<StepReturnValue>,
    },
    Error {
        message: String,
    },
}

/// A task whose outcome is fixed by the manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScriptedTask {
    pub name: String,
    pub outcome: ScriptedOutcome,
}

impl TaskIdentity for ScriptedTask {
    fn identifying_path(&self) -> &str {
        &self.name
    }
}

impl Task for ScriptedTask {
    fn run(&self) -> Result<TaskResult, TaskError> {
        match &self.outcome {
            ScriptedOutcome::Ok { return_values } => {
                Ok(TaskResult::with_return_values(return_values.clone()))
            }
            ScriptedOutcome::Error { message } => Err(TaskError::new(message.clone())),
        }
    }
}

/// Plan plus scripted job and preflight runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanManifest {
    pub plan: String,
    pub steps: Vec<StepSpec>,
    #[serde(default)]
    pub selected_steps: Option<Vec<String>>,
    #[serde(default)]
    pub tasks: Vec<ScriptedTask>,
    #[serde(default)]
    pub preflight_tasks: Vec<ScriptedTask>,
}

/// A manifest's plan after registration in a catalog
#[derive(Debug, Clone)]
pub struct LoadedPlan {
    pub plan: Plan,
    /// All plan steps, in order
    pub steps: Vec<Step>,
    /// Steps the job should run, in plan order
    pub selected: Vec<StepId>,
}

impl PlanManifest {
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.steps.is_empty() {
            return Err(ManifestError::EmptyPlan {
                plan: self.plan.clone(),
            });
        }

        let mut paths = HashSet::new();
        for step in &self.steps {
            if !paths.insert(step.path.as_str()) {
                return Err(ManifestError::DuplicatePath {
                    path: step.path.clone(),
                });
            }
        }

        if let Some(selected) = &self.selected_steps {
            if let Some(unknown) = selected.iter().find(|p| !paths.contains(p.as_str())) {
                return Err(ManifestError::UnknownSelectedStep {
                    path: unknown.clone(),
                });
            }
        }

        Ok(())
    }

    /// Validate, then register the plan and its steps in `catalog`
    pub fn register(&self, catalog: &mut PlanCatalog) -> Result<LoadedPlan, ManifestError> {
        self.validate()?;

        let plan = catalog.create_plan(&self.plan);
        let mut steps = Vec::with_capacity(self.steps.len());
        for spec in &self.steps {
            steps.push(catalog.add_step(plan.id, &spec.path, &spec.name)?);
        }

        let selected = match &self.selected_steps {
            Some(paths) => steps
                .iter()
                .filter(|s| paths.contains(&s.path))
                .map(|s| s.id)
                .collect(),
            None => steps.iter().map(|s| s.id).collect(),
        };

        Ok(LoadedPlan {
            plan,
            steps,
            selected,
        })
    }

    pub fn job_tasks(&self) -> Vec<Box<dyn Task>> {
        boxed(&self.tasks)
    }

    pub fn preflight_tasks(&self) -> Vec<Box<dyn Task>> {
        boxed(&self.preflight_tasks)
    }
}

fn boxed(tasks: &[ScriptedTask]) -> Vec<Box<dyn Task>> {
    tasks
        .iter()
        .cloned()
        .map(|t| Box::new(t) as Box<dyn Task>)
        .collect()
}
