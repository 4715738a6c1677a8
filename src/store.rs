//! In-memory plan catalog
//!
//! Holds plans and their steps and hands out jobs and preflight results bound
//! to them. Mirrors the relational constraints of the persisted schema:
//!
//! - A step's plan reference is mandatory (unknown plans are rejected)
//! - Step paths are unique within a plan
//! - Deleting a plan is refused while any step still references it
//!   (protect, never cascade)

use crate::models::{
    Job, JobId, Plan, PlanId, PreflightId, PreflightResult, Step, StepId, UserId,
};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Errors raised by the plan catalog
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Plan {0} not found")]
    PlanNotFound(PlanId),

    #[error("Step {0} not found")]
    StepNotFound(StepId),

    /// Plan still owns steps; delete them first
    #[error("Cannot delete plan {plan}: referenced by {steps} step(s)")]
    Protected { plan: PlanId, steps: usize },

    #[error("Plan {plan} already has a step with path '{path}'")]
    DuplicatePath { plan: PlanId, path: String },

    #[error("Step {step} does not belong to plan {plan}")]
    ForeignStep { plan: PlanId, step: StepId },
}

impl From<StoreError> for crate::error::DeployError {
    fn from(err: StoreError) -> Self {
        crate::error::DeployError::Store(err.to_string())
    }
}

/// Plans, steps and id sequences.
#[derive(Debug, Default)]
pub struct PlanCatalog {
    plans: BTreeMap<PlanId, Plan>,
    steps: BTreeMap<StepId, Step>,
    next_id: u64,
}

impl PlanCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Create an empty plan
    pub fn create_plan(&mut self, title: impl Into<String>) -> Plan {
        let plan = Plan {
            id: PlanId(self.allocate()),
            title: title.into(),
        };
        debug!("Created plan {} '{}'", plan.id, plan.title);
        self.plans.insert(plan.id, plan.clone());
        plan
    }

    pub fn plan(&self, id: PlanId) -> Result<&Plan, StoreError> {
        self.plans.get(&id).ok_or(StoreError::PlanNotFound(id))
    }

    /// Add a step to a plan. The step is ordered after the plan's existing steps.
    pub fn add_step(
        &mut self,
        plan_id: PlanId,
        path: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Step, StoreError> {
        self.plan(plan_id)?;
        let path = path.into();

        let existing = self.steps.values().filter(|s| s.plan_id == plan_id);
        let mut step_num = 0;
        for step in existing {
            if step.path == path {
                return Err(StoreError::DuplicatePath {
                    plan: plan_id,
                    path,
                });
            }
            step_num = step_num.max(step.step_num + 1);
        }

        let step = Step {
            id: StepId(self.allocate()),
            plan_id,
            path,
            name: name.into(),
            step_num,
        };
        debug!("Added step {} '{}' to plan {}", step.id, step.path, plan_id);
        self.steps.insert(step.id, step.clone());
        Ok(step)
    }

    pub fn step(&self, id: StepId) -> Result<&Step, StoreError> {
        self.steps.get(&id).ok_or(StoreError::StepNotFound(id))
    }

    /// All steps of a plan ordered by `step_num`
    pub fn steps_for_plan(&self, plan_id: PlanId) -> Result<Vec<Step>, StoreError> {
        self.plan(plan_id)?;
        let mut steps: Vec<Step> = self
            .steps
            .values()
            .filter(|s| s.plan_id == plan_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.step_num);
        Ok(steps)
    }

    /// Resolve step ids to records, keeping the given order
    pub fn steps_by_ids(&self, ids: &[StepId]) -> Result<Vec<Step>, StoreError> {
        ids.iter().map(|id| self.step(*id).cloned()).collect()
    }

    pub fn delete_step(&mut self, id: StepId) -> Result<Step, StoreError> {
        self.steps.remove(&id).ok_or(StoreError::StepNotFound(id))
    }

    /// Delete a plan. Fails while any step still references it.
    pub fn delete_plan(&mut self, id: PlanId) -> Result<Plan, StoreError> {
        self.plan(id)?;
        let referencing = self.steps.values().filter(|s| s.plan_id == id).count();
        if referencing > 0 {
            return Err(StoreError::Protected {
                plan: id,
                steps: referencing,
            });
        }
        self.plans.remove(&id).ok_or(StoreError::PlanNotFound(id))
    }

    /// Create a job for a subset of a plan's steps
    pub fn create_job(
        &mut self,
        plan_id: PlanId,
        step_ids: Vec<StepId>,
        user: Option<UserId>,
    ) -> Result<Job, StoreError> {
        self.plan(plan_id)?;
        for id in &step_ids {
            let step = self.step(*id)?;
            if step.plan_id != plan_id {
                return Err(StoreError::ForeignStep {
                    plan: plan_id,
                    step: *id,
                });
            }
        }
        Ok(Job::new(JobId(self.allocate()), plan_id, step_ids, user))
    }

    /// Create a preflight result covering every step of a plan
    pub fn create_preflight(
        &mut self,
        plan_id: PlanId,
        user: Option<UserId>,
    ) -> Result<PreflightResult, StoreError> {
        self.plan(plan_id)?;
        Ok(PreflightResult::new(
            PreflightId(self.allocate()),
            plan_id,
            user,
        ))
    }
}
