//! Preflight flow callback - aggregate step verdicts, classify once.
//!
//! Preflight tasks report verdicts for steps (`{path, status_code, msg?}`)
//! instead of succeeding or failing per step. The callback collects every
//! verdict over the run and classifies them at `post_flow`: only non-`ok`
//! verdicts are recorded, so a step missing from the results had no issue.
//! Failures that belong to no step are recorded under the `"plan"` key.

use super::{BasicFlowCallback, FlowCallback};
use crate::models::{record_outcome, Outcome, PreflightResult, PreflightStatus, ResultKey, Step};
use crate::store::{PlanCatalog, StoreError};
use crate::task::{StepReturnValue, TaskError, TaskIdentity, TaskResult};
use tracing::{debug, info, warn};

/// Drives a [`PreflightResult`] through the flow hooks.
pub struct PreflightFlowCallback {
    base: BasicFlowCallback<PreflightResult>,
    step_return_values: Vec<StepReturnValue>,
    finalized: bool,
}

impl PreflightFlowCallback {
    /// `plan_steps` must be every step of the preflight's plan.
    pub fn new(preflight: PreflightResult, plan_steps: Vec<Step>) -> Self {
        Self {
            base: BasicFlowCallback::new(preflight, plan_steps),
            step_return_values: Vec::new(),
            finalized: false,
        }
    }

    /// Build the callback with all of the plan's steps looked up in the catalog
    pub fn from_catalog(
        catalog: &PlanCatalog,
        preflight: PreflightResult,
    ) -> Result<Self, StoreError> {
        let steps = catalog.steps_for_plan(preflight.plan_id)?;
        Ok(Self::new(preflight, steps))
    }

    pub fn context(&self) -> &PreflightResult {
        self.base.context()
    }

    pub fn into_context(self) -> PreflightResult {
        self.base.into_context()
    }

    /// Verdicts collected so far
    pub fn step_return_values(&self) -> &[StepReturnValue] {
        &self.step_return_values
    }

    /// Add verdicts to the run aggregate
    pub fn collect_return_values(&mut self, values: impl IntoIterator<Item = StepReturnValue>) {
        self.step_return_values.extend(values);
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn classify(&mut self) {
        let preflight_id = self.context().id;
        for value in &self.step_return_values {
            if value.status_code.is_ok() {
                continue;
            }
            let Some(step_id) = self.base.resolve_step_id(&value.path) else {
                debug!("Preflight {}: no step for path {}", preflight_id, value.path);
                continue;
            };
            let outcome = Outcome::new(value.status_code, value.msg.clone().unwrap_or_default());
            debug!("Preflight {}: step {} -> {}", preflight_id, step_id, outcome.status);
            record_outcome(&mut self.base.context_mut().results, step_id, outcome);
        }
    }
}

impl FlowCallback for PreflightFlowCallback {
    fn pre_flow(&mut self) {
        let preflight = self.context();
        info!("Preflight {}: starting checks for plan {}", preflight.id, preflight.plan_id);
    }

    fn post_task(&mut self, task: &dyn TaskIdentity, result: &TaskResult) {
        debug!(
            "Preflight {}: task {} reported {} verdict(s)",
            self.context().id,
            task.identifying_path(),
            result.return_values.len()
        );
        self.collect_return_values(result.return_values.iter().cloned());
    }

    fn post_task_exception(&mut self, task: Option<&dyn TaskIdentity>, err: &TaskError) {
        let source = task.map(|t| t.identifying_path()).unwrap_or("flow");
        warn!("Preflight {}: {} failed: {}", self.context().id, source, err);
        let finalized = self.finalized;
        let preflight = self.base.context_mut();
        record_outcome(&mut preflight.results, ResultKey::Plan, Outcome::error(err.to_string()));
        if finalized {
            preflight.status = PreflightStatus::Failed;
        }
    }

    fn post_flow(&mut self) {
        if self.finalized {
            debug!("Preflight {}: results already classified", self.context().id);
            return;
        }
        self.classify();
        self.finalized = true;

        let run_failed = self.context().results.contains_key(&ResultKey::Plan);
        let preflight = self.base.context_mut();
        preflight.status = if run_failed {
            PreflightStatus::Failed
        } else {
            PreflightStatus::Complete
        };
        info!(
            "Preflight {}: {} with {} flagged step(s)",
            preflight.id,
            preflight.status,
            preflight.results.keys().filter(|k| **k != ResultKey::Plan).count()
        );
    }
}
