//! Domain records for plans, steps, jobs and preflight results
//!
//! These are the records the flow callbacks read and mutate. Identifiers are
//! newtypes so a step id can never be handed where a plan id is expected.
//! Result maps are insertion-ordered: keys appear in the order outcomes were
//! first recorded for them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a [`Step`]
    StepId
);
id_type!(
    /// Identifier of a [`Plan`]
    PlanId
);
id_type!(
    /// Identifier of a [`Job`]
    JobId
);
id_type!(
    /// Identifier of a [`PreflightResult`]
    PreflightId
);
id_type!(
    /// Identifier of a user account
    UserId
);

// ============================================================================
// Outcomes
// ============================================================================

/// Status of a single outcome record.
///
/// `Ok` is what a successful job task records. Preflight checks never persist
/// `Ok`: the absence of an entry is how a preflight says "no issue".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StatusCode {
    Ok,
    Error,
    Warn,
    Optional,
    Skip,
}

impl StatusCode {
    /// Returns true for the one status that preflight classification drops
    #[inline]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// One task's result against one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: StatusCode,
    pub message: String,
}

impl Outcome {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Success record with an empty message
    pub fn ok() -> Self {
        Self::new(StatusCode::Ok, "")
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Error, message)
    }
}

/// Key of a results map: a step, or the whole plan for run-level failures.
///
/// Serialized as a plain string so a results map becomes a JSON object:
/// `Step(StepId(42))` is `"42"` and `Plan` is `"plan"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ResultKey {
    Step(StepId),
    Plan,
}

/// Literal key used for failures not attributable to a single step
pub const PLAN_RESULT_KEY: &str = "plan";

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step(id) => write!(f, "{}", id),
            Self::Plan => f.write_str(PLAN_RESULT_KEY),
        }
    }
}

impl FromStr for ResultKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == PLAN_RESULT_KEY {
            return Ok(Self::Plan);
        }
        s.parse::<u64>()
            .map(|id| Self::Step(StepId(id)))
            .map_err(|_| format!("invalid result key '{}'", s))
    }
}

impl From<ResultKey> for String {
    fn from(key: ResultKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for ResultKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StepId> for ResultKey {
    fn from(id: StepId) -> Self {
        Self::Step(id)
    }
}

/// Ordered outcome sequences keyed by step (or plan)
pub type Results = IndexMap<ResultKey, Vec<Outcome>>;

/// Append an outcome, creating the key's sequence if it is absent
pub fn record_outcome(results: &mut Results, key: impl Into<ResultKey>, outcome: Outcome) {
    results.entry(key.into()).or_default().push(outcome);
}

// ============================================================================
// Plans and steps
// ============================================================================

/// An ordered template of steps describing an installable package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub title: String,
}

/// One unit of work within a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    /// Owning plan; never null, and the plan cannot be deleted while this exists
    pub plan_id: PlanId,
    /// Task path, unique within the plan
    pub path: String,
    pub name: String,
    pub step_num: u32,
}

// ============================================================================
// Jobs and preflight results
// ============================================================================

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Started,
    Complete,
    Failed,
    Canceled,
}

/// A live execution of a plan's steps against a target org.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub plan_id: PlanId,
    /// Steps selected for this run, in execution order
    pub steps: Vec<StepId>,
    pub user: Option<UserId>,
    pub status: JobStatus,
    pub results: Results,
    /// Run log, written once the flow finishes
    pub log: String,
}

impl Job {
    pub fn new(id: JobId, plan_id: PlanId, steps: Vec<StepId>, user: Option<UserId>) -> Self {
        Self {
            id,
            plan_id,
            steps,
            user,
            status: JobStatus::Started,
            results: Results::new(),
            log: String::new(),
        }
    }
}

/// Lifecycle status of a preflight check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PreflightStatus {
    #[default]
    Started,
    Complete,
    Failed,
}

/// A dry-run validation pass over every step of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreflightResult {
    pub id: PreflightId,
    pub plan_id: PlanId,
    pub user: Option<UserId>,
    pub status: PreflightStatus,
    pub results: Results,
}

impl PreflightResult {
    pub fn new(id: PreflightId, plan_id: PlanId, user: Option<UserId>) -> Self {
        Self {
            id,
            plan_id,
            user,
            status: PreflightStatus::Started,
            results: Results::new(),
        }
    }

    /// Returns true if any recorded outcome is an error
    pub fn has_errors(&self) -> bool {
        self.results
            .values()
            .flatten()
            .any(|o| o.status == StatusCode::Error)
    }
}
