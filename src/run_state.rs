//! Run State Machine
//!
//! Tracks where a single flow run is in its lifecycle and rejects transitions
//! that make no sense (finishing a run twice, resuming a cancelled run).
//!
//! # State Flow
//!
//! ```text
//! Idle
//!   ↓
//! Running ──→ Cancelled
//!   ↓
//! Completed | Failed
//!
//! (Idle may also go straight to Cancelled, Completed or Failed:
//!  a run can be cancelled before its first task, or have no tasks at all)
//! ```

use std::fmt;
use thiserror::Error;

/// Lifecycle of one flow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// No task has been dispatched yet
    Idle,
    /// At least one task has been dispatched
    Running,
    /// The flow finished and every task succeeded (terminal)
    Completed,
    /// Stopped early by a cancellation request (terminal)
    Cancelled,
    /// The flow finished with at least one failed task (terminal)
    Failed,
}

impl RunState {
    /// Returns true for Completed, Cancelled and Failed
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Returns true if `self -> target` is an allowed transition
    pub const fn can_transition_to(self, target: Self) -> bool {
        match (self, target) {
            (Self::Idle, Self::Running) => true,
            (Self::Idle | Self::Running, Self::Completed | Self::Cancelled | Self::Failed) => true,
            _ => false,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Errors that can occur during run state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunStateError {
    /// The run already reached a terminal state
    #[error("Cannot transition from terminal state {from} to {to}")]
    FromTerminalState { from: RunState, to: RunState },

    /// Transition not in the state graph (e.g. back to Idle)
    #[error("Invalid run transition from {from} to {to}")]
    InvalidTransition { from: RunState, to: RunState },

    #[error("Run is already {state}")]
    AlreadyInState { state: RunState },
}

/// Owns the current state of a run and its transition history.
#[derive(Debug, Clone)]
pub struct RunTracker {
    current: RunState,
    /// Visited states with unix timestamps
    history: Vec<(RunState, u64)>,
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RunTracker {
    pub fn new() -> Self {
        Self {
            current: RunState::Idle,
            history: Vec::with_capacity(3),
        }
    }

    #[inline]
    pub fn current(&self) -> RunState {
        self.current
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn history(&self) -> &[(RunState, u64)] {
        &self.history
    }

    /// Move to `target`.
    ///
    /// # Errors
    ///
    /// - `AlreadyInState` if target is the current state
    /// - `FromTerminalState` if the run already finished
    /// - `InvalidTransition` for any move outside the state graph
    pub fn transition_to(&mut self, target: RunState) -> Result<RunState, RunStateError> {
        if target == self.current {
            return Err(RunStateError::AlreadyInState { state: target });
        }
        if self.current.is_terminal() {
            return Err(RunStateError::FromTerminalState {
                from: self.current,
                to: target,
            });
        }
        if !self.current.can_transition_to(target) {
            return Err(RunStateError::InvalidTransition {
                from: self.current,
                to: target,
            });
        }

        self.record(target);
        self.current = target;
        Ok(target)
    }

    /// Idle -> Running; a no-op when already running
    pub fn start(&mut self) -> Result<RunState, RunStateError> {
        if self.current == RunState::Running {
            return Ok(RunState::Running);
        }
        self.transition_to(RunState::Running)
    }

    fn record(&mut self, state: RunState) {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.history.push((state, timestamp));
    }
}
