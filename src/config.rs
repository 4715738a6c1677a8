//! Runtime configuration for flow runs.
//!
//! Loaded from a JSON file; every field has a default so a partial file (or
//! no file at all) is valid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{DeployError, Result};
use crate::flows::job::DEFAULT_LOG_LIMIT;

/// Upper bound for `cancel_ttl_secs` (30 days)
pub const MAX_CANCEL_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Settings shared by the coordinator and the job callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Lifetime of a job cancellation flag, in seconds
    pub cancel_ttl_secs: u64,
    /// Stop dispatching tasks after the first task error
    pub stop_on_error: bool,
    /// Maximum run-log lines buffered per job
    pub job_log_limit: usize,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            cancel_ttl_secs: 3600,
            stop_on_error: false,
            job_log_limit: DEFAULT_LOG_LIMIT,
        }
    }
}

impl DeployConfig {
    pub fn cancel_ttl(&self) -> Duration {
        Duration::from_secs(self.cancel_ttl_secs)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            DeployError::config(format!("Failed to read {:?}: {}", path.as_ref(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            DeployError::config(format!("Failed to parse {:?}: {}", path.as_ref(), e))
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.cancel_ttl_secs == 0 || self.cancel_ttl_secs > MAX_CANCEL_TTL_SECS {
            return Err(DeployError::config(format!(
                "cancel_ttl_secs must be between 1 and {}",
                MAX_CANCEL_TTL_SECS
            )));
        }
        if self.job_log_limit == 0 {
            return Err(DeployError::config("job_log_limit must be greater than zero"));
        }
        Ok(())
    }
}
