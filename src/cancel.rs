//! Job cancellation signals
//!
//! A cancel request from outside the run (a user pressing "cancel", Ctrl-C in
//! the CLI) sets a flag keyed by job id. The job callback reads that flag
//! before every task and aborts the run when it is set. Flags carry an
//! explicit TTL so a stale request cannot cancel a later run forever.
//!
//! The store is shared between the running flow and whoever cancels it, so
//! implementations must be `Send + Sync`.

use crate::models::JobId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Key template for job cancellation flags (`{id}` is the job id)
pub const JOB_CANCEL_KEY: &str = "job-cancel:{id}";

/// Format the cancellation key for a job
pub fn job_cancel_key(id: JobId) -> String {
    JOB_CANCEL_KEY.replace("{id}", &id.to_string())
}

/// Key-value store for cancellation flags.
pub trait CancelStore: Send + Sync {
    /// Set the flag for `key`; it expires after `ttl`
    fn set_flag(&self, key: &str, ttl: Duration);

    /// Point-in-time read of the flag. Expired flags read as unset.
    fn is_flag_set(&self, key: &str) -> bool;

    /// Remove the flag for `key`, if any
    fn clear(&self, key: &str);
}

/// Ask a running job to stop at its next task boundary.
pub fn request_cancel(store: &dyn CancelStore, job_id: JobId, ttl: Duration) {
    let key = job_cancel_key(job_id);
    info!("Cancel requested for job {} ({}s TTL)", job_id, ttl.as_secs());
    store.set_flag(&key, ttl);
}

/// Returns true if a live cancellation flag exists for the job
pub fn is_cancel_requested(store: &dyn CancelStore, job_id: JobId) -> bool {
    store.is_flag_set(&job_cancel_key(job_id))
}

/// Process-local cancellation store with per-key expiry.
#[derive(Debug, Default)]
pub struct InMemoryCancelStore {
    /// Key -> expiry instant; `None` never expires
    flags: Mutex<HashMap<String, Option<Instant>>>,
}

fn is_live(expires_at: Option<Instant>, now: Instant) -> bool {
    expires_at.is_none_or(|at| now < at)
}

impl InMemoryCancelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of flags currently stored, expired ones included
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Option<Instant>>> {
        self.flags.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CancelStore for InMemoryCancelStore {
    fn set_flag(&self, key: &str, ttl: Duration) {
        let now = Instant::now();
        let mut flags = self.lock();

        let before = flags.len();
        flags.retain(|_, expires_at| is_live(*expires_at, now));
        if flags.len() < before {
            debug!("Swept {} expired cancel flag(s)", before - flags.len());
        }

        flags.insert(key.to_string(), now.checked_add(ttl));
        debug!("Set cancel flag {}", key);
    }

    fn is_flag_set(&self, key: &str) -> bool {
        let mut flags = self.lock();
        match flags.get(key) {
            Some(expires_at) if is_live(*expires_at, Instant::now()) => true,
            Some(_) => {
                flags.remove(key);
                debug!("Cancel flag {} expired", key);
                false
            }
            None => false,
        }
    }

    fn clear(&self, key: &str) {
        self.lock().remove(key);
    }
}
