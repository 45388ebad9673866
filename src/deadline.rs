//! Caller-supplied deadline and cancellation for blocking cache work
//!
//! Network fetches and git subprocesses are the steps that can block without
//! bound, so each of them takes a `&Deadline` and checks it between chunks
//! of work. Clones of a `Deadline` share one cancellation flag, which lets
//! another thread (e.g. a Ctrl-C handler) stop work in progress.

use crate::error::{MorphError, MorphResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Point in time after which blocking work is abandoned, plus a shared
/// cancellation flag
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    at: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl Deadline {
    /// A deadline that never expires (it can still be cancelled)
    pub fn never() -> Self {
        Self::default()
    }

    /// A deadline `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `after(timeout)` for a non-zero timeout, `never()` otherwise
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            Self::never()
        } else {
            Self::after(Duration::from_secs(secs))
        }
    }

    /// Cancel this deadline and every clone of it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether `cancel` has been called on this deadline or a clone
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Time left before expiry; `None` if there is no expiry
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has passed
    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }

    /// Fail if the work described by `activity` must stop now
    pub fn check(&self, activity: &str) -> MorphResult<()> {
        if self.is_cancelled() {
            return Err(MorphError::Cancelled(activity.to_string()));
        }
        if self.is_expired() {
            return Err(MorphError::DeadlineExceeded(activity.to_string()));
        }
        Ok(())
    }
}
