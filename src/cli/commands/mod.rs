//! CLI command implementations
//!
//! The caches are synchronous; commands run them on tokio's blocking pool
//! through `run_blocking`, which also turns Ctrl-C into cancellation of the
//! shared `Deadline`.

pub mod artifacts;
pub mod config;
pub mod escape;
pub mod repo;
pub mod resolve;

pub use artifacts::execute as artifacts;
pub use config::execute as config;
pub use escape::execute as escape;
pub use repo::execute as repo;
pub use resolve::execute as resolve;

use crate::deadline::Deadline;
use crate::error::{MorphError, MorphResult};
use tracing::debug;

/// Run blocking cache work off the async runtime.
///
/// Ctrl-C cancels `deadline`; the work then stops at its next deadline
/// check and its (cancelled) result is returned.
pub async fn run_blocking<T, F>(deadline: Deadline, work: F) -> MorphResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Deadline) -> MorphResult<T> + Send + 'static,
{
    let worker_deadline = deadline.clone();
    let mut task = tokio::task::spawn_blocking(move || work(&worker_deadline));

    let joined = tokio::select! {
        joined = &mut task => joined,
        Ok(()) = tokio::signal::ctrl_c() => {
            debug!("Interrupted, cancelling");
            deadline.cancel();
            task.await
        }
    };

    joined.map_err(|e| MorphError::Internal(format!("worker task failed: {}", e)))?
}
