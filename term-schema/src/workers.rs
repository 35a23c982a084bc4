//! Worker pool plumbing shared by the pipeline stages.
//!
//! Every pool follows the same shape: workers pull from one bounded queue
//! shared behind a mutex, each worker owns a clone of the output sender, and
//! the supervisor drops its own sender before joining. The output queue
//! therefore closes exactly when the last worker returns.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{error, warn};

use crate::error::{ProfileError, ProfileResult};

/// A bounded receiver that several workers consume from.
#[derive(Debug)]
pub struct SharedReceiver<T> {
    inner: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedReceiver<T> {
    pub fn new(rx: mpsc::Receiver<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(rx)),
        }
    }

    /// Receives the next item, or `None` once the queue is closed and
    /// drained.
    pub async fn recv(&self) -> Option<T> {
        self.inner.lock().await.recv().await
    }
}

/// Waits for every task in `set`.
///
/// The first failure aborts the remaining tasks and is returned; results of
/// tasks that finished before it are discarded.
pub async fn join_all<T: 'static>(
    mut set: JoinSet<ProfileResult<T>>,
    stage: &'static str,
) -> ProfileResult<Vec<T>> {
    let mut outputs = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        let result = match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => {
                warn!(stage, "Worker task was cancelled");
                Err(ProfileError::from(e))
            }
            Err(e) => {
                error!(stage, error = %e, "Worker task panicked");
                Err(ProfileError::from(e))
            }
        };
        match result {
            Ok(output) => outputs.push(output),
            Err(e) => {
                error!(stage, error = %e, "Worker failed, aborting stage");
                set.abort_all();
                while set.join_next().await.is_some() {}
                return Err(e);
            }
        }
    }
    Ok(outputs)
}
