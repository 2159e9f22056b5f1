//! Named scoped worker threads with fail-fast error collection.

use crate::concurrency::{CancelOnPanic, CancellationToken};
use crate::error::{JoinError, JoinResult};
use log::{debug, error};
use std::thread::{self, Scope, ScopedJoinHandle};

/// Keep the most informative error seen so far. An error caused by
/// cancellation never replaces the failure that triggered it.
pub fn record_error(slot: &mut Option<JoinError>, err: JoinError) {
    let keep = matches!(slot.as_ref(), Some(existing) if !existing.is_secondary() || err.is_secondary());
    if !keep {
        *slot = Some(err);
    }
}

/// A set of workers of one stage, all producing `T`.
///
/// A failing worker cancels the shared token so its siblings stop at their
/// next loop boundary.
pub struct WorkerGroup<'scope, T> {
    handles: Vec<(String, ScopedJoinHandle<'scope, JoinResult<T>>)>,
    spawn_error: Option<JoinError>,
}

impl<'scope, T: Send + 'scope> WorkerGroup<'scope, T> {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
            spawn_error: None,
        }
    }

    pub fn spawn<'env, F>(
        &mut self,
        scope: &'scope Scope<'scope, 'env>,
        name: String,
        token: &'scope CancellationToken,
        work: F,
    ) where
        F: FnOnce() -> JoinResult<T> + Send + 'scope,
    {
        if self.spawn_error.is_some() {
            return;
        }

        let worker = name.clone();
        let spawned = thread::Builder::new()
            .name(name.clone())
            .spawn_scoped(scope, move || {
                let _guard = CancelOnPanic(token);
                let result = work();
                match &result {
                    Ok(_) => debug!("{} finished", worker),
                    Err(e) if e.is_secondary() => debug!("{} stopped: {}", worker, e),
                    Err(e) => error!("{} failed: {}", worker, e),
                }
                if result.is_err() {
                    token.cancel();
                }
                result
            });

        match spawned {
            Ok(handle) => self.handles.push((name, handle)),
            Err(e) => {
                token.cancel();
                self.spawn_error = Some(JoinError::Spawn(e));
            }
        }
    }

    /// Wait for every worker. Returns the successful results in spawn order
    /// and the most informative error, if any.
    pub fn join(self) -> (Vec<T>, Option<JoinError>) {
        let mut results = Vec::with_capacity(self.handles.len());
        let mut failure = self.spawn_error;

        for (name, handle) in self.handles {
            match handle.join() {
                Ok(Ok(value)) => results.push(value),
                Ok(Err(e)) => record_error(&mut failure, e),
                Err(_) => record_error(&mut failure, JoinError::WorkerPanicked { worker: name }),
            }
        }
        (results, failure)
    }
}
