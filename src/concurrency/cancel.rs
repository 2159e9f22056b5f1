//! Cooperative cancellation shared by every worker of a join.
//!
//! Workers poll [`CancellationToken::is_cancelled`] at loop boundaries. When
//! blocked on a channel they also wait on [`CancellationToken::signal`], a
//! receiver that becomes ready (disconnected) once the token is cancelled.

use crate::error::{JoinError, JoinResult};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct Inner {
    cancelled: AtomicBool,
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

/// A cloneable handle to one shared cancellation flag.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(trigger)),
                signal,
            }),
        }
    }

    /// Cancel the token. Idempotent.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            // Dropping the only sender wakes every select! on the signal.
            self.inner.trigger.lock().take();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(JoinError::Cancelled)` once the token has been cancelled.
    pub fn check(&self) -> JoinResult<()> {
        if self.is_cancelled() {
            Err(JoinError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Receiver that is ready only after cancellation. Nothing is ever sent
    /// on it.
    pub fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Send `value`, blocking while the channel is full, unless the token is
/// cancelled first.
pub fn send_or_cancel<T>(
    tx: &Sender<T>,
    value: T,
    token: &CancellationToken,
    stage: &'static str,
) -> JoinResult<()> {
    select! {
        send(tx, value) -> res => res.map_err(|_| JoinError::ChannelClosed { stage }),
        recv(token.signal()) -> _ => Err(JoinError::Cancelled),
    }
}

/// Receive the next value, or `Ok(None)` once every sender has hung up.
pub fn recv_or_cancel<T>(rx: &Receiver<T>, token: &CancellationToken) -> JoinResult<Option<T>> {
    select! {
        recv(rx) -> msg => Ok(msg.ok()),
        recv(token.signal()) -> _ => Err(JoinError::Cancelled),
    }
}

/// Cancels the token if the owning thread unwinds.
pub struct CancelOnPanic<'a>(pub &'a CancellationToken);

impl Drop for CancelOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.cancel();
        }
    }
}
