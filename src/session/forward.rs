//! Port-forward session: local tunnel into one pod port.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::gateway::ForwardHandle;

/// Bounded window a caller waits for the tunnel to become usable.
pub const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// A port-forward tunnel in flight.
///
/// Setup is asynchronous: the session exists as soon as the request is
/// issued, and [`Self::wait_ready`] races the gateway's ready signal against
/// the clock. On timeout the losing forwarder is stopped, not leaked, before
/// the error surfaces. Status text the tunnel produces accumulates in
/// buffers independent of the bytes it carries.
#[derive(Debug)]
pub struct PortForwardSession {
    ready: Option<oneshot::Receiver<()>>,
    output: Arc<Mutex<String>>,
    errors: Arc<Mutex<String>>,
    cancel: CancellationToken,
}

impl PortForwardSession {
    pub(crate) fn new(handle: ForwardHandle, cancel: CancellationToken) -> Self {
        Self {
            ready: Some(handle.ready),
            output: handle.output,
            errors: handle.errors,
            cancel,
        }
    }

    /// Waits for the ready signal with the default window.
    pub async fn wait_ready(&mut self) -> Result<()> {
        self.wait_ready_for(READY_TIMEOUT).await
    }

    /// Waits for the ready signal, at most `window`. Whichever of the signal
    /// and the timer resolves first decides the outcome; on timeout (or when
    /// the forwarder died before signalling) the session is torn down before
    /// the error is returned. Subsequent calls after a successful wait are
    /// no-ops; once the session is stopped, every call reports it closed.
    pub async fn wait_ready_for(&mut self, window: Duration) -> Result<()> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        let Some(ready) = self.ready.take() else {
            return Ok(());
        };
        match tokio::time::timeout(window, ready).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => {
                self.stop();
                Err(Error::SessionClosed)
            }
            Err(_) => {
                log::warn!("port forward not ready after {window:?}, stopping");
                self.stop();
                Err(Error::ForwardTimeout(window))
            }
        }
    }

    /// Status text produced while the tunnel runs.
    pub async fn output(&self) -> String {
        self.output.lock().await.clone()
    }

    /// Error text produced while the tunnel runs.
    pub async fn errors(&self) -> String {
        self.errors.lock().await.clone()
    }

    /// Stops the tunnel. Idempotent and safe from any task; the gateway's
    /// forwarding loop exits on the shared cancel token.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for PortForwardSession {
    fn drop(&mut self) {
        // A dropped session must not leave a forwarding task running.
        self.cancel.cancel();
    }
}
