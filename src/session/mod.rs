//! Lifecycle management for interactive sessions.
//!
//! All three session kinds share one contract: start returns a live session
//! (or [`crate::Error::ContainerSelection`] when the target container is
//! ambiguous), and `stop` is idempotent: it is safe from any task, any
//! number of times, before or after natural termination, and always releases
//! the underlying I/O. Each session exclusively owns its local I/O handles;
//! teardown happens in exactly one place, the driver task's exit.

pub mod exec;
pub mod forward;
pub mod logs;

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub use exec::{ExecSession, INTERRUPT_BYTE};
pub use forward::{PortForwardSession, READY_TIMEOUT};
pub use logs::LogSession;

use crate::error::{Error, Result};
use crate::gateway::PodGateway;
use crate::models::{ClusterContext, PortMapping, SessionTarget, WorkloadKind};

/// Owns session startup against a registry of per-context pod gateways.
pub struct SessionManager<G> {
    gateways: HashMap<ClusterContext, Arc<G>>,
}

impl<G> SessionManager<G>
where
    G: PodGateway + 'static,
{
    pub fn new(gateways: HashMap<ClusterContext, Arc<G>>) -> Self {
        Self { gateways }
    }

    fn gateway(&self, context: &ClusterContext) -> Result<Arc<G>> {
        self.gateways
            .get(context)
            .cloned()
            .ok_or_else(|| Error::UnknownContext(context.clone()))
    }

    /// Deployments are not directly sessionable; the caller must resolve to
    /// one pod first. Checked before any gateway contact.
    fn require_pod(target: &SessionTarget) -> Result<()> {
        match target.kind {
            WorkloadKind::Pod => Ok(()),
            other => Err(Error::AmbiguousTarget(other)),
        }
    }

    /// Opens an interactive shell into one container of the target pod.
    ///
    /// When no container is given, a non-interactive probe resolves the
    /// target first; on a multi-container pod the probe surfaces
    /// [`Error::ContainerSelection`] with every candidate and no stream is
    /// opened. Retrying with a concrete container never re-raises.
    pub async fn start_exec(
        &self,
        target: &SessionTarget,
        container: Option<&str>,
    ) -> Result<ExecSession> {
        Self::require_pod(target)?;
        let gateway = self.gateway(&target.context)?;

        if container.is_none() {
            // Dry run: resolves the container without opening an
            // interactive stream.
            gateway
                .open_exec(&target.name, &target.namespace, None, true)
                .await?;
        }

        let stream = gateway
            .open_exec(&target.name, &target.namespace, container, false)
            .await?
            .ok_or_else(|| Error::Remote("gateway returned no exec stream".into()))?;

        log::debug!(
            "exec session started for {}/{} on {}",
            target.namespace,
            target.name,
            target.context
        );
        Ok(ExecSession::spawn(stream))
    }

    /// Opens a follow-mode log stream for one container of the target pod.
    /// Same container resolution rule as [`Self::start_exec`]; the gateway
    /// raises ambiguity before anything is consumed from the stream.
    pub async fn start_logs(
        &self,
        target: &SessionTarget,
        container: Option<&str>,
    ) -> Result<LogSession> {
        Self::require_pod(target)?;
        let gateway = self.gateway(&target.context)?;

        let reader = gateway
            .open_logs(&target.name, &target.namespace, container)
            .await?;

        log::debug!(
            "log session started for {}/{} on {}",
            target.namespace,
            target.name,
            target.context
        );
        Ok(LogSession::spawn(reader))
    }

    /// Issues a port-forward setup request and returns the session
    /// immediately. Callers must bound the readiness wait via
    /// [`PortForwardSession::wait_ready`]; on timeout the session tears
    /// itself down before the error surfaces.
    pub async fn start_port_forward(
        &self,
        target: &SessionTarget,
        ports: &[PortMapping],
    ) -> Result<PortForwardSession> {
        Self::require_pod(target)?;
        let gateway = self.gateway(&target.context)?;

        let cancel = CancellationToken::new();
        let handle = gateway
            .open_port_forward(&target.namespace, &target.name, ports, cancel.clone())
            .await?;

        log::debug!(
            "port forward requested for {}/{} on {} ({} mapping(s))",
            target.namespace,
            target.name,
            target.context,
            ports.len()
        );
        Ok(PortForwardSession::new(handle, cancel))
    }
}
