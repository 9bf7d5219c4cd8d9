//! Selection recovery: resolve-then-retry around ambiguous session targets.
//!
//! Session starts can fail with a structured choice request instead of an
//! error: a deployment target must first collapse to one pod, and a
//! multi-container pod must collapse to one container. The coordinator
//! drives both choices through a caller-supplied prompt and re-invokes the
//! start with the concrete selection bound, so the retry can never hit the
//! same ambiguity again. Cancelling a prompt aborts cleanly with nothing
//! created and nothing held.

use std::sync::Arc;

use async_trait::async_trait;

use crate::aggregate::Aggregator;
use crate::error::{Error, Result};
use crate::gateway::{DeploymentGateway, PodGateway};
use crate::models::{Pod, PortMapping, SessionTarget, WorkloadKind};
use crate::session::{ExecSession, LogSession, PortForwardSession, SessionManager};

/// Terminal states of one recovery flow.
#[derive(Debug)]
pub enum RecoveryOutcome<S> {
    /// A session was started and handed to the caller.
    Started(S),
    /// The caller declined a choice; no session was created.
    Aborted,
}

impl<S> RecoveryOutcome<S> {
    pub fn started(self) -> Option<S> {
        match self {
            RecoveryOutcome::Started(session) => Some(session),
            RecoveryOutcome::Aborted => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, RecoveryOutcome::Aborted)
    }
}

/// Choice callbacks supplied by the presentation layer. Returning `None`
/// cancels the flow.
#[async_trait]
pub trait SelectionPrompt: Send + Sync {
    async fn choose_container(&self, candidates: &[String]) -> Option<String>;
    async fn choose_pod(&self, pods: &[Pod]) -> Option<Pod>;
}

/// Drives the resolve-then-retry protocol over a session manager and the
/// deployment aggregator (for owned-pod resolution). Dependencies are
/// injected; the coordinator holds no other state.
pub struct RecoveryCoordinator<P, D> {
    sessions: Arc<SessionManager<P>>,
    deployments: Arc<Aggregator<D>>,
}

impl<P, D> RecoveryCoordinator<P, D>
where
    P: PodGateway + 'static,
    D: DeploymentGateway + 'static,
{
    pub fn new(sessions: Arc<SessionManager<P>>, deployments: Arc<Aggregator<D>>) -> Self {
        Self {
            sessions,
            deployments,
        }
    }

    /// Collapses the target to a single pod. Deployment targets resolve via
    /// the label selector: auto-selected when exactly one pod exists,
    /// otherwise presented as a pod-selection choice. `Ok(None)` means the
    /// caller cancelled.
    async fn resolve_pod(
        &self,
        target: &SessionTarget,
        prompt: &dyn SelectionPrompt,
    ) -> Result<Option<SessionTarget>> {
        if target.kind == WorkloadKind::Pod {
            return Ok(Some(target.clone()));
        }

        let pods = self
            .deployments
            .fetch_pods(&target.name, &target.namespace, &target.context)
            .await?;
        match pods.len() {
            0 => Err(Error::not_found(
                WorkloadKind::Pod,
                &target.namespace,
                &target.name,
            )),
            1 => {
                log::debug!(
                    "deployment {} resolved to its single pod {}",
                    target.name,
                    pods[0].name
                );
                Ok(Some(pods[0].target()))
            }
            _ => Ok(prompt.choose_pod(&pods).await.map(|pod| pod.target())),
        }
    }

    /// Starts an exec session, recovering from container ambiguity through
    /// the prompt.
    pub async fn start_exec(
        &self,
        target: &SessionTarget,
        prompt: &dyn SelectionPrompt,
    ) -> Result<RecoveryOutcome<ExecSession>> {
        let Some(pod) = self.resolve_pod(target, prompt).await? else {
            return Ok(RecoveryOutcome::Aborted);
        };

        log::debug!("probing exec target {}/{}", pod.namespace, pod.name);
        match self.sessions.start_exec(&pod, None).await {
            Ok(session) => Ok(RecoveryOutcome::Started(session)),
            Err(Error::ContainerSelection(candidates)) => {
                log::debug!("container ambiguity on {}: {candidates:?}", pod.name);
                let Some(container) = prompt.choose_container(&candidates).await else {
                    return Ok(RecoveryOutcome::Aborted);
                };
                // A concrete container is bound now; this cannot re-raise.
                let session = self.sessions.start_exec(&pod, Some(&container)).await?;
                Ok(RecoveryOutcome::Started(session))
            }
            Err(other) => Err(other),
        }
    }

    /// Starts a log session, recovering from container ambiguity through
    /// the prompt.
    pub async fn start_logs(
        &self,
        target: &SessionTarget,
        prompt: &dyn SelectionPrompt,
    ) -> Result<RecoveryOutcome<LogSession>> {
        let Some(pod) = self.resolve_pod(target, prompt).await? else {
            return Ok(RecoveryOutcome::Aborted);
        };

        match self.sessions.start_logs(&pod, None).await {
            Ok(session) => Ok(RecoveryOutcome::Started(session)),
            Err(Error::ContainerSelection(candidates)) => {
                log::debug!("container ambiguity on {}: {candidates:?}", pod.name);
                let Some(container) = prompt.choose_container(&candidates).await else {
                    return Ok(RecoveryOutcome::Aborted);
                };
                let session = self.sessions.start_logs(&pod, Some(&container)).await?;
                Ok(RecoveryOutcome::Started(session))
            }
            Err(other) => Err(other),
        }
    }

    /// Starts a port forward. Only the pod-selection step applies here; the
    /// tunnel is not container-scoped.
    pub async fn start_port_forward(
        &self,
        target: &SessionTarget,
        ports: &[PortMapping],
        prompt: &dyn SelectionPrompt,
    ) -> Result<RecoveryOutcome<PortForwardSession>> {
        let Some(pod) = self.resolve_pod(target, prompt).await? else {
            return Ok(RecoveryOutcome::Aborted);
        };

        let session = self.sessions.start_port_forward(&pod, ports).await?;
        Ok(RecoveryOutcome::Started(session))
    }
}
