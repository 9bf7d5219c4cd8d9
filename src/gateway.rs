//! Per-context, per-kind cluster gateway contract.
//!
//! One gateway instance talks to one resource kind on one cluster. The
//! aggregation and session layers only ever see these traits; the kube-rs
//! implementations live in [`crate::k8s`], and tests substitute mocks.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{Deployment, Pod, PortMapping};

/// Duplex byte stream carrying an interactive remote shell.
pub trait DuplexStream: AsyncRead + AsyncWrite + Send {}
impl<T: AsyncRead + AsyncWrite + Send> DuplexStream for T {}

pub type ExecStream = Pin<Box<dyn DuplexStream>>;

/// Follow-mode byte stream of container log output.
pub type LogReader = Pin<Box<dyn AsyncRead + Send>>;

/// Handles returned by a port-forward setup request. The tunnel itself runs
/// in the gateway until the cancel token fires; `ready` resolves once the
/// tunnel is actually usable. Status text accumulates in `output`/`errors`
/// independent of the bytes the tunnel carries.
pub struct ForwardHandle {
    pub ready: oneshot::Receiver<()>,
    pub output: Arc<Mutex<String>>,
    pub errors: Arc<Mutex<String>>,
}

/// Read operations common to every resource kind.
#[async_trait]
pub trait ResourceGateway: Send + Sync {
    type Resource: Send + 'static;

    /// Lists the kind in one namespace; the empty namespace means
    /// cluster-wide scope.
    async fn list_all(&self, namespace: &str) -> Result<Vec<Self::Resource>>;

    async fn get_by_name(&self, namespace: &str, name: &str) -> Result<Self::Resource>;

    /// Serialized resource definition with internal bookkeeping fields
    /// stripped.
    async fn manifest(&self, namespace: &str, name: &str) -> Result<Vec<u8>>;
}

/// Pod gateway: listing plus the streaming sub-resources.
#[async_trait]
pub trait PodGateway: ResourceGateway<Resource = Pod> {
    async fn list_by_labels(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Pod>>;

    /// Opens an interactive shell stream into one container.
    ///
    /// With `probe_only` the call resolves the target container and returns
    /// `Ok(None)` without opening any interactive stream. In either mode an
    /// empty `container` on a multi-container pod fails with
    /// [`crate::Error::ContainerSelection`] carrying every candidate name,
    /// with no side effects.
    async fn open_exec(
        &self,
        pod: &str,
        namespace: &str,
        container: Option<&str>,
        probe_only: bool,
    ) -> Result<Option<ExecStream>>;

    /// Opens a follow-mode log stream for one container. Same container
    /// resolution rule as [`Self::open_exec`]; the stream is not opened (and
    /// nothing is consumed from it) until a concrete container is known.
    async fn open_logs(
        &self,
        pod: &str,
        namespace: &str,
        container: Option<&str>,
    ) -> Result<LogReader>;

    /// Issues a port-forward setup request and returns immediately. The
    /// forwarding loop keeps running until `cancel` fires; cancelling is the
    /// only way to stop it.
    async fn open_port_forward(
        &self,
        namespace: &str,
        pod: &str,
        ports: &[PortMapping],
        cancel: CancellationToken,
    ) -> Result<ForwardHandle>;
}

/// Deployment gateway: listing plus owned-pod resolution.
#[async_trait]
pub trait DeploymentGateway: ResourceGateway<Resource = Deployment> {
    /// Resolves the deployment's label selector and lists the pods matching
    /// it in the same namespace. Fails with [`crate::Error::NotFound`] when
    /// the deployment itself is absent.
    async fn owned_pods(&self, deployment: &str, namespace: &str) -> Result<Vec<Pod>>;
}

#[async_trait]
pub trait NamespaceGateway: Send + Sync {
    async fn list_names(&self) -> Result<Vec<String>>;
}
