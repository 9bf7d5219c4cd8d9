//! Multi-cluster workload aggregation and interactive session core.
//!
//! Fans read queries (pods, deployments, namespaces) out across every
//! configured cluster context and reconciles partial results, and manages
//! the long-lived interactive sessions (exec shells, follow-mode logs,
//! port forwards) an operator opens into a single workload. The
//! presentation layer consumes [`Aggregator`] for listings and
//! [`SessionManager`]/[`RecoveryCoordinator`] for interactive actions.

pub mod aggregate;
pub mod error;
pub mod gateway;
pub mod k8s;
pub mod models;
pub mod recovery;
pub mod session;

pub use aggregate::{Aggregation, Aggregator, NamespaceDirectory};
pub use error::{Error, Result};
pub use gateway::{
    DeploymentGateway, ExecStream, ForwardHandle, LogReader, NamespaceGateway, PodGateway,
    ResourceGateway,
};
pub use models::{
    ClusterContext, ContainerStatus, Deployment, Pod, PortMapping, SessionTarget, WorkloadKind,
};
pub use recovery::{RecoveryCoordinator, RecoveryOutcome, SelectionPrompt};
pub use session::{
    ExecSession, LogSession, PortForwardSession, SessionManager, INTERRUPT_BYTE, READY_TIMEOUT,
};
