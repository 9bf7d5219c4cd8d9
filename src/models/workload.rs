// Rust structs mirroring the workload snapshots returned by the cluster gateways.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of one configured, reachable cluster (context name in kubeconfig
/// terms). Keys every gateway registry; fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterContext(pub String);

impl ClusterContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClusterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClusterContext {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatus {
    pub name: String,
    /// Human-readable container state ("Running", "Waiting: <reason>", …).
    pub state: String,
    pub restart_count: i32,
    pub image: String,
}

/// Point-in-time snapshot of one pod. Never cached — every aggregation call
/// re-fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    pub name: String,
    pub namespace: String,
    pub context: ClusterContext,
    /// Pod phase string ("Running", "Pending", …).
    pub phase: String,
    pub container_statuses: Vec<ContainerStatus>,
    pub labels: BTreeMap<String, String>,
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl Pod {
    /// Ordered container names, as candidates for container selection.
    pub fn container_names(&self) -> Vec<String> {
        self.container_statuses
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    /// Age relative to `now`, or None when the API never reported a
    /// creation timestamp.
    pub fn age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.creation_timestamp.map(|created| now - created)
    }

    pub fn target(&self) -> SessionTarget {
        SessionTarget {
            kind: WorkloadKind::Pod,
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            context: self.context.clone(),
        }
    }
}

/// Point-in-time snapshot of one deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub name: String,
    pub namespace: String,
    pub context: ClusterContext,
    pub replicas: i32,
    pub available_replicas: i32,
    pub ready_replicas: i32,
    pub updated_replicas: i32,
    /// Label selector used to derive the owned pods.
    pub match_labels: BTreeMap<String, String>,
}

impl Deployment {
    pub fn target(&self) -> SessionTarget {
        SessionTarget {
            kind: WorkloadKind::Deployment,
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            context: self.context.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkloadKind {
    Pod,
    Deployment,
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadKind::Pod => f.write_str("pod"),
            WorkloadKind::Deployment => f.write_str("deployment"),
        }
    }
}

/// Identifies the workload an interactive session is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTarget {
    pub kind: WorkloadKind,
    pub name: String,
    pub namespace: String,
    pub context: ClusterContext,
}

impl SessionTarget {
    pub fn pod(
        name: impl Into<String>,
        namespace: impl Into<String>,
        context: impl Into<ClusterContext>,
    ) -> Self {
        Self {
            kind: WorkloadKind::Pod,
            name: name.into(),
            namespace: namespace.into(),
            context: context.into(),
        }
    }

    pub fn deployment(
        name: impl Into<String>,
        namespace: impl Into<String>,
        context: impl Into<ClusterContext>,
    ) -> Self {
        Self {
            kind: WorkloadKind::Deployment,
            name: name.into(),
            namespace: namespace.into(),
            context: context.into(),
        }
    }
}

impl From<String> for ClusterContext {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One local→remote port pair for a port-forward tunnel.
/// Local port 0 asks for an ephemeral port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub local: u16,
    pub remote: u16,
}

impl FromStr for PortMapping {
    type Err = String;

    /// Parses "local:remote". Both halves must be numeric.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (local, remote) = s
            .split_once(':')
            .ok_or_else(|| format!("invalid port format {s:?}, use local:remote"))?;
        let local = local
            .parse::<u16>()
            .map_err(|_| format!("invalid local port {local:?}"))?;
        let remote = remote
            .parse::<u16>()
            .map_err(|_| format!("invalid remote port {remote:?}"))?;
        Ok(Self { local, remote })
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.local, self.remote)
    }
}
