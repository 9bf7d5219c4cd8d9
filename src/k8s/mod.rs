//! kube-rs implementations of the gateway contract.
//!
//! One gateway instance per (context, kind) pair, all sharing that context's
//! [`kube::Client`]. Conversion into the domain snapshots happens at this
//! boundary so nothing above it sees API machinery types.

pub mod contexts;
pub mod deployments;
pub mod namespaces;
pub mod pods;

pub use contexts::{discover_kubeconfig, ContextClients};
pub use deployments::KubeDeploymentGateway;
pub use namespaces::KubeNamespaceGateway;
pub use pods::KubePodGateway;

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1 as corev1;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{ClusterContext, ContainerStatus, Pod};

/// Human-readable label for a container state, mirroring what operators see
/// in listings ("Running", "Waiting: ImagePullBackOff", …).
fn container_state_label(state: Option<&corev1::ContainerState>) -> String {
    let Some(state) = state else {
        return "Unknown".to_string();
    };
    if state.running.is_some() {
        return "Running".to_string();
    }
    if let Some(waiting) = &state.waiting {
        return match &waiting.reason {
            Some(reason) => format!("Waiting: {reason}"),
            None => "Waiting".to_string(),
        };
    }
    if let Some(terminated) = &state.terminated {
        return match &terminated.reason {
            Some(reason) => format!("Terminated: {reason}"),
            None => "Terminated".to_string(),
        };
    }
    "Unknown".to_string()
}

/// Converts an API pod into the domain snapshot, tagging it with the
/// context it was fetched from.
pub(crate) fn pod_snapshot(pod: corev1::Pod, context: &ClusterContext) -> Pod {
    let status = pod.status.unwrap_or_default();
    let container_statuses = status
        .container_statuses
        .unwrap_or_default()
        .into_iter()
        .map(|cs| ContainerStatus {
            name: cs.name,
            state: container_state_label(cs.state.as_ref()),
            restart_count: cs.restart_count,
            image: cs.image,
        })
        .collect();

    Pod {
        name: pod.metadata.name.unwrap_or_default(),
        namespace: pod.metadata.namespace.unwrap_or_default(),
        context: context.clone(),
        phase: status.phase.unwrap_or_default(),
        container_statuses,
        labels: pod.metadata.labels.unwrap_or_default(),
        creation_timestamp: pod.metadata.creation_timestamp.map(|t| t.0),
    }
}

/// kubectl-style label selector string ("app=web,tier=front").
pub(crate) fn selector_string(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Renders a resource as YAML for the manifest view.
pub(crate) fn yaml_manifest<T: Serialize>(resource: &T) -> Result<Vec<u8>> {
    serde_yaml::to_string(resource)
        .map(String::into_bytes)
        .map_err(|err| Error::Remote(format!("manifest rendering failed: {err}")))
}
