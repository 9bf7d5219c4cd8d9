//! Error taxonomy shared by the aggregation and session layers.

use std::time::Duration;

use thiserror::Error;

use crate::models::{ClusterContext, WorkloadKind};

#[derive(Debug, Error)]
pub enum Error {
    /// Caller referenced a context that was never configured. Fatal to the
    /// call, never retried.
    #[error("unknown cluster context: {0}")]
    UnknownContext(ClusterContext),

    /// Remote endpoint unreachable. Surfaced per-unit during aggregation
    /// without aborting sibling units.
    #[error("cannot reach cluster: {0}")]
    Connection(String),

    /// Named resource absent.
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: WorkloadKind,
        namespace: String,
        name: String,
    },

    /// Not a failure — a structured choice request. Raised when a
    /// container-scoped operation hits a multi-container pod without a
    /// chosen container; carries the full candidate list.
    #[error("multiple containers found, please select one: {0:?}")]
    ContainerSelection(Vec<String>),

    /// The operation needs a single pod but was given a deployment.
    #[error("ambiguous target: {0} requires a single pod, select a pod first")]
    AmbiguousTarget(WorkloadKind),

    /// Port-forward readiness not reached within the bounded window.
    #[error("port forward not ready after {0:?}")]
    ForwardTimeout(Duration),

    /// Session input arrived after the underlying stream terminated.
    #[error("session closed")]
    SessionClosed,

    /// Any other error reported by the remote API.
    #[error("remote error: {0}")]
    Remote(String),
}

impl Error {
    pub fn not_found(kind: WorkloadKind, namespace: &str, name: &str) -> Self {
        Error::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Candidate container names when this is a [`Error::ContainerSelection`],
    /// so coordinators can intercept ambiguity without string matching.
    pub fn container_candidates(&self) -> Option<&[String]> {
        match self {
            Error::ContainerSelection(names) => Some(names),
            _ => None,
        }
    }
}

impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(api) if api.code == 404 => Error::Remote(api.message),
            kube::Error::Api(api) => Error::Remote(format!("{} ({})", api.message, api.code)),
            other => Error::Connection(other.to_string()),
        }
    }
}

/// Maps a kube get/list failure for a named resource, turning the API 404
/// into the typed [`Error::NotFound`].
pub fn kube_lookup_error(
    err: kube::Error,
    kind: WorkloadKind,
    namespace: &str,
    name: &str,
) -> Error {
    match err {
        kube::Error::Api(api) if api.code == 404 => Error::not_found(kind, namespace, name),
        other => other.into(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
