#![allow(dead_code)]

//! Mock gateways and fixtures shared by the integration tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::DuplexStream;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

use multikube::{
    ClusterContext, ContainerStatus, Deployment, DeploymentGateway, Error, ExecStream,
    ForwardHandle, LogReader, Pod, PodGateway, PortMapping, ResourceGateway, Result,
    SelectionPrompt, WorkloadKind,
};

pub fn pod(
    name: &str,
    namespace: &str,
    context: &str,
    labels: &[(&str, &str)],
    containers: &[&str],
) -> Pod {
    Pod {
        name: name.to_string(),
        namespace: namespace.to_string(),
        context: ClusterContext::new(context),
        phase: "Running".to_string(),
        container_statuses: containers
            .iter()
            .map(|c| ContainerStatus {
                name: c.to_string(),
                state: "Running".to_string(),
                restart_count: 0,
                image: "busybox".to_string(),
            })
            .collect(),
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        creation_timestamp: None,
    }
}

pub fn deployment(
    name: &str,
    namespace: &str,
    context: &str,
    match_labels: &[(&str, &str)],
) -> Deployment {
    Deployment {
        name: name.to_string(),
        namespace: namespace.to_string(),
        context: ClusterContext::new(context),
        replicas: 2,
        available_replicas: 2,
        ready_replicas: 2,
        updated_replicas: 2,
        match_labels: match_labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

/// Pod listing gateway with canned per-namespace data and failure injection.
pub struct StaticPodGateway {
    pub by_namespace: HashMap<String, Vec<Pod>>,
    pub fail_namespaces: HashSet<String>,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl StaticPodGateway {
    pub fn new(by_namespace: HashMap<String, Vec<Pod>>) -> Self {
        Self {
            by_namespace,
            fail_namespaces: HashSet::new(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self, namespaces: &[&str]) -> Self {
        self.fail_namespaces = namespaces.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ResourceGateway for StaticPodGateway {
    type Resource = Pod;

    async fn list_all(&self, namespace: &str) -> Result<Vec<Pod>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_namespaces.contains(namespace) {
            return Err(Error::Connection(format!(
                "connection refused listing {namespace}"
            )));
        }
        Ok(self.by_namespace.get(namespace).cloned().unwrap_or_default())
    }

    async fn get_by_name(&self, namespace: &str, name: &str) -> Result<Pod> {
        self.by_namespace
            .get(namespace)
            .and_then(|pods| pods.iter().find(|p| p.name == name))
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: WorkloadKind::Pod,
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn manifest(&self, namespace: &str, name: &str) -> Result<Vec<u8>> {
        let pod = self.get_by_name(namespace, name).await?;
        Ok(format!("kind: Pod\nmetadata:\n  name: {}\n", pod.name).into_bytes())
    }
}

/// Session-capable pod gateway: exec and logs are local duplex pipes, port
/// forwards are scripted to become ready or to stall forever.
pub struct MockSessionGateway {
    pub containers: Vec<String>,
    pub forward_ready: bool,
    pub calls: AtomicUsize,
    pub probes: AtomicUsize,
    pub streams_opened: AtomicUsize,
    /// Far ends of every opened exec/log pipe, in open order.
    pub far_ends: Mutex<Vec<DuplexStream>>,
}

impl MockSessionGateway {
    pub fn with_containers(containers: &[&str]) -> Self {
        Self {
            containers: containers.iter().map(|s| s.to_string()).collect(),
            forward_ready: true,
            calls: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
            streams_opened: AtomicUsize::new(0),
            far_ends: Mutex::new(Vec::new()),
        }
    }

    pub fn never_ready(mut self) -> Self {
        self.forward_ready = false;
        self
    }

    pub fn take_far_end(&self) -> DuplexStream {
        self.far_ends.lock().unwrap().remove(0)
    }

    fn resolve(&self, container: Option<&str>) -> Result<String> {
        if let Some(name) = container {
            return Ok(name.to_string());
        }
        match self.containers.len() {
            0 => Err(Error::Remote("pod has no containers".to_string())),
            1 => Ok(self.containers[0].clone()),
            _ => Err(Error::ContainerSelection(self.containers.clone())),
        }
    }
}

#[async_trait]
impl ResourceGateway for MockSessionGateway {
    type Resource = Pod;

    async fn list_all(&self, _namespace: &str) -> Result<Vec<Pod>> {
        Ok(Vec::new())
    }

    async fn get_by_name(&self, namespace: &str, name: &str) -> Result<Pod> {
        let containers: Vec<&str> = self.containers.iter().map(String::as_str).collect();
        Ok(pod(name, namespace, "east", &[], &containers))
    }

    async fn manifest(&self, _namespace: &str, _name: &str) -> Result<Vec<u8>> {
        Ok(b"kind: Pod\n".to_vec())
    }
}

#[async_trait]
impl PodGateway for MockSessionGateway {
    async fn list_by_labels(
        &self,
        _namespace: &str,
        _selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Pod>> {
        Ok(Vec::new())
    }

    async fn open_exec(
        &self,
        _pod: &str,
        _namespace: &str,
        container: Option<&str>,
        probe_only: bool,
    ) -> Result<Option<ExecStream>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.resolve(container)?;
        if probe_only {
            self.probes.fetch_add(1, Ordering::SeqCst);
            return Ok(None);
        }
        let (near, far) = tokio::io::duplex(1024);
        self.far_ends.lock().unwrap().push(far);
        self.streams_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Box::pin(near)))
    }

    async fn open_logs(
        &self,
        _pod: &str,
        _namespace: &str,
        container: Option<&str>,
    ) -> Result<LogReader> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.resolve(container)?;
        let (near, far) = tokio::io::duplex(1024);
        self.far_ends.lock().unwrap().push(far);
        self.streams_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(near))
    }

    async fn open_port_forward(
        &self,
        _namespace: &str,
        _pod: &str,
        ports: &[PortMapping],
        cancel: CancellationToken,
    ) -> Result<ForwardHandle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (ready_tx, ready_rx) = oneshot::channel();
        let output = Arc::new(AsyncMutex::new(String::new()));
        let errors = Arc::new(AsyncMutex::new(String::new()));

        let handle = ForwardHandle {
            ready: ready_rx,
            output: Arc::clone(&output),
            errors: Arc::clone(&errors),
        };

        let remote = ports.first().map(|p| p.remote).unwrap_or_default();
        if self.forward_ready {
            tokio::spawn(async move {
                output
                    .lock()
                    .await
                    .push_str(&format!("Forwarding from 127.0.0.1:40000 -> {remote}\n"));
                let _ = ready_tx.send(());
                cancel.cancelled().await;
            });
        } else {
            // Stalls forever: keeps writing status but never signals ready,
            // until the cancel token stops it.
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_millis(5));
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            output.lock().await.push_str("dialing\n");
                        }
                    }
                }
                drop(ready_tx);
            });
        }

        Ok(handle)
    }
}

/// Deployment gateway with canned deployments and a pod pool filtered by
/// label selector.
pub struct StaticDeploymentGateway {
    pub deployments: Vec<Deployment>,
    pub pods: Vec<Pod>,
}

#[async_trait]
impl ResourceGateway for StaticDeploymentGateway {
    type Resource = Deployment;

    async fn list_all(&self, namespace: &str) -> Result<Vec<Deployment>> {
        Ok(self
            .deployments
            .iter()
            .filter(|d| namespace.is_empty() || d.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn get_by_name(&self, namespace: &str, name: &str) -> Result<Deployment> {
        self.deployments
            .iter()
            .find(|d| d.namespace == namespace && d.name == name)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: WorkloadKind::Deployment,
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn manifest(&self, namespace: &str, name: &str) -> Result<Vec<u8>> {
        let deployment = self.get_by_name(namespace, name).await?;
        Ok(format!("kind: Deployment\nmetadata:\n  name: {}\n", deployment.name).into_bytes())
    }
}

#[async_trait]
impl DeploymentGateway for StaticDeploymentGateway {
    async fn owned_pods(&self, deployment: &str, namespace: &str) -> Result<Vec<Pod>> {
        let deployment = self.get_by_name(namespace, deployment).await?;
        Ok(self
            .pods
            .iter()
            .filter(|p| {
                p.namespace == deployment.namespace
                    && deployment
                        .match_labels
                        .iter()
                        .all(|(k, v)| p.labels.get(k) == Some(v))
            })
            .cloned()
            .collect())
    }
}

/// Prompt with pre-scripted answers; records everything it was shown.
pub struct ScriptedPrompt {
    pub container_answer: Option<String>,
    pub pod_answer: Option<String>,
    pub containers_shown: Mutex<Vec<Vec<String>>>,
    pub pods_shown: Mutex<Vec<Vec<String>>>,
}

impl ScriptedPrompt {
    pub fn new(container_answer: Option<&str>, pod_answer: Option<&str>) -> Self {
        Self {
            container_answer: container_answer.map(str::to_string),
            pod_answer: pod_answer.map(str::to_string),
            containers_shown: Mutex::new(Vec::new()),
            pods_shown: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SelectionPrompt for ScriptedPrompt {
    async fn choose_container(&self, candidates: &[String]) -> Option<String> {
        self.containers_shown
            .lock()
            .unwrap()
            .push(candidates.to_vec());
        self.container_answer.clone()
    }

    async fn choose_pod(&self, pods: &[Pod]) -> Option<Pod> {
        self.pods_shown
            .lock()
            .unwrap()
            .push(pods.iter().map(|p| p.name.clone()).collect());
        let wanted = self.pod_answer.as_ref()?;
        pods.iter().find(|p| &p.name == wanted).cloned()
    }
}
