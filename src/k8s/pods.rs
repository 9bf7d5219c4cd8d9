//! Pod gateway backed by kube-rs, including the streaming sub-resources.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1 as corev1;
use kube::api::{Api, AttachParams, ListParams, LogParams};
use kube::Client;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinSet;
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tokio_util::sync::CancellationToken;

use crate::error::{kube_lookup_error, Error, Result};
use crate::gateway::{ExecStream, ForwardHandle, LogReader, PodGateway, ResourceGateway};
use crate::models::{ClusterContext, Pod, PortMapping, WorkloadKind};

use super::{pod_snapshot, selector_string, yaml_manifest};

pub struct KubePodGateway {
    client: Client,
    context: ClusterContext,
}

impl KubePodGateway {
    pub fn new(client: Client, context: ClusterContext) -> Self {
        Self { client, context }
    }

    /// Namespaced API handle; the empty namespace means cluster-wide scope.
    fn api(&self, namespace: &str) -> Api<corev1::Pod> {
        if namespace.is_empty() {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), namespace)
        }
    }

    /// Resolves the target container. A given name passes through; an empty
    /// one is looked up on the pod spec and fails with the full candidate
    /// list when more than one container exists.
    async fn resolve_container(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
    ) -> Result<String> {
        if let Some(name) = container {
            return Ok(name.to_string());
        }

        let fetched = self
            .api(namespace)
            .get(pod)
            .await
            .map_err(|e| kube_lookup_error(e, WorkloadKind::Pod, namespace, pod))?;
        let containers = fetched.spec.map(|spec| spec.containers).unwrap_or_default();
        match containers.len() {
            0 => Err(Error::Remote(format!("pod {pod} has no containers"))),
            1 => Ok(containers[0].name.clone()),
            _ => Err(Error::ContainerSelection(
                containers.into_iter().map(|c| c.name).collect(),
            )),
        }
    }
}

#[async_trait]
impl ResourceGateway for KubePodGateway {
    type Resource = Pod;

    async fn list_all(&self, namespace: &str) -> Result<Vec<Pod>> {
        let list = self.api(namespace).list(&ListParams::default()).await?;
        Ok(list
            .items
            .into_iter()
            .map(|pod| pod_snapshot(pod, &self.context))
            .collect())
    }

    async fn get_by_name(&self, namespace: &str, name: &str) -> Result<Pod> {
        let pod = self
            .api(namespace)
            .get(name)
            .await
            .map_err(|e| kube_lookup_error(e, WorkloadKind::Pod, namespace, name))?;
        Ok(pod_snapshot(pod, &self.context))
    }

    async fn manifest(&self, namespace: &str, name: &str) -> Result<Vec<u8>> {
        let mut pod = self
            .api(namespace)
            .get(name)
            .await
            .map_err(|e| kube_lookup_error(e, WorkloadKind::Pod, namespace, name))?;
        pod.metadata.managed_fields = None;
        yaml_manifest(&pod)
    }
}

#[async_trait]
impl PodGateway for KubePodGateway {
    async fn list_by_labels(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Pod>> {
        let params = ListParams::default().labels(&selector_string(selector));
        let list = self.api(namespace).list(&params).await?;
        Ok(list
            .items
            .into_iter()
            .map(|pod| pod_snapshot(pod, &self.context))
            .collect())
    }

    async fn open_exec(
        &self,
        pod: &str,
        namespace: &str,
        container: Option<&str>,
        probe_only: bool,
    ) -> Result<Option<ExecStream>> {
        let container = self.resolve_container(namespace, pod, container).await?;
        if probe_only {
            return Ok(None);
        }

        let params = AttachParams::default()
            .container(container)
            .stdin(true)
            .stdout(true)
            .stderr(false)
            .tty(true);
        let mut attached = self.api(namespace).exec(pod, vec!["sh"], &params).await?;

        let stdin = attached
            .stdin()
            .ok_or_else(|| Error::Remote("exec stdin unavailable".to_string()))?;
        let stdout = attached
            .stdout()
            .ok_or_else(|| Error::Remote("exec stdout unavailable".to_string()))?;

        // Keep the connection pumping until the remote process ends.
        tokio::spawn(async move {
            if let Err(err) = attached.join().await {
                log::debug!("exec connection ended: {err}");
            }
        });

        Ok(Some(Box::pin(tokio::io::join(stdout, stdin))))
    }

    async fn open_logs(
        &self,
        pod: &str,
        namespace: &str,
        container: Option<&str>,
    ) -> Result<LogReader> {
        // Ambiguity is settled before the stream is opened; nothing is
        // consumed until a concrete container is known.
        let container = self.resolve_container(namespace, pod, container).await?;

        let params = LogParams {
            container: Some(container),
            follow: true,
            ..LogParams::default()
        };
        let stream = self
            .api(namespace)
            .log_stream(pod, &params)
            .await
            .map_err(|e| kube_lookup_error(e, WorkloadKind::Pod, namespace, pod))?;
        // log_stream speaks the futures-io traits; bridge to tokio's.
        Ok(Box::pin(stream.compat()))
    }

    async fn open_port_forward(
        &self,
        namespace: &str,
        pod: &str,
        ports: &[PortMapping],
        cancel: CancellationToken,
    ) -> Result<ForwardHandle> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let output = Arc::new(Mutex::new(String::new()));
        let errors = Arc::new(Mutex::new(String::new()));

        let handle = ForwardHandle {
            ready: ready_rx,
            output: Arc::clone(&output),
            errors: Arc::clone(&errors),
        };

        tokio::spawn(forward_loop(
            self.api(namespace),
            pod.to_string(),
            ports.to_vec(),
            cancel,
            ready_tx,
            output,
            errors,
        ));

        Ok(handle)
    }
}

/// Runs the tunnel: validates the remote end, binds the local listeners,
/// signals readiness, then bridges each accepted connection to its own
/// forwarded stream until the cancel token fires.
async fn forward_loop(
    api: Api<corev1::Pod>,
    pod: String,
    mappings: Vec<PortMapping>,
    cancel: CancellationToken,
    ready_tx: oneshot::Sender<()>,
    output: Arc<Mutex<String>>,
    errors: Arc<Mutex<String>>,
) {
    // Setup races the cancel token: a caller that already gave up on the
    // readiness window must not be left with a task still dialing out or
    // buffering status text.
    let listeners = tokio::select! {
        _ = cancel.cancelled() => return,
        bound = setup_tunnel(&api, &pod, &mappings, &output, &errors) => match bound {
            Some(listeners) => listeners,
            None => return,
        },
    };

    // Tunnel usable from here on.
    let _ = ready_tx.send(());

    let mut accept_tasks = JoinSet::new();
    for (listener, remote) in listeners {
        let api = api.clone();
        let pod = pod.clone();
        let errors = Arc::clone(&errors);
        let cancel = cancel.clone();
        accept_tasks.spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    conn = listener.accept() => {
                        let (local, peer) = match conn {
                            Ok(accepted) => accepted,
                            Err(err) => {
                                errors
                                    .lock()
                                    .await
                                    .push_str(&format!("accept failed: {err}\n"));
                                break;
                            }
                        };
                        log::debug!("forward connection from {peer} to {pod}:{remote}");
                        tokio::spawn(bridge_connection(
                            api.clone(),
                            pod.clone(),
                            remote,
                            local,
                            cancel.clone(),
                            Arc::clone(&errors),
                        ));
                    }
                }
            }
        });
    }

    cancel.cancelled().await;
    accept_tasks.shutdown().await;
    log::debug!("port forward to {pod} stopped");
}

/// Probes the forward sub-resource (so readiness means "usable") and binds
/// the local listeners. `None` on any setup failure, with the cause pushed
/// to `errors`.
async fn setup_tunnel(
    api: &Api<corev1::Pod>,
    pod: &str,
    mappings: &[PortMapping],
    output: &Mutex<String>,
    errors: &Mutex<String>,
) -> Option<Vec<(TcpListener, u16)>> {
    let remote_ports: Vec<u16> = mappings.iter().map(|m| m.remote).collect();
    match api.portforward(pod, &remote_ports).await {
        Ok(probe) => drop(probe),
        Err(err) => {
            errors
                .lock()
                .await
                .push_str(&format!("port forward setup failed: {err}\n"));
            return None;
        }
    }

    let mut listeners = Vec::new();
    for mapping in mappings {
        match TcpListener::bind(("127.0.0.1", mapping.local)).await {
            Ok(listener) => {
                let bound = listener
                    .local_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| format!("127.0.0.1:{}", mapping.local));
                output
                    .lock()
                    .await
                    .push_str(&format!("Forwarding from {bound} -> {}\n", mapping.remote));
                listeners.push((listener, mapping.remote));
            }
            Err(err) => {
                errors
                    .lock()
                    .await
                    .push_str(&format!("cannot bind 127.0.0.1:{}: {err}\n", mapping.local));
                return None;
            }
        }
    }
    Some(listeners)
}

async fn bridge_connection(
    api: Api<corev1::Pod>,
    pod: String,
    remote: u16,
    mut local: tokio::net::TcpStream,
    cancel: CancellationToken,
    errors: Arc<Mutex<String>>,
) {
    let mut forwarder = match api.portforward(&pod, &[remote]).await {
        Ok(forwarder) => forwarder,
        Err(err) => {
            errors
                .lock()
                .await
                .push_str(&format!("forward to {pod}:{remote} failed: {err}\n"));
            return;
        }
    };
    let Some(mut upstream) = forwarder.take_stream(remote) else {
        errors
            .lock()
            .await
            .push_str(&format!("no stream for port {remote}\n"));
        return;
    };

    tokio::select! {
        _ = cancel.cancelled() => {}
        result = tokio::io::copy_bidirectional(&mut local, &mut upstream) => {
            if let Err(err) = result {
                errors
                    .lock()
                    .await
                    .push_str(&format!("forward stream error: {err}\n"));
            }
        }
    }
}
