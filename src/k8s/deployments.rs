//! Deployment gateway backed by kube-rs.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1 as appsv1;
use kube::api::{Api, ListParams};
use kube::Client;

use crate::error::{kube_lookup_error, Error, Result};
use crate::gateway::{DeploymentGateway, ResourceGateway};
use crate::models::{ClusterContext, Deployment, Pod, WorkloadKind};

use super::{pod_snapshot, selector_string, yaml_manifest};

pub struct KubeDeploymentGateway {
    client: Client,
    context: ClusterContext,
}

impl KubeDeploymentGateway {
    pub fn new(client: Client, context: ClusterContext) -> Self {
        Self { client, context }
    }

    fn api(&self, namespace: &str) -> Api<appsv1::Deployment> {
        if namespace.is_empty() {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), namespace)
        }
    }

    fn snapshot(&self, deployment: appsv1::Deployment) -> Deployment {
        let status = deployment.status.unwrap_or_default();
        let match_labels = deployment
            .spec
            .map(|spec| spec.selector.match_labels.unwrap_or_default())
            .unwrap_or_default();

        Deployment {
            name: deployment.metadata.name.unwrap_or_default(),
            namespace: deployment.metadata.namespace.unwrap_or_default(),
            context: self.context.clone(),
            replicas: status.replicas.unwrap_or_default(),
            available_replicas: status.available_replicas.unwrap_or_default(),
            ready_replicas: status.ready_replicas.unwrap_or_default(),
            updated_replicas: status.updated_replicas.unwrap_or_default(),
            match_labels,
        }
    }
}

#[async_trait]
impl ResourceGateway for KubeDeploymentGateway {
    type Resource = Deployment;

    async fn list_all(&self, namespace: &str) -> Result<Vec<Deployment>> {
        let list = self.api(namespace).list(&ListParams::default()).await?;
        Ok(list
            .items
            .into_iter()
            .map(|deployment| self.snapshot(deployment))
            .collect())
    }

    async fn get_by_name(&self, namespace: &str, name: &str) -> Result<Deployment> {
        let deployment = self
            .api(namespace)
            .get(name)
            .await
            .map_err(|e| kube_lookup_error(e, WorkloadKind::Deployment, namespace, name))?;
        Ok(self.snapshot(deployment))
    }

    async fn manifest(&self, namespace: &str, name: &str) -> Result<Vec<u8>> {
        let mut deployment = self
            .api(namespace)
            .get(name)
            .await
            .map_err(|e| kube_lookup_error(e, WorkloadKind::Deployment, namespace, name))?;
        deployment.metadata.managed_fields = None;
        yaml_manifest(&deployment)
    }
}

#[async_trait]
impl DeploymentGateway for KubeDeploymentGateway {
    async fn owned_pods(&self, deployment: &str, namespace: &str) -> Result<Vec<Pod>> {
        // Unlike listing, owned-pod resolution names one deployment and so
        // needs a concrete namespace.
        if namespace.is_empty() {
            return Err(Error::Remote(
                "owned pods require a concrete namespace".to_string(),
            ));
        }

        let fetched = self
            .api(namespace)
            .get(deployment)
            .await
            .map_err(|e| kube_lookup_error(e, WorkloadKind::Deployment, namespace, deployment))?;

        let selector = fetched
            .spec
            .map(|spec| spec.selector.match_labels.unwrap_or_default())
            .unwrap_or_default();
        if selector.is_empty() {
            // A selector-less deployment owns nothing we can list safely.
            return Ok(Vec::new());
        }

        let pods: Api<k8s_openapi::api::core::v1::Pod> =
            Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(&selector_string(&selector));
        let list = pods.list(&params).await?;
        Ok(list
            .items
            .into_iter()
            .map(|pod| pod_snapshot(pod, &self.context))
            .collect())
    }
}
