//! Namespace gateway backed by kube-rs.

use async_trait::async_trait;
use k8s_openapi::api::core::v1 as corev1;
use kube::api::{Api, ListParams};
use kube::Client;

use crate::error::Result;
use crate::gateway::NamespaceGateway;

pub struct KubeNamespaceGateway {
    client: Client,
}

impl KubeNamespaceGateway {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NamespaceGateway for KubeNamespaceGateway {
    async fn list_names(&self) -> Result<Vec<String>> {
        let api: Api<corev1::Namespace> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        let mut names: Vec<String> = list
            .items
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect();
        names.sort();
        Ok(names)
    }
}
