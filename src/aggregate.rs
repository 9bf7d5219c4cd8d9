//! Multi-context fan-out/fan-in over the per-context gateways.
//!
//! One logical query fans out to every requested (context, namespace) pair;
//! each pair is an independent tokio task against that context's gateway.
//! Results reduce into a single partial-success [`Aggregation`]: a context
//! that fails contributes nothing (all-or-nothing per context) but never
//! prevents other contexts from contributing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::error::{Error, Result};
use crate::gateway::{DeploymentGateway, NamespaceGateway, ResourceGateway};
use crate::models::{ClusterContext, Pod};

/// Reduced result of one fan-out call.
///
/// Per-context workload lists plus the first error observed for each failing
/// context. `first_error` is diagnostic only: a non-empty result and a
/// non-nil first error can coexist when only some contexts failed.
#[derive(Debug)]
pub struct Aggregation<T> {
    items: BTreeMap<ClusterContext, Vec<T>>,
    errors: BTreeMap<ClusterContext, Error>,
    first_error: Option<ClusterContext>,
}

impl<T> Default for Aggregation<T> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
            errors: BTreeMap::new(),
            first_error: None,
        }
    }
}

impl<T> Aggregation<T> {
    /// Folds one settled (context, namespace) unit into the result.
    ///
    /// Successes concatenate in arrival order; order across units carries
    /// no meaning. The first error per context wins and evicts any workloads
    /// that context already contributed; later successes for a failed
    /// context are discarded.
    fn record(&mut self, context: ClusterContext, outcome: Result<Vec<T>>) {
        match outcome {
            Ok(items) => {
                if !self.errors.contains_key(&context) {
                    self.items.entry(context).or_default().extend(items);
                }
            }
            Err(err) => {
                log::warn!("aggregation unit failed for context {context}: {err}");
                self.items.remove(&context);
                if self.first_error.is_none() {
                    self.first_error = Some(context.clone());
                }
                self.errors.entry(context).or_insert(err);
            }
        }
    }

    /// Contexts that contributed workloads, in sorted order.
    pub fn contexts(&self) -> impl Iterator<Item = &ClusterContext> {
        self.items.keys()
    }

    pub fn get(&self, context: &ClusterContext) -> Option<&[T]> {
        self.items.get(context).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ClusterContext, &[T])> {
        self.items.iter().map(|(ctx, items)| (ctx, items.as_slice()))
    }

    pub fn error_for(&self, context: &ClusterContext) -> Option<&Error> {
        self.errors.get(context)
    }

    /// First error observed across all contexts, by arbitrary completion
    /// order.
    pub fn first_error(&self) -> Option<(&ClusterContext, &Error)> {
        let context = self.first_error.as_ref()?;
        Some((context, self.errors.get(context)?))
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total workloads across all contributing contexts.
    pub fn len(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fans list queries out across a registry of per-context gateways.
///
/// Owns no state beyond one call's lifetime; gateways are shared read-only
/// across concurrent units.
pub struct Aggregator<G> {
    gateways: HashMap<ClusterContext, Arc<G>>,
}

impl<G> Aggregator<G> {
    pub fn new(gateways: HashMap<ClusterContext, Arc<G>>) -> Self {
        Self { gateways }
    }

    /// Every configured context, in arbitrary order.
    pub fn known_contexts(&self) -> Vec<ClusterContext> {
        self.gateways.keys().cloned().collect()
    }

    pub fn gateway(&self, context: &ClusterContext) -> Result<Arc<G>> {
        self.gateways
            .get(context)
            .cloned()
            .ok_or_else(|| Error::UnknownContext(context.clone()))
    }
}

impl<G> Aggregator<G>
where
    G: ResourceGateway + 'static,
{
    /// Fetches the kind from every requested (context, namespace) pair
    /// concurrently and reduces into one [`Aggregation`].
    ///
    /// An empty `contexts` slice queries every configured context. An empty
    /// `namespaces` slice issues a single unit per context with the empty
    /// namespace, leaving the default scope to the gateway. Returns only
    /// after every unit has settled.
    pub async fn fetch_all(
        &self,
        namespaces: &[String],
        contexts: &[ClusterContext],
    ) -> Aggregation<G::Resource> {
        let contexts: Vec<ClusterContext> = if contexts.is_empty() {
            self.known_contexts()
        } else {
            contexts.to_vec()
        };
        let namespaces: Vec<String> = if namespaces.is_empty() {
            vec![String::new()]
        } else {
            namespaces.to_vec()
        };

        let shared = Arc::new(Mutex::new(Aggregation::default()));
        let mut units = JoinSet::new();

        for context in contexts {
            let gateway = match self.gateways.get(&context) {
                Some(gateway) => Arc::clone(gateway),
                None => {
                    let mut agg = shared.lock().await;
                    agg.record(context.clone(), Err(Error::UnknownContext(context)));
                    continue;
                }
            };

            for namespace in &namespaces {
                let gateway = Arc::clone(&gateway);
                let context = context.clone();
                let namespace = namespace.clone();
                let shared = Arc::clone(&shared);
                units.spawn(async move {
                    // The remote call runs outside the lock; only the
                    // reduction below is a critical section.
                    let outcome = gateway.list_all(&namespace).await;
                    shared.lock().await.record(context, outcome);
                });
            }
        }

        // All units settle (success or failure) before we return.
        while units.join_next().await.is_some() {}

        // Named guard so it drops before `shared` does.
        let mut merged = shared.lock().await;
        std::mem::take(&mut *merged)
    }

    /// Single-context convenience; fails directly when the context is
    /// unknown.
    pub async fn fetch_one(
        &self,
        namespace: &str,
        context: &ClusterContext,
    ) -> Result<Vec<G::Resource>> {
        self.gateway(context)?.list_all(namespace).await
    }

    pub async fn get_by_name(
        &self,
        namespace: &str,
        name: &str,
        context: &ClusterContext,
    ) -> Result<G::Resource> {
        self.gateway(context)?.get_by_name(namespace, name).await
    }

    /// Serialized manifest of one named resource.
    pub async fn manifest(
        &self,
        namespace: &str,
        name: &str,
        context: &ClusterContext,
    ) -> Result<Vec<u8>> {
        self.gateway(context)?.manifest(namespace, name).await
    }
}

impl<G> Aggregator<G>
where
    G: DeploymentGateway + 'static,
{
    /// Pods owned by one deployment, resolved through its label selector.
    pub async fn fetch_pods(
        &self,
        deployment: &str,
        namespace: &str,
        context: &ClusterContext,
    ) -> Result<Vec<Pod>> {
        self.gateway(context)?.owned_pods(deployment, namespace).await
    }
}

/// Registry of per-context namespace gateways, for namespace pickers.
pub struct NamespaceDirectory<G> {
    gateways: HashMap<ClusterContext, Arc<G>>,
}

impl<G: NamespaceGateway> NamespaceDirectory<G> {
    pub fn new(gateways: HashMap<ClusterContext, Arc<G>>) -> Self {
        Self { gateways }
    }

    pub async fn list(&self, context: &ClusterContext) -> Result<Vec<String>> {
        let gateway = self
            .gateways
            .get(context)
            .ok_or_else(|| Error::UnknownContext(context.clone()))?;
        gateway.list_names().await
    }
}
