//! Kubeconfig discovery and per-context client construction.
//!
//! The context set is established once at startup: every context found in
//! the merged kubeconfig gets its own [`kube::Client`], and those clients
//! back the per-context gateway registries handed to the aggregation and
//! session layers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

use crate::error::{Error, Result};
use crate::models::ClusterContext;

use super::{KubeDeploymentGateway, KubeNamespaceGateway, KubePodGateway};

/// Merges `extra` into `base` by extending clusters, auth_infos, and contexts.
/// `base.current_context` wins; `extra.current_context` is used only if base has none.
fn merge_kubeconfig(mut base: Kubeconfig, extra: Kubeconfig) -> Kubeconfig {
    base.clusters.extend(extra.clusters);
    base.auth_infos.extend(extra.auth_infos);
    base.contexts.extend(extra.contexts);
    if base.current_context.is_none() {
        base.current_context = extra.current_context;
    }
    base
}

/// Returns all regular, non-hidden files in `dir`, sorted alphabetically.
/// Skips subdirectories and any file whose name begins with '.'.
fn scan_kube_dir(dir: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            log::warn!("kubeconfig: cannot read directory {}: {e}", dir.display());
            return paths;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();

        // Skip subdirectories (cache/, http-cache/, etc.)
        if path.is_dir() {
            continue;
        }

        // Skip hidden files (.DS_Store, .gitconfig, etc.)
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.starts_with('.') {
            continue;
        }

        paths.push(path);
    }

    // Deterministic ordering so logs are easy to follow
    paths.sort();
    paths
}

/// Tries to load each path as a kubeconfig and merges all that succeed.
/// Logs every file with its outcome.
fn load_from_paths(paths: &[PathBuf]) -> Option<Kubeconfig> {
    let mut merged: Option<Kubeconfig> = None;

    for path in paths {
        if !path.exists() {
            log::info!("kubeconfig: skip (not found)     — {}", path.display());
            continue;
        }

        match Kubeconfig::read_from(path) {
            Ok(cfg) => {
                log::info!(
                    "kubeconfig: ok   ({} context(s))   — {}",
                    cfg.contexts.len(),
                    path.display()
                );
                merged = Some(match merged.take() {
                    None => cfg,
                    Some(base) => merge_kubeconfig(base, cfg),
                });
            }
            Err(e) => {
                // Not a kubeconfig — expected when scanning all files in ~/.kube
                log::info!("kubeconfig: skip (parse error: {e}) — {}", path.display());
            }
        }
    }

    merged
}

/// Finds and merges every reachable kubeconfig.
///
/// Resolution order:
/// 1. If KUBECONFIG is set, merge every listed file (`:` separated on Unix,
///    `;` on Windows), same semantics as kubectl.
/// 2. Otherwise scan `~/.kube` for ALL regular files, attempt to parse each
///    one, and merge every valid result — dropping a new config file into
///    `~/.kube` is enough to make its clusters appear.
///
/// Returns None — not an error — when no kubeconfig can be found.
pub fn discover_kubeconfig() -> Option<Kubeconfig> {
    let sep = if cfg!(windows) { ';' } else { ':' };

    if let Ok(var) = std::env::var("KUBECONFIG") {
        let paths: Vec<PathBuf> = var
            .split(sep)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();
        return load_from_paths(&paths);
    }

    let home = std::env::var_os("HOME").map(PathBuf::from)?;
    let paths = scan_kube_dir(&home.join(".kube"));
    load_from_paths(&paths)
}

/// One `kube::Client` per context in the merged kubeconfig.
pub struct ContextClients {
    clients: HashMap<ClusterContext, Client>,
}

impl ContextClients {
    /// Builds a client for every context. A context whose client cannot be
    /// constructed is skipped with a warning rather than failing the whole
    /// set — its siblings must stay reachable.
    pub async fn from_kubeconfig(kubeconfig: Kubeconfig) -> Result<Self> {
        let mut clients = HashMap::new();

        for context in &kubeconfig.contexts {
            let name = context.name.clone();
            let options = KubeConfigOptions {
                context: Some(name.clone()),
                ..KubeConfigOptions::default()
            };
            let config = match Config::from_custom_kubeconfig(kubeconfig.clone(), &options).await {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("context {name}: unusable config, skipping: {e}");
                    continue;
                }
            };
            match Client::try_from(config) {
                Ok(client) => {
                    clients.insert(ClusterContext::new(name), client);
                }
                Err(e) => {
                    log::warn!("context {name}: client construction failed, skipping: {e}");
                }
            }
        }

        if clients.is_empty() {
            return Err(Error::Connection(
                "no usable contexts in kubeconfig".to_string(),
            ));
        }
        Ok(Self { clients })
    }

    pub fn contexts(&self) -> Vec<ClusterContext> {
        self.clients.keys().cloned().collect()
    }

    pub fn client(&self, context: &ClusterContext) -> Result<Client> {
        self.clients
            .get(context)
            .cloned()
            .ok_or_else(|| Error::UnknownContext(context.clone()))
    }

    /// Pod gateway registry, one per context.
    pub fn pod_gateways(&self) -> HashMap<ClusterContext, Arc<KubePodGateway>> {
        self.clients
            .iter()
            .map(|(ctx, client)| {
                (
                    ctx.clone(),
                    Arc::new(KubePodGateway::new(client.clone(), ctx.clone())),
                )
            })
            .collect()
    }

    /// Deployment gateway registry, one per context.
    pub fn deployment_gateways(&self) -> HashMap<ClusterContext, Arc<KubeDeploymentGateway>> {
        self.clients
            .iter()
            .map(|(ctx, client)| {
                (
                    ctx.clone(),
                    Arc::new(KubeDeploymentGateway::new(client.clone(), ctx.clone())),
                )
            })
            .collect()
    }

    /// Namespace gateway registry, one per context.
    pub fn namespace_gateways(&self) -> HashMap<ClusterContext, Arc<KubeNamespaceGateway>> {
        self.clients
            .iter()
            .map(|(ctx, client)| {
                (ctx.clone(), Arc::new(KubeNamespaceGateway::new(client.clone())))
            })
            .collect()
    }
}
