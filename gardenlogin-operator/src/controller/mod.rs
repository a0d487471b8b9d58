//! Shoot kubeconfig controller.
//!
//! For every shoot the controller maintains a ConfigMap `<shoot>.kubeconfig`
//! in the shoot's namespace. The ConfigMap holds a kubeconfig that points at
//! every advertised kube-apiserver address and authenticates through the
//! `gardenlogin` exec plugin, so it carries no credentials.
//!
//! - [`ShootReconciler`]: fetch, generate and upsert per shoot key
//! - [`NamespaceLimiter`]: bounds concurrent reconciles per namespace
//! - [`ChangeTracker`]: turns watch events into typed [`Change`]s for the
//!   update predicates in [`predicates`]
//! - [`run`]: wires watchers, predicates and the reconciler into a
//!   kube-runtime controller

mod certificate;
mod changes;
mod client;
mod limiter;
pub mod predicates;
mod runtime;
mod shoot;

use std::sync::Arc;
use std::time::Duration;

pub use certificate::{
    cluster_ca_cert, validate_certificate, CA_RESOURCE_DATA_NAME, CERTIFICATE_DATA_TYPE,
};
pub use changes::{Change, ChangeTracker};
#[cfg(test)]
pub use client::MockKubeClient;
pub use client::{KubeApiClient, KubeClient};
pub use limiter::{
    jitter, requeue_jitter, LimitReached, NamespaceLimiter, NamespacePermit, REQUEUE_BASE_DELAY,
    REQUEUE_MAX_FACTOR,
};
pub use runtime::run;
pub use shoot::{desired_config_map, error_policy, merge_config_map, reconcile, ShootReconciler};

use crate::config::ShootControllerConfiguration;

/// Data key of the generated kubeconfig.
pub const KUBECONFIG_DATA_KEY: &str = "kubeconfig";

/// Label marking ConfigMaps by their operational role.
pub const OPERATIONS_ROLE_LABEL: &str = "operations.gardener.cloud/role";

/// Role label value of kubeconfig ConfigMaps.
pub const ROLE_KUBECONFIG: &str = "kubeconfig";

/// Name of the ConfigMap and data key holding the garden cluster identity.
pub const CLUSTER_IDENTITY_NAME: &str = "cluster-identity";

/// Namespace of the cluster identity ConfigMap.
pub const CLUSTER_IDENTITY_NAMESPACE: &str = "kube-system";

/// Kubeconfig ConfigMaps never block the deletion of their shoot.
pub const BLOCK_OWNER_DELETION: bool = false;

/// Name of the kubeconfig ConfigMap of a shoot.
pub fn kubeconfig_config_map_name(shoot_name: &str) -> String {
    format!("{shoot_name}.kubeconfig")
}

/// Shared context for the shoot controller.
pub struct ControllerContext {
    /// Kubernetes API access.
    pub client: Arc<dyn KubeClient>,
    /// Per-namespace concurrency bound.
    pub limiter: Arc<NamespaceLimiter>,
    /// Requeue delay when the ConfigMap quota of a namespace is exhausted.
    pub quota_exceeded_retry_delay: Duration,
}

impl ControllerContext {
    /// Create a context from the shoot controller configuration.
    pub fn new(client: Arc<dyn KubeClient>, config: &ShootControllerConfiguration) -> Self {
        Self {
            client,
            limiter: Arc::new(NamespaceLimiter::new(
                config.max_concurrent_reconciles,
                config.max_concurrent_reconciles_per_namespace,
            )),
            quota_exceeded_retry_delay: config.quota_exceeded_retry_delay,
        }
    }
}
