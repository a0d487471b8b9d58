//! Shoot reconciler.
//!
//! Keeps the `<shoot>.kubeconfig` ConfigMap of a shoot in sync with its
//! advertised addresses and cluster CA, and removes it once the shoot or its
//! shoot state is gone or being deleted.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::ObjectMeta;
use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};

use super::certificate::{cluster_ca_cert, validate_certificate};
use super::limiter::requeue_jitter;
use super::{
    kubeconfig_config_map_name, ControllerContext, BLOCK_OWNER_DELETION, CLUSTER_IDENTITY_NAME,
    CLUSTER_IDENTITY_NAMESPACE, KUBECONFIG_DATA_KEY, OPERATIONS_ROLE_LABEL, ROLE_KUBECONFIG,
};
use crate::crd::Shoot;
use crate::error::{is_quota_exceeded, OperatorError, OperatorResult};
use crate::kubeconfig::{ClusterEndpoint, KubeconfigRequest};

/// Requeue delay after errors expected to resolve on their own.
const TRANSIENT_ERROR_REQUEUE: Duration = Duration::from_secs(5);

/// Requeue delay after all other errors.
const ERROR_REQUEUE: Duration = Duration::from_secs(30);

/// Reconciler for shoot kubeconfig ConfigMaps.
#[derive(Clone)]
pub struct ShootReconciler {
    ctx: Arc<ControllerContext>,
}

impl ShootReconciler {
    /// Create a new shoot reconciler.
    pub fn new(ctx: Arc<ControllerContext>) -> Self {
        Self { ctx }
    }

    /// Reconcile the shoot `namespace/name`.
    ///
    /// The shoot and its state are always read from the API server, so a
    /// stale trigger cannot resurrect a deleted kubeconfig. When the namespace
    /// already runs its maximum number of reconciles the key is requeued
    /// after a short random delay.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile(&self, namespace: &str, name: &str) -> OperatorResult<Action> {
        let _permit = match self.ctx.limiter.enter(namespace) {
            Ok(permit) => permit,
            Err(limit) => {
                tracing::info!(
                    namespace = %limit.namespace,
                    name = %name,
                    "maximum parallel reconciles reached for namespace - requeuing the request"
                );
                return Ok(Action::requeue(requeue_jitter()));
            }
        };

        self.handle(namespace, name).await
    }

    async fn handle(&self, namespace: &str, name: &str) -> OperatorResult<Action> {
        let client = &self.ctx.client;
        let config_map_name = kubeconfig_config_map_name(name);

        let Some(shoot) = client.get_shoot(namespace, name).await? else {
            return self
                .cleanup(namespace, &config_map_name, "shoot does not exist anymore")
                .await;
        };

        let Some(shoot_state) = client.get_shoot_state(namespace, name).await? else {
            return self
                .cleanup(namespace, &config_map_name, "shoot state does not exist anymore")
                .await;
        };

        if shoot_state.meta().deletion_timestamp.is_some() {
            return self
                .cleanup(namespace, &config_map_name, "shoot state is in deletion")
                .await;
        }

        if shoot.meta().deletion_timestamp.is_some() {
            return self
                .cleanup(namespace, &config_map_name, "shoot is in deletion")
                .await;
        }

        if shoot.advertised_addresses().is_empty() {
            return Err(OperatorError::NoAdvertisedAddresses);
        }

        let ca_cert = cluster_ca_cert(&shoot_state)?;
        validate_certificate(&ca_cert)?;

        let garden_cluster_identity = self.garden_cluster_identity().await?;

        let request = kubeconfig_request(&shoot, garden_cluster_identity, &ca_cert)?;
        request.validate()?;
        let kubeconfig = request.generate()?;

        let desired = desired_config_map(&shoot, &kubeconfig)?;
        self.upsert(namespace, desired).await
    }

    /// Delete the kubeconfig ConfigMap. An absent ConfigMap is not an error.
    async fn cleanup(
        &self,
        namespace: &str,
        config_map_name: &str,
        reason: &str,
    ) -> OperatorResult<Action> {
        tracing::info!(
            namespace = %namespace,
            name = %config_map_name,
            reason = %reason,
            "Deleting kubeconfig ConfigMap"
        );

        self.ctx
            .client
            .delete_config_map(namespace, config_map_name)
            .await?;

        Ok(Action::await_change())
    }

    async fn garden_cluster_identity(&self) -> OperatorResult<String> {
        let config_map = self
            .ctx
            .client
            .get_config_map(CLUSTER_IDENTITY_NAMESPACE, CLUSTER_IDENTITY_NAME)
            .await
            .map_err(|e| OperatorError::ClusterIdentity(e.to_string()))?
            .ok_or_else(|| {
                OperatorError::ClusterIdentity(format!(
                    "configmap {CLUSTER_IDENTITY_NAMESPACE}/{CLUSTER_IDENTITY_NAME} not found"
                ))
            })?;

        let data = config_map.data.ok_or_else(|| {
            OperatorError::ClusterIdentity("cluster identity configmap data not set".to_string())
        })?;

        // A missing key is caught by request validation.
        Ok(data.get(CLUSTER_IDENTITY_NAME).cloned().unwrap_or_default())
    }

    async fn upsert(&self, namespace: &str, desired: ConfigMap) -> OperatorResult<Action> {
        let client = &self.ctx.client;
        let name = desired.name_any();

        let Some(existing) = client.get_config_map(namespace, &name).await? else {
            return match client.create_config_map(namespace, &desired).await {
                Ok(_) => {
                    tracing::info!(namespace = %namespace, name = %name, "Created kubeconfig ConfigMap");
                    Ok(Action::await_change())
                }
                Err(e) if is_quota_exceeded(&e) => {
                    tracing::warn!(
                        namespace = %namespace,
                        name = %name,
                        error = %e,
                        retry_after = ?self.ctx.quota_exceeded_retry_delay,
                        "ConfigMap quota exceeded"
                    );
                    Ok(Action::requeue(self.ctx.quota_exceeded_retry_delay))
                }
                Err(e) => Err(e.into()),
            };
        };

        match merge_config_map(&existing, &desired) {
            Some(updated) => {
                client.replace_config_map(namespace, &updated).await?;
                tracing::info!(namespace = %namespace, name = %name, "Updated kubeconfig ConfigMap");
            }
            None => {
                tracing::debug!(namespace = %namespace, name = %name, "Kubeconfig ConfigMap up to date");
            }
        }

        Ok(Action::await_change())
    }
}

/// Reconcile entry point for the kube-runtime controller.
pub async fn reconcile(shoot: Arc<Shoot>, ctx: Arc<ControllerContext>) -> OperatorResult<Action> {
    let namespace = shoot
        .namespace()
        .ok_or_else(|| OperatorError::InvalidResource("Shoot must be namespaced".into()))?;

    ShootReconciler::new(ctx)
        .reconcile(&namespace, &shoot.name_any())
        .await
}

/// Error policy for the shoot controller.
pub fn error_policy(
    shoot: Arc<Shoot>,
    error: &OperatorError,
    _ctx: Arc<ControllerContext>,
) -> Action {
    tracing::error!(
        namespace = %shoot.namespace().unwrap_or_default(),
        name = %shoot.name_any(),
        error = %error,
        "Reconciliation error"
    );

    if error.is_transient() {
        Action::requeue(TRANSIENT_ERROR_REQUEUE)
    } else {
        Action::requeue(ERROR_REQUEUE)
    }
}

/// Build the kubeconfig request of a shoot, one endpoint per advertised
/// address.
fn kubeconfig_request(
    shoot: &Shoot,
    garden_cluster_identity: String,
    ca_cert: &[u8],
) -> OperatorResult<KubeconfigRequest> {
    let clusters = shoot
        .advertised_addresses()
        .iter()
        .map(|address| {
            Ok(ClusterEndpoint {
                name: address.name.clone(),
                api_server_host: api_server_host(&address.url)?,
                ca_cert: Some(ca_cert.to_vec()),
            })
        })
        .collect::<OperatorResult<Vec<_>>>()?;

    Ok(KubeconfigRequest {
        namespace: shoot.namespace().unwrap_or_default(),
        shoot_name: shoot.name_any(),
        garden_cluster_identity,
        clusters,
    })
}

/// `host[:port]` of an advertised address, as written in the URL.
fn api_server_host(url: &str) -> OperatorResult<String> {
    let uri: http::Uri = url.parse().map_err(|e: http::uri::InvalidUri| {
        OperatorError::InvalidAddress {
            url: url.to_string(),
            reason: e.to_string(),
        }
    })?;

    let host = uri
        .authority()
        .map(|authority| authority.as_str())
        .map(|authority| authority.rsplit('@').next().unwrap_or(authority))
        .unwrap_or_default();

    Ok(host.to_string())
}

fn owner_reference(shoot: &Shoot) -> OperatorResult<OwnerReference> {
    let mut owner = shoot
        .controller_owner_ref(&())
        .ok_or_else(|| OperatorError::InvalidResource("Shoot has no uid".into()))?;
    owner.block_owner_deletion = Some(BLOCK_OWNER_DELETION);
    Ok(owner)
}

/// The kubeconfig ConfigMap a shoot should have.
pub fn desired_config_map(shoot: &Shoot, kubeconfig: &str) -> OperatorResult<ConfigMap> {
    Ok(ConfigMap {
        metadata: ObjectMeta {
            name: Some(kubeconfig_config_map_name(&shoot.name_any())),
            namespace: shoot.namespace(),
            owner_references: Some(vec![owner_reference(shoot)?]),
            labels: Some(
                [(OPERATIONS_ROLE_LABEL.to_string(), ROLE_KUBECONFIG.to_string())].into(),
            ),
            ..Default::default()
        },
        data: Some([(KUBECONFIG_DATA_KEY.to_string(), kubeconfig.to_string())].into()),
        ..Default::default()
    })
}

/// Merge the managed fields of `desired` into `existing`.
///
/// Owner references are replaced; the role label and kubeconfig data key are
/// set while other labels and data keys are kept. Returns `None` when
/// `existing` already matches.
pub fn merge_config_map(existing: &ConfigMap, desired: &ConfigMap) -> Option<ConfigMap> {
    let mut merged = existing.clone();

    merged.metadata.owner_references = desired.metadata.owner_references.clone();

    if let Some(labels) = &desired.metadata.labels {
        merged
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .extend(labels.clone());
    }

    if let Some(data) = &desired.data {
        merged
            .data
            .get_or_insert_with(Default::default)
            .extend(data.clone());
    }

    (merged != *existing).then_some(merged)
}
