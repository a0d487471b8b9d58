//! Kubernetes API access used by the shoot reconciler.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Client, ResourceExt};

#[cfg(test)]
use mockall::automock;

use crate::crd::{Shoot, ShootState};
use crate::error::is_not_found;

/// Trait abstracting the Kubernetes reads and writes of the reconciler.
///
/// Lookups return `Ok(None)` for objects that do not exist.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Get a shoot.
    async fn get_shoot(&self, namespace: &str, name: &str) -> Result<Option<Shoot>, kube::Error>;

    /// Get the shoot state of a shoot.
    async fn get_shoot_state(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ShootState>, kube::Error>;

    /// Get a ConfigMap.
    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>, kube::Error>;

    /// Create a ConfigMap.
    async fn create_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<ConfigMap, kube::Error>;

    /// Replace an existing ConfigMap. The resource version of `config_map`
    /// guards against concurrent writers.
    async fn replace_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<ConfigMap, kube::Error>;

    /// Delete a ConfigMap. Deleting an absent ConfigMap succeeds.
    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), kube::Error>;
}

/// [`KubeClient`] backed by a [`kube::Client`].
#[derive(Clone)]
pub struct KubeApiClient {
    client: Client,
}

impl KubeApiClient {
    /// Wrap the given client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KubeClient for KubeApiClient {
    async fn get_shoot(&self, namespace: &str, name: &str) -> Result<Option<Shoot>, kube::Error> {
        let api: Api<Shoot> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name).await
    }

    async fn get_shoot_state(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ShootState>, kube::Error> {
        let api: Api<ShootState> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name).await
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>, kube::Error> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name).await
    }

    async fn create_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<ConfigMap, kube::Error> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), config_map).await
    }

    async fn replace_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<ConfigMap, kube::Error> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        api.replace(&config_map.name_any(), &PostParams::default(), config_map)
            .await
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), kube::Error> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);

        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
