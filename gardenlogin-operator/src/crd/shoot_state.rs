//! Gardener `ShootState` resource.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ShootState holds the data Gardener needs to reconstruct a shoot's secrets,
/// including the cluster certificate authority.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "core.gardener.cloud",
    version = "v1alpha1",
    kind = "ShootState",
    plural = "shootstates",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ShootStateSpec {
    /// Data generated by Gardener for the shoot.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gardener: Vec<GardenerResourceData>,
}

/// A named, typed entry of opaque Gardener data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GardenerResourceData {
    /// Name of the entry, e.g. `ca`.
    pub name: String,
    /// Type of the entry, e.g. `certificate`.
    #[serde(rename = "type")]
    pub type_: String,
    /// Raw entry payload.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ShootState {
    /// Look up a resource data entry by name.
    pub fn resource_data(&self, name: &str) -> Option<&GardenerResourceData> {
        self.spec.gardener.iter().find(|d| d.name == name)
    }
}
