//! Gardener `Shoot` resource.
//!
//! Only the parts of the resource read by the operator are modelled. Unknown
//! fields are ignored on deserialization; the operator never writes shoots.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Shoot represents a cluster managed by Gardener.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "core.gardener.cloud",
    version = "v1beta1",
    kind = "Shoot",
    plural = "shoots",
    namespaced,
    status = "ShootStatus",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ShootSpec {
    /// Name of the cloud profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_profile_name: Option<String>,

    /// Region of the shoot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Observed state of a shoot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShootStatus {
    /// Addresses at which the kube-apiserver of the shoot is reachable.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advertised_addresses: Vec<ShootAdvertisedAddress>,
}

/// A named kube-apiserver endpoint, e.g. `external` or `internal`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ShootAdvertisedAddress {
    /// Name of the address.
    pub name: String,
    /// URL of the kube-apiserver.
    pub url: String,
}

impl Shoot {
    /// Advertised addresses in the order published by Gardener.
    pub fn advertised_addresses(&self) -> &[ShootAdvertisedAddress] {
        self.status
            .as_ref()
            .map(|s| s.advertised_addresses.as_slice())
            .unwrap_or_default()
    }
}
