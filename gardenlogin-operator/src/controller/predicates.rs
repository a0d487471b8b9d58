//! Update predicates for the watched resources.
//!
//! Each predicate decides whether an update from `old` to `new` is relevant
//! for the kubeconfig ConfigMap of a shoot. Creations and deletions are not
//! filtered; see [`Change::passes`](super::Change::passes).

use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;

use super::certificate::cluster_ca_cert;
use super::{KUBECONFIG_DATA_KEY, OPERATIONS_ROLE_LABEL, ROLE_KUBECONFIG};
use crate::crd::{Shoot, ShootState};

/// Passes when the advertised addresses differ in count, name or URL.
pub fn shoot_addresses_changed(old: &Shoot, new: &Shoot) -> bool {
    let old = old.advertised_addresses();
    let new = new.advertised_addresses();

    if old.len() != new.len() {
        return true;
    }

    old.iter()
        .zip(new)
        .any(|(old, new)| old.name != new.name || old.url != new.url)
}

/// Passes for kubeconfig ConfigMaps whose role label or kubeconfig changed.
///
/// ConfigMaps carrying the kubeconfig role on neither side are ignored.
pub fn kubeconfig_config_map_changed(old: &ConfigMap, new: &ConfigMap) -> bool {
    let old_role = role(old);
    let new_role = role(new);

    if old_role != ROLE_KUBECONFIG && new_role != ROLE_KUBECONFIG {
        return false;
    }

    old_role != new_role || kubeconfig(old) != kubeconfig(new)
}

/// Compares the cluster CA of two shoot states.
///
/// Returns `true` when both CAs are present and *equal*, and `false` when
/// they differ or either side has no readable CA. CA rotations are therefore
/// filtered while unrelated updates of a shoot state pass.
pub fn shoot_state_ca_changed(old: &ShootState, new: &ShootState) -> bool {
    let old_ca = match cluster_ca_cert(old) {
        Ok(ca) => ca,
        Err(error) => {
            tracing::warn!(
                namespace = %old.namespace().unwrap_or_default(),
                name = %old.name_any(),
                error = %error,
                "Update event failed to read cluster ca from old ShootState"
            );
            return false;
        }
    };

    let new_ca = match cluster_ca_cert(new) {
        Ok(ca) => ca,
        Err(error) => {
            tracing::warn!(
                namespace = %new.namespace().unwrap_or_default(),
                name = %new.name_any(),
                error = %error,
                "Update event failed to read cluster ca from new ShootState"
            );
            return false;
        }
    };

    old_ca == new_ca
}

fn role(config_map: &ConfigMap) -> &str {
    config_map
        .labels()
        .get(OPERATIONS_ROLE_LABEL)
        .map(String::as_str)
        .unwrap_or_default()
}

fn kubeconfig(config_map: &ConfigMap) -> &str {
    config_map
        .data
        .as_ref()
        .and_then(|data| data.get(KUBECONFIG_DATA_KEY))
        .map(String::as_str)
        .unwrap_or_default()
}
