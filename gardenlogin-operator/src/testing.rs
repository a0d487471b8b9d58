//! Fixtures shared by unit tests.

use std::collections::BTreeMap;

use base64::Engine;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;

use crate::controller::{KUBECONFIG_DATA_KEY, OPERATIONS_ROLE_LABEL};
use crate::crd::{
    GardenerResourceData, Shoot, ShootAdvertisedAddress, ShootSpec, ShootState, ShootStateSpec,
    ShootStatus,
};

/// A self-signed CA certificate in PEM form.
pub(crate) fn ca_pem() -> String {
    let certified = rcgen::generate_simple_self_signed(vec!["garden.example.com".to_string()])
        .expect("self-signed certificate");
    certified.cert.pem()
}

pub(crate) fn shoot(namespace: &str, name: &str, addresses: &[(&str, &str)]) -> Shoot {
    let mut shoot = Shoot::new(name, ShootSpec::default());
    shoot.metadata.namespace = Some(namespace.to_string());
    shoot.metadata.uid = Some(format!("uid-{name}"));
    shoot.status = Some(ShootStatus {
        advertised_addresses: addresses
            .iter()
            .map(|(name, url)| ShootAdvertisedAddress {
                name: name.to_string(),
                url: url.to_string(),
            })
            .collect(),
    });
    shoot
}

pub(crate) fn shoot_state(namespace: &str, name: &str, ca_pem: Option<&str>) -> ShootState {
    let gardener = ca_pem
        .map(|pem| {
            vec![GardenerResourceData {
                name: "ca".to_string(),
                type_: "certificate".to_string(),
                data: serde_json::json!({
                    "certificate": base64::engine::general_purpose::STANDARD.encode(pem),
                    "privateKey": base64::engine::general_purpose::STANDARD.encode("KEY"),
                }),
            }]
        })
        .unwrap_or_default();

    let mut state = ShootState::new(name, ShootStateSpec { gardener });
    state.metadata.namespace = Some(namespace.to_string());
    state
}

pub(crate) fn kubeconfig_config_map(
    namespace: &str,
    name: &str,
    role: Option<&str>,
    kubeconfig: Option<&str>,
) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: role.map(|role| {
                BTreeMap::from([(OPERATIONS_ROLE_LABEL.to_string(), role.to_string())])
            }),
            ..Default::default()
        },
        data: kubeconfig.map(|k| BTreeMap::from([(KUBECONFIG_DATA_KEY.to_string(), k.to_string())])),
        ..Default::default()
    }
}

pub(crate) fn cluster_identity_config_map(identity: Option<&str>) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some("cluster-identity".to_string()),
            namespace: Some("kube-system".to_string()),
            ..Default::default()
        },
        data: identity.map(|id| BTreeMap::from([("cluster-identity".to_string(), id.to_string())])),
        ..Default::default()
    }
}
