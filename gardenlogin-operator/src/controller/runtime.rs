//! Controller wiring.
//!
//! Shoots drive the controller. ShootStates trigger the shoot of the same
//! name, and kubeconfig ConfigMaps trigger their owning shoot. Every watch is
//! passed through a [`ChangeTracker`] so that only relevant updates reach the
//! reconciler.

use std::hash::Hash;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ListParams;
use kube::runtime::controller::Config;
use kube::runtime::reflector::{self, ObjectRef};
use kube::runtime::{watcher, Controller, WatchStreamExt};
use kube::{Api, Client, Resource, ResourceExt};

use super::changes::ChangeTracker;
use super::client::KubeApiClient;
use super::predicates::{
    kubeconfig_config_map_changed, shoot_addresses_changed, shoot_state_ca_changed,
};
use super::shoot::{error_policy, reconcile};
use super::ControllerContext;
use crate::config::ShootControllerConfiguration;
use crate::crd::{Shoot, ShootState};
use crate::error::OperatorResult;

/// Run the shoot controller until a termination signal is received.
///
/// Fails early when the Gardener resources cannot be listed, e.g. because the
/// API groups are not served by the cluster.
pub async fn run(client: Client, config: &ShootControllerConfiguration) -> OperatorResult<()> {
    let shoots: Api<Shoot> = Api::all(client.clone());
    let shoot_states: Api<ShootState> = Api::all(client.clone());
    let config_maps: Api<ConfigMap> = Api::all(client.clone());

    shoots.list(&ListParams::default().limit(1)).await?;
    shoot_states.list(&ListParams::default().limit(1)).await?;

    let ctx = Arc::new(ControllerContext::new(
        Arc::new(KubeApiClient::new(client)),
        config,
    ));

    let (store, writer) = reflector::store();
    let shoot_stream = changed_objects(
        reflector::reflector(writer, watcher(shoots, watcher::Config::default())).default_backoff(),
        shoot_addresses_changed,
    );
    let shoot_state_stream = changed_objects(
        watcher(shoot_states, watcher::Config::default()).default_backoff(),
        shoot_state_ca_changed,
    );
    let config_map_stream = changed_objects(
        watcher(config_maps, watcher::Config::default()).default_backoff(),
        kubeconfig_config_map_changed,
    );

    let concurrency = u16::try_from(config.max_concurrent_reconciles).unwrap_or(u16::MAX);

    tracing::info!(
        max_concurrent_reconciles = config.max_concurrent_reconciles,
        max_concurrent_reconciles_per_namespace = config.max_concurrent_reconciles_per_namespace,
        "Starting shoot controller"
    );

    Controller::for_stream(shoot_stream, store)
        .owns_stream(config_map_stream)
        .watches_stream(shoot_state_stream, shoot_for_state)
        .with_config(Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((shoot, action)) => {
                    tracing::debug!(shoot = %shoot, ?action, "Reconciled shoot");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Shoot controller error");
                }
            }
        })
        .await;

    tracing::info!("Shoot controller stopped");
    Ok(())
}

/// Turn a watch event stream into the objects whose changes pass `predicate`.
fn changed_objects<K, S>(
    events: S,
    predicate: fn(&K, &K) -> bool,
) -> impl Stream<Item = Result<K, watcher::Error>> + Send + 'static
where
    K: Resource + Clone + Send + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Send,
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>> + Send + 'static,
{
    let mut tracker = ChangeTracker::new();

    events.flat_map(move |event| {
        let objects: Vec<Result<K, watcher::Error>> = match event {
            Ok(event) => tracker
                .track(event)
                .into_iter()
                .filter(|change| change.passes(predicate))
                .map(|change| Ok(change.into_object()))
                .collect(),
            Err(e) => vec![Err(e)],
        };
        futures::stream::iter(objects)
    })
}

/// A shoot state belongs to the shoot of the same name and namespace.
fn shoot_for_state(state: ShootState) -> Option<ObjectRef<Shoot>> {
    let namespace = state.namespace()?;
    Some(ObjectRef::new(&state.name_any()).within(&namespace))
}
