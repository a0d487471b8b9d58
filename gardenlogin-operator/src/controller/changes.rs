//! Typed change notifications derived from watch events.
//!
//! A watcher reports the current state of an object but not what it replaced.
//! [`ChangeTracker`] remembers the last state of every object it has seen so
//! that updates can be handed to predicates as concrete `(old, new)` pairs.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher;
use kube::Resource;

/// A change to a watched object.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<K> {
    /// First sighting of the object.
    Created(K),
    /// The object changed from `old` to `new`.
    Updated {
        /// Previously observed state.
        old: K,
        /// Current state.
        new: K,
    },
    /// The object is gone.
    Deleted(K),
}

impl<K> Change<K> {
    /// The most recent state of the object.
    pub fn object(&self) -> &K {
        match self {
            Change::Created(obj) | Change::Deleted(obj) => obj,
            Change::Updated { new, .. } => new,
        }
    }

    /// Consume the change, keeping the most recent state.
    pub fn into_object(self) -> K {
        match self {
            Change::Created(obj) | Change::Deleted(obj) => obj,
            Change::Updated { new, .. } => new,
        }
    }

    /// Apply an update predicate. Creations and deletions always pass.
    pub fn passes<F>(&self, predicate: F) -> bool
    where
        F: FnOnce(&K, &K) -> bool,
    {
        match self {
            Change::Updated { old, new } => predicate(old, new),
            Change::Created(_) | Change::Deleted(_) => true,
        }
    }
}

/// Converts [`watcher::Event`]s into [`Change`]s.
pub struct ChangeTracker<K>
where
    K: Resource,
    K::DynamicType: Eq + Hash,
{
    known: HashMap<ObjectRef<K>, K>,
    relisted: Option<HashSet<ObjectRef<K>>>,
}

impl<K> Default for ChangeTracker<K>
where
    K: Resource,
    K::DynamicType: Eq + Hash,
{
    fn default() -> Self {
        Self {
            known: HashMap::new(),
            relisted: None,
        }
    }
}

impl<K> ChangeTracker<K>
where
    K: Resource + Clone,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently known.
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Whether no object is known.
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Record a watch event and return the resulting changes.
    ///
    /// A relist (`Init` .. `InitDone`) reports every listed object as created
    /// or updated and every previously known object missing from the list as
    /// deleted.
    pub fn track(&mut self, event: watcher::Event<K>) -> Vec<Change<K>> {
        match event {
            watcher::Event::Apply(obj) => vec![self.apply(obj)],
            watcher::Event::Delete(obj) => {
                self.known.remove(&ObjectRef::from_obj(&obj));
                vec![Change::Deleted(obj)]
            }
            watcher::Event::Init => {
                self.relisted = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(obj) => {
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(ObjectRef::from_obj(&obj));
                }
                vec![self.apply(obj)]
            }
            watcher::Event::InitDone => {
                let Some(relisted) = self.relisted.take() else {
                    return Vec::new();
                };

                let gone: Vec<ObjectRef<K>> = self
                    .known
                    .keys()
                    .filter(|key| !relisted.contains(*key))
                    .cloned()
                    .collect();

                gone.into_iter()
                    .filter_map(|key| self.known.remove(&key))
                    .map(Change::Deleted)
                    .collect()
            }
        }
    }

    fn apply(&mut self, obj: K) -> Change<K> {
        match self.known.insert(ObjectRef::from_obj(&obj), obj.clone()) {
            Some(old) => Change::Updated { old, new: obj },
            None => Change::Created(obj),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use k8s_openapi::api::core::v1::ConfigMap;

    fn config_map(name: &str, kubeconfig: &str) -> ConfigMap {
        testing::kubeconfig_config_map("garden-ns1", name, Some("kubeconfig"), Some(kubeconfig))
    }

    #[test]
    fn apply_reports_created_then_updated() {
        let mut tracker = ChangeTracker::new();

        let changes = tracker.track(watcher::Event::Apply(config_map("a", "v1")));
        assert_eq!(changes, vec![Change::Created(config_map("a", "v1"))]);

        let changes = tracker.track(watcher::Event::Apply(config_map("a", "v2")));
        assert_eq!(
            changes,
            vec![Change::Updated {
                old: config_map("a", "v1"),
                new: config_map("a", "v2"),
            }]
        );
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn delete_forgets_object() {
        let mut tracker = ChangeTracker::new();
        tracker.track(watcher::Event::Apply(config_map("a", "v1")));

        let changes = tracker.track(watcher::Event::Delete(config_map("a", "v1")));
        assert_eq!(changes, vec![Change::Deleted(config_map("a", "v1"))]);
        assert!(tracker.is_empty());

        let changes = tracker.track(watcher::Event::Apply(config_map("a", "v1")));
        assert!(matches!(changes.as_slice(), [Change::Created(_)]));
    }

    #[test]
    fn same_name_in_other_namespace_is_distinct() {
        let mut tracker = ChangeTracker::new();
        tracker.track(watcher::Event::Apply(config_map("a", "v1")));

        let other = testing::kubeconfig_config_map("garden-ns2", "a", None, None);
        let changes = tracker.track(watcher::Event::Apply(other));
        assert!(matches!(changes.as_slice(), [Change::Created(_)]));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn relist_reports_missing_objects_as_deleted() {
        let mut tracker = ChangeTracker::new();
        tracker.track(watcher::Event::Apply(config_map("a", "v1")));
        tracker.track(watcher::Event::Apply(config_map("b", "v1")));

        assert!(tracker.track(watcher::Event::Init).is_empty());

        let changes = tracker.track(watcher::Event::InitApply(config_map("a", "v2")));
        assert!(matches!(changes.as_slice(), [Change::Updated { .. }]));

        let changes = tracker.track(watcher::Event::InitApply(config_map("c", "v1")));
        assert!(matches!(changes.as_slice(), [Change::Created(_)]));

        let changes = tracker.track(watcher::Event::InitDone);
        assert_eq!(changes, vec![Change::Deleted(config_map("b", "v1"))]);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn init_done_without_init_is_ignored() {
        let mut tracker = ChangeTracker::new();
        tracker.track(watcher::Event::Apply(config_map("a", "v1")));

        assert!(tracker.track(watcher::Event::InitDone).is_empty());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn predicate_only_applies_to_updates() {
        let never = |_: &ConfigMap, _: &ConfigMap| false;

        assert!(Change::Created(config_map("a", "v1")).passes(never));
        assert!(Change::Deleted(config_map("a", "v1")).passes(never));
        assert!(!Change::Updated {
            old: config_map("a", "v1"),
            new: config_map("a", "v2"),
        }
        .passes(never));
    }

    #[test]
    fn object_is_latest_state() {
        let change = Change::Updated {
            old: config_map("a", "v1"),
            new: config_map("a", "v2"),
        };
        assert_eq!(change.object(), &config_map("a", "v2"));
        assert_eq!(change.into_object(), config_map("a", "v2"));
    }
}
