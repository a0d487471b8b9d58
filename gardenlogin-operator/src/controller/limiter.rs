//! Per-namespace admission control for shoot reconciles.
//!
//! The controller runtime bounds the total number of concurrent reconciles.
//! [`NamespaceLimiter`] additionally bounds how many of them may work on the
//! same namespace, so that a single project with many shoots cannot starve
//! all others. A rejected reconcile is not an error: the caller requeues the
//! key after [`requeue_jitter`].

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use thiserror::Error;

/// Base delay before retrying a reconcile rejected by the limiter.
pub const REQUEUE_BASE_DELAY: Duration = Duration::from_millis(100);

/// Upper bound of the random factor added on top of [`REQUEUE_BASE_DELAY`].
pub const REQUEUE_MAX_FACTOR: f64 = 50.0;

/// The namespace already runs the maximum number of reconciles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("maximum parallel reconciles reached for namespace {namespace}")]
pub struct LimitReached {
    /// Namespace that is at capacity.
    pub namespace: String,
}

/// Counts in-flight reconciles per namespace.
#[derive(Debug)]
pub struct NamespaceLimiter {
    counters: Mutex<HashMap<String, usize>>,
    max_concurrent: usize,
    max_per_namespace: usize,
}

/// Slot held by a running reconcile. Dropping it releases the slot.
#[derive(Debug)]
#[must_use = "dropping the permit releases the namespace slot immediately"]
pub struct NamespacePermit<'a> {
    limiter: &'a NamespaceLimiter,
    namespace: String,
}

impl NamespaceLimiter {
    /// Create a limiter.
    ///
    /// `max_concurrent` is the global bound handed to the controller runtime;
    /// `max_per_namespace` is enforced by [`NamespaceLimiter::enter`].
    pub fn new(max_concurrent: usize, max_per_namespace: usize) -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            max_concurrent,
            max_per_namespace,
        }
    }

    /// Global concurrency bound.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Per-namespace concurrency bound.
    pub fn max_per_namespace(&self) -> usize {
        self.max_per_namespace
    }

    /// Claim a slot for `namespace`.
    ///
    /// A rejected attempt leaves the counter untouched.
    pub fn enter(&self, namespace: &str) -> Result<NamespacePermit<'_>, LimitReached> {
        let mut counters = self.counters.lock();

        let next = counters.get(namespace).copied().unwrap_or(0) + 1;
        if next > self.max_per_namespace {
            return Err(LimitReached {
                namespace: namespace.to_string(),
            });
        }
        counters.insert(namespace.to_string(), next);

        Ok(NamespacePermit {
            limiter: self,
            namespace: namespace.to_string(),
        })
    }

    /// Release a slot of `namespace`.
    ///
    /// Called by [`NamespacePermit`] on drop; every successful `enter` must be
    /// paired with exactly one `exit`.
    ///
    /// # Panics
    ///
    /// Panics if the namespace has no claimed slot, which means the
    /// enter/exit pairing is broken.
    pub fn exit(&self, namespace: &str) {
        let mut counters = self.counters.lock();

        let Some(count) = counters.get_mut(namespace) else {
            drop(counters);
            panic!("namespace counter for {namespace} released without a matching enter");
        };

        *count -= 1;
        if *count == 0 {
            counters.remove(namespace);
        }
    }

    /// Number of reconciles currently running in `namespace`.
    pub fn active(&self, namespace: &str) -> usize {
        self.counters.lock().get(namespace).copied().unwrap_or(0)
    }

    /// Number of namespaces with at least one running reconcile.
    pub fn tracked_namespaces(&self) -> usize {
        self.counters.lock().len()
    }
}

impl NamespacePermit<'_> {
    /// Namespace the permit was granted for.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl Drop for NamespacePermit<'_> {
    fn drop(&mut self) {
        self.limiter.exit(&self.namespace);
    }
}

/// Randomized delay before retrying a rejected reconcile, between 100ms and
/// roughly 5s, so that rejected keys do not retry in lockstep.
pub fn requeue_jitter() -> Duration {
    jitter(REQUEUE_BASE_DELAY, REQUEUE_MAX_FACTOR)
}

/// Returns a duration in `[base, base + max_factor * base)`.
///
/// A non-positive `max_factor` is treated as 1.
pub fn jitter(base: Duration, max_factor: f64) -> Duration {
    let max_factor = if max_factor <= 0.0 { 1.0 } else { max_factor };
    let factor: f64 = rand::thread_rng().gen::<f64>() * max_factor;
    base + base.mul_f64(factor)
}
