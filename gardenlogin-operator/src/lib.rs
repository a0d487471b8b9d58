//! Gardenlogin operator
//!
//! Publishes a kubeconfig for every Gardener shoot as a ConfigMap
//! `<shoot>.kubeconfig` in the shoot's project namespace. The kubeconfig
//! holds no credentials: clients authenticate through the `gardenlogin`
//! kubectl plugin, which is told by an exec extension which shoot and garden
//! it talks to.
//!
//! # Components
//!
//! - [`controller`]: watches shoots, shoot states and kubeconfig ConfigMaps
//!   and keeps the ConfigMaps up to date
//! - [`webhook`]: validating admission webhook for kubeconfig ConfigMaps
//! - [`kubeconfig`]: kubeconfig generation
//! - [`config`]: controller manager configuration file
//!
//! # Example configuration
//!
//! ```yaml
//! apiVersion: config.gardenlogin.gardener.cloud/v1alpha1
//! kind: ControllerManagerConfiguration
//! controllers:
//!   shoot:
//!     maxConcurrentReconciles: 50
//!     maxConcurrentReconcilesPerNamespace: 3
//!     quotaExceededRetryDelay: 24h
//! webhooks:
//!   configMapValidation:
//!     maxObjectSize: 102400
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod kubeconfig;
pub mod webhook;

#[cfg(test)]
mod testing;

pub use config::ControllerManagerConfiguration;
pub use crd::{Shoot, ShootState};
pub use error::{OperatorError, OperatorResult};
