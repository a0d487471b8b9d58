//! Controller manager configuration.
//!
//! The configuration is read from an optional YAML file. Values missing from
//! the file keep their defaults, and the merged result is validated before use.
//!
//! ```yaml
//! apiVersion: gardenlogin.config.gardener.cloud/v1alpha1
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

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for this schema.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A value failed validation.
    #[error("{field}: Invalid value: {value}: {reason}")]
    Invalid {
        /// Dotted field path.
        field: &'static str,
        /// Rejected value.
        value: String,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

/// Configuration of the gardenlogin controller manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerManagerConfiguration {
    /// Optional kind of the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Optional API version of the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Controller settings.
    #[serde(default)]
    pub controllers: ControllersConfiguration,

    /// Admission webhook settings.
    #[serde(default)]
    pub webhooks: WebhooksConfiguration,
}

/// Configuration of the controllers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllersConfiguration {
    /// Shoot controller settings.
    #[serde(default)]
    pub shoot: ShootControllerConfiguration,
}

/// Configuration of the shoot controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShootControllerConfiguration {
    /// Maximum number of reconciles running at the same time.
    #[serde(default = "default_max_concurrent_reconciles")]
    pub max_concurrent_reconciles: usize,

    /// Maximum number of reconciles running at the same time within one namespace.
    #[serde(default = "default_max_concurrent_reconciles_per_namespace")]
    pub max_concurrent_reconciles_per_namespace: usize,

    /// Delay before retrying when the ConfigMap quota of a namespace is exhausted.
    #[serde(
        default = "default_quota_exceeded_retry_delay",
        with = "humantime_serde"
    )]
    pub quota_exceeded_retry_delay: Duration,
}

/// Configuration of the admission webhooks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhooksConfiguration {
    /// Kubeconfig ConfigMap validation settings.
    #[serde(default)]
    pub config_map_validation: ConfigMapValidationConfiguration,
}

/// Configuration of the ConfigMap validating webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapValidationConfiguration {
    /// Maximum size of an admitted ConfigMap in bytes.
    #[serde(default = "default_max_object_size")]
    pub max_object_size: usize,
}

fn default_max_concurrent_reconciles() -> usize {
    50
}

fn default_max_concurrent_reconciles_per_namespace() -> usize {
    3
}

fn default_quota_exceeded_retry_delay() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_max_object_size() -> usize {
    100 * 1024
}

impl Default for ControllerManagerConfiguration {
    fn default() -> Self {
        Self {
            kind: None,
            api_version: None,
            controllers: ControllersConfiguration::default(),
            webhooks: WebhooksConfiguration::default(),
        }
    }
}

impl Default for ShootControllerConfiguration {
    fn default() -> Self {
        Self {
            max_concurrent_reconciles: default_max_concurrent_reconciles(),
            max_concurrent_reconciles_per_namespace:
                default_max_concurrent_reconciles_per_namespace(),
            quota_exceeded_retry_delay: default_quota_exceeded_retry_delay(),
        }
    }
}

impl Default for ConfigMapValidationConfiguration {
    fn default() -> Self {
        Self {
            max_object_size: default_max_object_size(),
        }
    }
}

impl ControllerManagerConfiguration {
    /// Load the configuration, applying defaults and validating the result.
    ///
    /// Without a path the defaults are returned.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                Self::from_yaml(&content).map_err(|e| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: e,
                })?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document. Empty documents yield the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// Check value constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let shoot = &self.controllers.shoot;

        if shoot.max_concurrent_reconciles < 1 {
            return Err(ConfigError::Invalid {
                field: "controllers.shoot.maxConcurrentReconciles",
                value: shoot.max_concurrent_reconciles.to_string(),
                reason: "must be 1 or greater",
            });
        }

        if shoot.max_concurrent_reconciles_per_namespace > shoot.max_concurrent_reconciles {
            return Err(ConfigError::Invalid {
                field: "controllers.shoot.maxConcurrentReconcilesPerNamespace",
                value: shoot.max_concurrent_reconciles_per_namespace.to_string(),
                reason: "must not be greater than maxConcurrentReconciles",
            });
        }

        Ok(())
    }
}
