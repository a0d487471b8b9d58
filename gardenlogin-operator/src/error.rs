//! Error types for the gardenlogin operator.

use thiserror::Error;

use crate::kubeconfig::KubeconfigError;

/// Errors that can occur while reconciling shoots or serving admission requests.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Kubernetes API error.
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// The shoot state does not carry a cluster CA yet.
    #[error("certificate authority not yet provisioned")]
    CaNotProvisioned,

    /// The cluster CA entry exists but cannot be read as certificate data.
    #[error("failed to get ca infoData: {0}")]
    CaConversion(String),

    /// The cluster CA is not a parseable X.509 certificate.
    #[error("an error occured validating the ca certificate: {0}")]
    InvalidCertificate(String),

    /// The shoot does not advertise any kube-apiserver address.
    #[error("no kube-apiserver advertised addresses in Shoot .status.advertisedAddresses")]
    NoAdvertisedAddresses,

    /// An advertised address is not a valid URL.
    #[error("could not parse shoot server url {url}: {reason}")]
    InvalidAddress {
        /// The offending URL.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// The garden cluster identity could not be determined.
    #[error("failed to fetch garden cluster identity: {0}")]
    ClusterIdentity(String),

    /// Kubeconfig request validation or generation failed.
    #[error(transparent)]
    Kubeconfig(#[from] KubeconfigError),

    /// The reconciled object is missing required metadata.
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type for operator operations.
pub type OperatorResult<T> = Result<T, OperatorError>;

impl From<serde_json::Error> for OperatorError {
    fn from(err: serde_json::Error) -> Self {
        OperatorError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for OperatorError {
    fn from(err: serde_yaml::Error) -> Self {
        OperatorError::SerializationError(err.to_string())
    }
}

impl OperatorError {
    /// Whether the error is expected to resolve without any input change.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OperatorError::KubeError(_)
                | OperatorError::CaNotProvisioned
                | OperatorError::ClusterIdentity(_)
        )
    }
}

/// Returns true when the API server answered with 404.
pub(crate) fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}

/// Returns true when a write was rejected by a resource quota.
pub(crate) fn is_quota_exceeded(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 403 && resp.message.contains("exceeded quota"))
}
