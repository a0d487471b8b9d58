//! Validation of kubeconfig ConfigMaps.

use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use serde_json::value::RawValue;

use super::review::{AdmissionRequest, AdmissionResponse, Operation};
use crate::config::ConfigMapValidationConfiguration;
use crate::controller::KUBECONFIG_DATA_KEY;

/// Reason attached to admitted requests.
pub const ALLOWED_REASON: &str = "allowed to be admitted";

/// Validates admission requests for kubeconfig ConfigMaps.
///
/// Validation is synchronous and does not touch the API server.
#[derive(Debug, Clone)]
pub struct ConfigMapValidator {
    max_object_size: usize,
}

impl ConfigMapValidator {
    /// Create a validator rejecting objects above `max_object_size` bytes.
    pub fn new(max_object_size: usize) -> Self {
        Self { max_object_size }
    }

    /// Create a validator from the webhook configuration.
    pub fn from_config(config: &ConfigMapValidationConfiguration) -> Self {
        Self::new(config.max_object_size)
    }

    /// Maximum accepted object size in bytes.
    pub fn max_object_size(&self) -> usize {
        self.max_object_size
    }

    /// Review a single admission request.
    pub fn validate(&self, request: &AdmissionRequest) -> AdmissionResponse {
        let uid = request.uid.clone();

        let size = request.object.as_ref().map_or(0, |raw| raw.get().len());
        if size > self.max_object_size {
            tracing::warn!(
                uid = %uid,
                obj_size = size,
                max_obj_size = self.max_object_size,
                "maxObjectSize exceeded"
            );
            return AdmissionResponse::errored(
                uid,
                400,
                format!(
                    "resource must not have more than {} bytes",
                    self.max_object_size
                ),
            );
        }

        let config_map = match decode(request.object.as_deref()) {
            Ok(config_map) => config_map,
            Err(message) => return AdmissionResponse::errored(uid, 400, message),
        };

        if request.operation != Operation::Create {
            if let Err(message) = decode(request.old_object.as_deref()) {
                return AdmissionResponse::errored(uid, 400, message);
            }
        }

        match validate_required_fields(&config_map) {
            Ok(()) => AdmissionResponse::allowed(uid, ALLOWED_REASON),
            Err(reason) => {
                tracing::info!(
                    uid = %uid,
                    namespace = %request.namespace.as_deref().unwrap_or_default(),
                    name = %config_map.name_any(),
                    reason = %reason,
                    "admission request denied"
                );
                AdmissionResponse::denied(uid, reason)
            }
        }
    }
}

fn decode(raw: Option<&RawValue>) -> Result<ConfigMap, String> {
    let raw = raw.ok_or_else(|| "there is no content to decode".to_string())?;
    serde_json::from_str(raw.get()).map_err(|e| e.to_string())
}

/// Ensure `data.kubeconfig` is present and not empty.
fn validate_required_fields(config_map: &ConfigMap) -> Result<(), String> {
    let kubeconfig = config_map
        .data
        .as_ref()
        .and_then(|data| data.get(KUBECONFIG_DATA_KEY))
        .map(String::as_str)
        .unwrap_or_default();

    if kubeconfig.is_empty() {
        return Err(format!(
            "data.{KUBECONFIG_DATA_KEY}: Required value: field is required"
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 102_400;

    fn raw(json: String) -> Option<Box<RawValue>> {
        Some(RawValue::from_string(json).unwrap())
    }

    /// A ConfigMap document of exactly `size` bytes.
    fn config_map_of_size(size: usize) -> String {
        let empty = r#"{"apiVersion":"v1","kind":"ConfigMap","data":{"kubeconfig":""}}"#;
        let padding = "x".repeat(size - empty.len());
        format!(r#"{{"apiVersion":"v1","kind":"ConfigMap","data":{{"kubeconfig":"{padding}"}}}}"#)
    }

    fn request(operation: Operation, object: Option<Box<RawValue>>) -> AdmissionRequest {
        AdmissionRequest {
            uid: "705ab4f5-6393-11e8-b7cc-42010a800002".to_string(),
            operation,
            namespace: Some("garden-ns1".to_string()),
            name: Some("shoot-a.kubeconfig".to_string()),
            object,
            old_object: None,
        }
    }

    fn kubeconfig_object(kubeconfig: Option<&str>) -> Option<Box<RawValue>> {
        let object = crate::testing::kubeconfig_config_map(
            "garden-ns1",
            "shoot-a.kubeconfig",
            Some("kubeconfig"),
            kubeconfig,
        );
        raw(serde_json::to_string(&object).unwrap())
    }

    #[test]
    fn allows_kubeconfig() {
        let response = ConfigMapValidator::new(MAX)
            .validate(&request(Operation::Create, kubeconfig_object(Some("apiVersion: v1"))));

        assert!(response.allowed);
        assert_eq!(response.uid, "705ab4f5-6393-11e8-b7cc-42010a800002");
        let status = response.status.unwrap();
        assert_eq!(status.code, 200);
        assert_eq!(status.reason.as_deref(), Some(ALLOWED_REASON));
    }

    #[test]
    fn object_at_limit_is_admitted() {
        let object = config_map_of_size(MAX);
        assert_eq!(object.len(), MAX);

        let response =
            ConfigMapValidator::new(MAX).validate(&request(Operation::Create, raw(object)));
        assert!(response.allowed);
    }

    #[test]
    fn object_above_limit_is_rejected() {
        let object = config_map_of_size(MAX + 1);
        assert_eq!(object.len(), 102_401);

        let response =
            ConfigMapValidator::new(MAX).validate(&request(Operation::Create, raw(object)));

        assert!(!response.allowed);
        let status = response.status.unwrap();
        assert_eq!(status.code, 400);
        assert_eq!(
            status.message.as_deref(),
            Some("resource must not have more than 102400 bytes")
        );
    }

    #[test]
    fn empty_kubeconfig_is_denied() {
        for kubeconfig in [None, Some("")] {
            let response = ConfigMapValidator::new(MAX)
                .validate(&request(Operation::Create, kubeconfig_object(kubeconfig)));

            assert!(!response.allowed);
            let status = response.status.unwrap();
            assert_eq!(status.code, 403);
            assert_eq!(
                status.reason.as_deref(),
                Some("data.kubeconfig: Required value: field is required")
            );
        }
    }

    #[test]
    fn undecodable_object_is_bad_request() {
        let response = ConfigMapValidator::new(MAX)
            .validate(&request(Operation::Create, raw(r#"{"data":42}"#.to_string())));

        assert!(!response.allowed);
        assert_eq!(response.status.unwrap().code, 400);
    }

    #[test]
    fn missing_object_is_bad_request() {
        let response = ConfigMapValidator::new(MAX).validate(&request(Operation::Create, None));

        assert!(!response.allowed);
        let status = response.status.unwrap();
        assert_eq!(status.code, 400);
        assert_eq!(status.message.as_deref(), Some("there is no content to decode"));
    }

    #[test]
    fn update_decodes_old_object() {
        let mut update = request(Operation::Update, kubeconfig_object(Some("apiVersion: v1")));

        let response = ConfigMapValidator::new(MAX).validate(&update);
        assert_eq!(response.status.unwrap().code, 400);

        update.old_object = kubeconfig_object(Some("old"));
        let response = ConfigMapValidator::new(MAX).validate(&update);
        assert!(response.allowed);
    }

    #[test]
    fn create_ignores_old_object() {
        let mut create = request(Operation::Create, kubeconfig_object(Some("apiVersion: v1")));
        create.old_object = raw("[]".to_string());

        assert!(ConfigMapValidator::new(MAX).validate(&create).allowed);
    }

    #[test]
    fn from_config_uses_max_object_size() {
        let validator = ConfigMapValidator::from_config(&ConfigMapValidationConfiguration::default());
        assert_eq!(validator.max_object_size(), MAX);
    }
}
