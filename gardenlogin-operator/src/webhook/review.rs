//! `admission.k8s.io/v1` AdmissionReview envelope.
//!
//! Objects are kept as raw JSON so that their size can be checked before
//! they are decoded.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// API version of the AdmissionReview envelope.
pub const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";

/// Kind of the AdmissionReview envelope.
pub const ADMISSION_KIND: &str = "AdmissionReview";

/// Admission review request or response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    /// `admission.k8s.io/v1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// `AdmissionReview`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Set by the API server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,
    /// Set by the webhook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

impl AdmissionReview {
    /// Wrap a response in a v1 envelope.
    pub fn from_response(response: AdmissionResponse) -> Self {
        Self {
            api_version: Some(ADMISSION_API_VERSION.to_string()),
            kind: Some(ADMISSION_KIND.to_string()),
            request: None,
            response: Some(response),
        }
    }
}

/// Operation being admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[allow(missing_docs)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

/// The part of an admission request read by the validators.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    /// Identifier echoed in the response.
    pub uid: String,
    /// Operation being admitted.
    pub operation: Operation,
    /// Namespace of the object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Name of the object; empty for generated names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The object as sent by the API server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Box<RawValue>>,
    /// The existing object, for updates and deletions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_object: Option<Box<RawValue>>,
}

/// Verdict for an admission request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionResponse {
    /// Request identifier.
    pub uid: String,
    /// Whether the request is admitted.
    pub allowed: bool,
    /// Verdict details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AdmissionStatus>,
}

/// Result details of an admission verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionStatus {
    /// HTTP status code.
    pub code: u16,
    /// Error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Verdict reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AdmissionResponse {
    /// Admit the request.
    pub fn allowed(uid: String, reason: impl Into<String>) -> Self {
        Self::verdict(uid, true, 200, reason.into())
    }

    /// Deny the request as forbidden.
    pub fn denied(uid: String, reason: impl Into<String>) -> Self {
        Self::verdict(uid, false, 403, reason.into())
    }

    /// Deny the request because it could not be processed.
    pub fn errored(uid: String, code: u16, message: impl Into<String>) -> Self {
        Self {
            uid,
            allowed: false,
            status: Some(AdmissionStatus {
                code,
                message: Some(message.into()),
                reason: None,
            }),
        }
    }

    fn verdict(uid: String, allowed: bool, code: u16, reason: String) -> Self {
        Self {
            uid,
            allowed,
            status: Some(AdmissionStatus {
                code,
                message: None,
                reason: Some(reason),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_create_request() {
        let review: AdmissionReview = serde_json::from_str(
            r#"{
                "apiVersion": "admission.k8s.io/v1",
                "kind": "AdmissionReview",
                "request": {
                    "uid": "abc",
                    "operation": "CREATE",
                    "namespace": "garden-ns1",
                    "object": {"apiVersion": "v1", "kind": "ConfigMap"},
                    "oldObject": null
                }
            }"#,
        )
        .unwrap();

        let request = review.request.unwrap();
        assert_eq!(request.operation, Operation::Create);
        assert_eq!(
            request.object.unwrap().get(),
            r#"{"apiVersion": "v1", "kind": "ConfigMap"}"#
        );
        assert!(request.old_object.is_none());
    }

    #[test]
    fn response_envelope() {
        let review = AdmissionReview::from_response(AdmissionResponse::denied(
            "abc".to_string(),
            "nope",
        ));

        let json = serde_json::to_value(&review).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "apiVersion": "admission.k8s.io/v1",
                "kind": "AdmissionReview",
                "response": {
                    "uid": "abc",
                    "allowed": false,
                    "status": {"code": 403, "reason": "nope"}
                }
            })
        );
    }
}
