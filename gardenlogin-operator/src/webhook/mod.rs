//! Admission webhook for kubeconfig ConfigMaps.
//!
//! Routes served by [`handle_request`]:
//!
//! - `POST /validate-configmap`: AdmissionReview for ConfigMaps
//! - `GET /healthz`, `GET /readyz`: probes

mod configmap;
mod review;
mod tls;

use std::convert::Infallible;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response, StatusCode};

pub use configmap::{ConfigMapValidator, ALLOWED_REASON};
pub use review::{
    AdmissionRequest, AdmissionResponse, AdmissionReview, AdmissionStatus, Operation,
    ADMISSION_API_VERSION, ADMISSION_KIND,
};
pub use tls::{server_config, TlsError};

/// Path of the ConfigMap validation endpoint.
pub const VALIDATE_CONFIGMAP_PATH: &str = "/validate-configmap";

/// Handle an incoming HTTP request.
pub async fn handle_request<B>(
    req: Request<B>,
    validator: Arc<ConfigMapValidator>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    match (req.method(), req.uri().path()) {
        (&Method::POST, VALIDATE_CONFIGMAP_PATH) => Ok(validate_config_map(req, &validator).await),
        (&Method::GET, "/healthz") => Ok(health_check()),
        (&Method::GET, "/readyz") => Ok(ready_check()),
        _ => Ok(not_found()),
    }
}

async fn validate_config_map<B>(req: Request<B>, validator: &ConfigMapValidator) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read request body");
            return error_response("Failed to read request body");
        }
    };

    admit(&body, validator)
}

/// Answer a serialized AdmissionReview.
fn admit(body: &[u8], validator: &ConfigMapValidator) -> Response<Full<Bytes>> {
    let admission_review: AdmissionReview = match serde_json::from_slice(body) {
        Ok(review) => review,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse AdmissionReview");
            return error_response("Invalid AdmissionReview format");
        }
    };

    let Some(request) = admission_review.request else {
        tracing::error!("AdmissionReview missing request");
        return error_response("Missing request in AdmissionReview");
    };

    tracing::debug!(
        uid = %request.uid,
        operation = ?request.operation,
        namespace = %request.namespace.as_deref().unwrap_or_default(),
        name = %request.name.as_deref().unwrap_or_default(),
        "Reviewing ConfigMap"
    );

    let response = AdmissionReview::from_response(validator.validate(&request));

    match serde_json::to_vec(&response) {
        Ok(json) => Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(json)))
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to build admission review response");
                error_response("Failed to build response")
            }),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response");
            error_response("Failed to serialize response")
        }
    }
}

fn build_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(body.into()))
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to build response");
            Response::new(Full::new(Bytes::from("Internal Error")))
        })
}

fn health_check() -> Response<Full<Bytes>> {
    build_response(StatusCode::OK, "OK")
}

fn ready_check() -> Response<Full<Bytes>> {
    build_response(StatusCode::OK, "Ready")
}

fn not_found() -> Response<Full<Bytes>> {
    build_response(StatusCode::NOT_FOUND, "Not Found")
}

fn error_response(message: &str) -> Response<Full<Bytes>> {
    build_response(StatusCode::BAD_REQUEST, message.to_string())
}
