//! Cluster CA extraction from shoot states.

use base64::Engine;
use serde::Deserialize;

use crate::crd::ShootState;
use crate::error::{OperatorError, OperatorResult};

/// Name of the resource data entry holding the cluster CA.
pub const CA_RESOURCE_DATA_NAME: &str = "ca";

/// Type of resource data entries holding certificates.
pub const CERTIFICATE_DATA_TYPE: &str = "certificate";

/// Certificate entry as stored by Gardener. The private key next to it is
/// never read.
#[derive(Debug, Deserialize)]
struct CertificateInfoData {
    /// Base64 encoded PEM certificate.
    certificate: String,
}

/// Read the PEM encoded cluster CA from a shoot state.
///
/// Returns [`OperatorError::CaNotProvisioned`] while Gardener has not yet
/// written the entry, and [`OperatorError::CaConversion`] when the entry
/// exists but is not certificate data.
pub fn cluster_ca_cert(state: &ShootState) -> OperatorResult<Vec<u8>> {
    let entry = state
        .resource_data(CA_RESOURCE_DATA_NAME)
        .ok_or(OperatorError::CaNotProvisioned)?;

    if entry.type_ != CERTIFICATE_DATA_TYPE {
        return Err(OperatorError::CaConversion(format!(
            "could not convert InfoData entry {} of type {:?} to CertificateInfoData",
            CA_RESOURCE_DATA_NAME, entry.type_
        )));
    }

    let info: CertificateInfoData = serde_json::from_value(entry.data.clone())
        .map_err(|e| OperatorError::CaConversion(e.to_string()))?;

    base64::engine::general_purpose::STANDARD
        .decode(info.certificate.as_bytes())
        .map_err(|e| OperatorError::CaConversion(format!("invalid certificate encoding: {e}")))
}

/// Ensure the bytes hold a PEM block with a parseable X.509 certificate.
pub fn validate_certificate(cert: &[u8]) -> OperatorResult<()> {
    let block = pem::parse(cert)
        .map_err(|e| OperatorError::InvalidCertificate(format!("could not decode certificate: {e}")))?;

    x509_parser::parse_x509_certificate(block.contents())
        .map_err(|e| OperatorError::InvalidCertificate(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::GardenerResourceData;
    use crate::testing;

    #[test]
    fn extracts_ca() {
        let pem = testing::ca_pem();
        let state = testing::shoot_state("garden-ns1", "shoot-a", Some(&pem));

        let ca = cluster_ca_cert(&state).unwrap();
        assert_eq!(ca, pem.as_bytes());
    }

    #[test]
    fn missing_entry_is_not_provisioned() {
        let state = testing::shoot_state("garden-ns1", "shoot-a", None);

        let err = cluster_ca_cert(&state).unwrap_err();
        assert!(matches!(err, OperatorError::CaNotProvisioned));
        assert!(err.is_transient());
    }

    #[test]
    fn wrong_type_is_conversion_error() {
        let mut state = testing::shoot_state("garden-ns1", "shoot-a", None);
        state.spec.gardener.push(GardenerResourceData {
            name: "ca".to_string(),
            type_: "basicAuth".to_string(),
            data: serde_json::json!({"username": "admin"}),
        });

        let err = cluster_ca_cert(&state).unwrap_err();
        assert!(matches!(err, OperatorError::CaConversion(_)));
    }

    #[test]
    fn malformed_data_is_conversion_error() {
        let mut state = testing::shoot_state("garden-ns1", "shoot-a", None);
        state.spec.gardener.push(GardenerResourceData {
            name: "ca".to_string(),
            type_: "certificate".to_string(),
            data: serde_json::json!({"certificate": "%%% not base64 %%%"}),
        });

        let err = cluster_ca_cert(&state).unwrap_err();
        assert!(matches!(err, OperatorError::CaConversion(_)));
    }

    #[test]
    fn validates_real_certificate() {
        assert!(validate_certificate(testing::ca_pem().as_bytes()).is_ok());
    }

    #[test]
    fn rejects_non_pem() {
        let err = validate_certificate(b"CA1").unwrap_err();
        assert!(matches!(err, OperatorError::InvalidCertificate(_)));
    }

    #[test]
    fn rejects_pem_without_certificate() {
        let garbage = "-----BEGIN CERTIFICATE-----\naGVsbG8gd29ybGQ=\n-----END CERTIFICATE-----\n";
        let err = validate_certificate(garbage.as_bytes()).unwrap_err();
        assert!(matches!(err, OperatorError::InvalidCertificate(_)));
    }
}
