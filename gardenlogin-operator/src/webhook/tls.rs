//! TLS setup for the webhook server.

use std::sync::Arc;

use thiserror::Error;

/// Errors raised while building the server TLS configuration.
#[derive(Debug, Error)]
pub enum TlsError {
    /// The certificate PEM could not be read.
    #[error("invalid certificate PEM: {0}")]
    Certificate(#[source] std::io::Error),

    /// The certificate PEM holds no certificate.
    #[error("no certificate found in PEM file")]
    NoCertificate,

    /// The key PEM could not be read.
    #[error("invalid private key PEM: {0}")]
    PrivateKey(#[source] std::io::Error),

    /// The key PEM holds no private key.
    #[error("no private key found in PEM file")]
    NoPrivateKey,

    /// rustls rejected the certificate and key.
    #[error("TLS configuration error: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Build a rustls server configuration from a PEM certificate chain and key.
pub fn server_config(cert_pem: &[u8], key_pem: &[u8]) -> Result<Arc<rustls::ServerConfig>, TlsError> {
    let certs = rustls_pemfile::certs(&mut &cert_pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(TlsError::Certificate)?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificate);
    }

    let key = rustls_pemfile::private_key(&mut &key_pem[..])
        .map_err(TlsError::PrivateKey)?
        .ok_or(TlsError::NoPrivateKey)?;

    let mut config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}
