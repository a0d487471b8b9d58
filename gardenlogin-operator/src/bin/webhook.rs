//! Gardenlogin webhook server.
//!
//! Serves the validating admission webhook for kubeconfig ConfigMaps over
//! HTTPS.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use gardenlogin_operator::config::ControllerManagerConfiguration;
use gardenlogin_operator::webhook::{self, ConfigMapValidator};
use tokio::fs;

/// Gardenlogin admission webhook server.
#[derive(Parser, Debug)]
#[command(name = "gardenlogin-webhook", version, about)]
struct Cli {
    /// Path to the controller manager configuration file.
    #[arg(long, env = "GARDENLOGIN_CONFIG")]
    config: Option<PathBuf>,

    /// HTTPS port.
    #[arg(long, env = "WEBHOOK_PORT", default_value_t = 8443)]
    port: u16,

    /// Serving certificate (PEM).
    #[arg(long, env = "TLS_CERT_FILE", default_value = "/certs/tls.crt")]
    tls_cert: PathBuf,

    /// Serving private key (PEM).
    #[arg(long, env = "TLS_KEY_FILE", default_value = "/certs/tls.key")]
    tls_key: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gardenlogin_operator=info".parse()?)
                .add_directive("gardenlogin_webhook=info".parse()?),
        )
        .init();

    let config = ControllerManagerConfiguration::load(cli.config.as_deref())?;
    let validator = Arc::new(ConfigMapValidator::from_config(
        &config.webhooks.config_map_validation,
    ));

    tracing::info!(
        port = cli.port,
        tls_cert = %cli.tls_cert.display(),
        tls_key = %cli.tls_key.display(),
        max_object_size = validator.max_object_size(),
        "Webhook configuration loaded"
    );

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let cert_pem = fs::read(&cli.tls_cert).await?;
    let key_pem = fs::read(&cli.tls_key).await?;
    let tls_acceptor = tokio_rustls::TlsAcceptor::from(webhook::server_config(&cert_pem, &key_pem)?);

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Webhook server listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let acceptor = tls_acceptor.clone();
                let validator = Arc::clone(&validator);

                tokio::spawn(async move {
                    let tls_stream = match acceptor.accept(stream).await {
                        Ok(tls_stream) => tls_stream,
                        Err(e) => {
                            tracing::warn!(peer = %peer, error = %e, "TLS handshake failed");
                            return;
                        }
                    };

                    let io = hyper_util::rt::TokioIo::new(tls_stream);
                    let service = hyper::service::service_fn(move |req| {
                        webhook::handle_request(req, Arc::clone(&validator))
                    });

                    if let Err(e) = hyper::server::conn::http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        tracing::error!(peer = %peer, error = %e, "Connection error");
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down webhook server");
                return Ok(());
            }
        }
    }
}
