//! Gardenlogin controller manager binary.
//!
//! Runs the shoot controller, which maintains a `<shoot>.kubeconfig`
//! ConfigMap for every shoot of the garden cluster.

use std::path::PathBuf;

use clap::Parser;
use gardenlogin_operator::config::ControllerManagerConfiguration;
use gardenlogin_operator::controller;
use gardenlogin_operator::crd::{Shoot, ShootState};
use kube::{Client, CustomResourceExt};

/// Gardenlogin controller manager.
#[derive(Parser, Debug)]
#[command(name = "gardenlogin-operator", version, about)]
struct Cli {
    /// Path to the controller manager configuration file.
    #[arg(long, env = "GARDENLOGIN_CONFIG")]
    config: Option<PathBuf>,

    /// Print the CRDs of the watched Gardener resources and exit.
    #[arg(long)]
    print_crds: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gardenlogin_operator=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .init();

    if cli.print_crds {
        print_crds()?;
        return Ok(());
    }

    let config = ControllerManagerConfiguration::load(cli.config.as_deref())?;
    tracing::info!(
        config = ?cli.config,
        max_concurrent_reconciles = config.controllers.shoot.max_concurrent_reconciles,
        "Starting gardenlogin controller manager"
    );

    let client = Client::try_default().await?;
    tracing::info!("Connected to Kubernetes cluster");

    controller::run(client, &config.controllers.shoot).await?;

    Ok(())
}

/// Print the Shoot and ShootState CRDs as YAML, e.g. for test clusters
/// without Gardener.
fn print_crds() -> anyhow::Result<()> {
    println!("---");
    println!("{}", serde_yaml::to_string(&Shoot::crd())?);
    println!("---");
    println!("{}", serde_yaml::to_string(&ShootState::crd())?);
    Ok(())
}
