use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

use job_reaper::{
    config::Config,
    controllers::CleanupController,
    kubernetes::KubeClusterApi,
    Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::load()?;
    info!("Loaded configuration: {:?}", config);

    info!("Connecting to {}", config.kube.cluster_url());
    let api = Arc::new(KubeClusterApi::new(&config.kube)?);

    let controller = CleanupController::new(api, &config.reconciler);

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = controller.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down");
            Ok(())
        }
        _ = terminate.recv() => {
            info!("Received SIGTERM, shutting down");
            Ok(())
        }
    }
}
