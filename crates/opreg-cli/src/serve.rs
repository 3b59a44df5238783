use anyhow::Context;
use opreg_service::{CatalogServer, CatalogService};
use opreg_store::Store;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Path to the SQLite database file to serve.
    #[clap(long, env = "OPREG_DB_PATH")]
    db_path: PathBuf,

    /// Address to listen on for gRPC connections.
    #[clap(long, env = "OPREG_LISTEN_ADDR", default_value = "0.0.0.0:50051")]
    listen_addr: SocketAddr,
}

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let ServeArgs { db_path, listen_addr } = args;
    let store = Arc::new(Store::open(&db_path).with_context(|| format!("opening store at {}", db_path.display()))?);

    let shutdown = CancellationToken::new();
    let catalog = CatalogServer::new(CatalogService::new(store, shutdown.clone()));

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter.set_serving::<CatalogServer>().await;

    let signal_for_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let mut sigint = signal(SignalKind::interrupt()).expect("installing SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("installing SIGTERM handler");
        tokio::select! {
            _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        }
        signal_for_shutdown.cancel();
    });

    tracing::info!(%listen_addr, "serving catalog registry");
    tonic::transport::Server::builder()
        .add_service(catalog)
        .add_service(health_service)
        .serve_with_shutdown(listen_addr, shutdown.cancelled())
        .await
        .context("gRPC server failed")
}
