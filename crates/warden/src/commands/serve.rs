//! The `serve` command — runs the CA lifecycle service.

use std::sync::Arc;

use warden_ca::engine::{LocalEngine, RootAuthority, SigningEngine};
use warden_ca::service::CaService;
use warden_common::paths::DataDir;
use warden_crypto::provisioner::Provisioner;

use crate::cli::ServeArgs;

pub fn run(args: ServeArgs) -> anyhow::Result<()> {
    let data_dir = args
        .data_dir
        .map(DataDir::new)
        .unwrap_or_else(DataDir::default_location);

    let authority = RootAuthority::load_or_create(&args.root_name, &data_dir)?;
    let engine = Arc::new(LocalEngine::new(authority, args.max_validity));
    let fingerprint = engine.root_fingerprint();

    let service = Arc::new(CaService::new(
        engine,
        Provisioner::new(args.provisioner_name, args.provisioner_secret),
        data_dir.clone(),
        args.default_validity,
    )?);
    let app = warden_ca::http::router(service);

    // Operators relay this fingerprint to sites out-of-band.
    println!("root fingerprint: {fingerprint}");
    tracing::info!(
        data_dir = %data_dir.root().display(),
        listen = %args.listen,
        %fingerprint,
        "Warden CA starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(&args.listen).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok::<_, anyhow::Error>(())
    })?;

    tracing::info!("Warden CA stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}
