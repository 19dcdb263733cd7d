use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use mitra_perception::{
    api,
    camera::open_source,
    config::PerceptionConfig,
    inference::load_detector,
    metrics::Metrics,
    processing::ProducerLoop,
    AppState,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config/perception.yaml")]
    config: String,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;

    let config = PerceptionConfig::load(&args.config)?;
    info!("Starting Mitra perception node {}", config.node_id);

    let metrics = Arc::new(Metrics::new()?);
    let shutdown = CancellationToken::new();
    let state = AppState::new(config, Arc::clone(&metrics), shutdown.clone())?;

    // Capture must come up at startup; a missing detector only disables detection.
    let source = open_source(&state.config.camera)?;
    let detector = load_detector(&state.config.inference);

    let producer = ProducerLoop::new(
        source,
        detector,
        Arc::clone(&state.live),
        Arc::clone(&state.bus),
        metrics,
        state.config.producer.clone(),
        shutdown.clone(),
    );
    let (producer_handle, producer_thread) = producer.spawn()?;

    let server_config = state.config.server.clone();
    let state = web::Data::new(state.with_producer(producer_handle));

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::configure)
    })
    .workers(server_config.workers.max(1))
    .disable_signals()
    .bind((server_config.host.clone(), server_config.port))?
    .run();

    info!(
        "Perception node listening on {}:{}",
        server_config.host, server_config.port
    );

    let server_handle = server.handle();
    let stopper = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        // Ends open MJPEG/SSE bodies so the graceful stop does not wait on them.
        stopper.cancel();
        server_handle.stop(true).await;
    });

    server.await?;

    shutdown.cancel();
    match tokio::task::spawn_blocking(move || producer_thread.join()).await {
        Ok(Ok(())) => {}
        _ => error!("Producer thread did not shut down cleanly"),
    }

    info!("Shutting down Mitra perception node");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_thread_names(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
