use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use clap::Parser;

use mitra_web::{api, config::WebConfig, WebState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config/web.yaml")]
    config: String,
}

#[actix_web::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = WebConfig::load(&args.config)?;

    let host = config.server.host.clone();
    let port = config.server.port;
    let workers = config.server.workers.max(1);
    let app_state = web::Data::new(WebState::new(config)?);

    tracing::info!(
        "Proxying video {} and assistant {}",
        app_state.config.upstream.video_url,
        app_state.config.assistant.url
    );

    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(cors(&app_state.config.server.cors_origins))
            .configure(api::configure)
    })
    .workers(workers)
    .bind((host.clone(), port))?
    .run();

    tracing::info!("Mitra web platform started on {}:{}", host, port);

    server.await?;

    Ok(())
}

fn cors(origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec!["Content-Type"])
        .max_age(3600);

    if origins.iter().any(|o| o == "*") {
        return cors.allow_any_origin();
    }
    origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}
