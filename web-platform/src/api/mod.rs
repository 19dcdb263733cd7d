mod assistant;
mod dashboard;
mod feeds;
mod telemetry;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(dashboard::configure)
        .configure(feeds::configure)
        .service(
            web::scope("/api")
                .configure(telemetry::configure)
                .configure(assistant::configure),
        );
}
