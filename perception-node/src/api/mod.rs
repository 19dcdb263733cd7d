mod assistant;
mod detections;
mod stream;
mod system;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(stream::configure)
        .configure(detections::configure)
        .configure(assistant::configure)
        .configure(system::configure);
}
