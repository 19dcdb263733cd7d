use actix_web::{get, post, web, HttpResponse};
use serde_json::{json, Value};
use tracing::debug;

use crate::events::Event;
use crate::AppState;

#[get("/latest_detections")]
async fn latest_detections(state: web::Data<AppState>) -> HttpResponse {
    let detections = state.live.latest_detections();
    HttpResponse::Ok().json(&*detections)
}

/// Merges a JSON object into the status store. Bodies that are not JSON
/// objects are accepted and leave the store unchanged.
#[post("/update_status")]
async fn update_status(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let update: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let merged = state.status.merge(update);
    debug!("Status updated: {} keys", merged.len());

    state.bus.publish(Event::status(merged));
    HttpResponse::Ok().json(json!({ "ok": true }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(latest_detections).service(update_status);
}
