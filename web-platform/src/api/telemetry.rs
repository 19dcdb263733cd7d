use actix_web::{get, web, HttpResponse};

use super::feeds::relay;
use crate::WebState;

#[get("/events")]
async fn events(state: web::Data<WebState>) -> HttpResponse {
    let url = state.upstream.upstream().events_url.clone();
    relay(&state, &url, mime::TEXT_EVENT_STREAM.as_ref()).await
}

#[get("/latest_detections")]
async fn latest_detections(state: web::Data<WebState>) -> HttpResponse {
    HttpResponse::Ok().json(state.upstream.latest_detections().await)
}

#[get("/lane_state")]
async fn lane_state(state: web::Data<WebState>) -> HttpResponse {
    HttpResponse::Ok().json(state.upstream.lane_state().await)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(events)
        .service(latest_detections)
        .service(lane_state);
}
