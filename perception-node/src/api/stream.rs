use actix_web::{get, http::header, web, HttpResponse};

use crate::streaming::{mjpeg_stream, sse_stream, MJPEG_CONTENT_TYPE, SSE_CONTENT_TYPE};
use crate::AppState;

#[get("/video_feed")]
async fn video_feed(state: web::Data<AppState>) -> HttpResponse {
    let body = mjpeg_stream(
        state.live.clone(),
        &state.metrics,
        &state.config.streaming,
        state.shutdown.clone(),
    );

    HttpResponse::Ok()
        .content_type(MJPEG_CONTENT_TYPE)
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(body)
}

#[get("/events")]
async fn events(state: web::Data<AppState>) -> HttpResponse {
    let subscription = state.bus.subscribe();
    let body = sse_stream(
        subscription,
        &state.metrics,
        state.config.streaming.sse_keepalive(),
        state.shutdown.clone(),
    );

    HttpResponse::Ok()
        .content_type(SSE_CONTENT_TYPE)
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(body)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(video_feed).service(events);
}
