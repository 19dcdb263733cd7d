use actix_web::{get, http::header, web, HttpResponse};
use tracing::warn;

use crate::WebState;

const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Streams an upstream body through unchanged; 502 if it cannot be opened.
pub(super) async fn relay(state: &WebState, url: &str, content_type: &str) -> HttpResponse {
    match state.upstream.open_stream(url).await {
        Ok(body) => HttpResponse::Ok()
            .content_type(content_type)
            .insert_header((header::CACHE_CONTROL, "no-cache"))
            .streaming(body),
        Err(e) => {
            warn!("Upstream stream unavailable: {:#}", e);
            HttpResponse::BadGateway().body(format!("upstream unavailable: {}", url))
        }
    }
}

#[get("/video_feed_stream")]
async fn video_feed_stream(state: web::Data<WebState>) -> HttpResponse {
    let url = state.upstream.upstream().video_url.clone();
    relay(&state, &url, MJPEG_CONTENT_TYPE).await
}

#[get("/lane_feed_stream")]
async fn lane_feed_stream(state: web::Data<WebState>) -> HttpResponse {
    let url = state.upstream.upstream().lane_video_url.clone();
    relay(&state, &url, MJPEG_CONTENT_TYPE).await
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(video_feed_stream)
        .service(lane_feed_stream);
}
