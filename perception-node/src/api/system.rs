use actix_web::{get, web, HttpResponse};
use mitra_common::utils::format_duration;
use serde_json::json;

use crate::AppState;

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><title>Mitra perception node</title></head>
<body>
<h2>Mitra perception node</h2>
<img src="/video_feed" width="640" height="480">
<pre id="events"></pre>
<script>
const log = document.getElementById("events");
new EventSource("/events").onmessage = (e) => { log.textContent = e.data + "\n" + log.textContent; };
</script>
</body>
</html>
"#;

#[get("/")]
async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}

#[get("/health")]
async fn health(state: web::Data<AppState>) -> HttpResponse {
    let snapshot = state.live.read();
    let producer = state.producer();

    HttpResponse::Ok().json(json!({
        "node_id": state.config.node_id,
        "state": producer.map(|p| p.state()),
        "cycle": producer.map(|p| p.cycles()).unwrap_or(0),
        "subscribers": state.bus.subscriber_count(),
        "has_frame": snapshot.has_frame(),
        "confidence_threshold": snapshot.confidence_threshold,
        "uptime": format_duration(state.uptime()),
    }))
}

#[get("/metrics")]
async fn metrics(state: web::Data<AppState>) -> Result<HttpResponse, actix_web::Error> {
    if !state.config.monitoring.enable_metrics {
        return Ok(HttpResponse::NotFound().finish());
    }

    let body = state
        .metrics
        .render()
        .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index).service(health).service(metrics);
}
