use actix_web::{post, web, HttpResponse};
use serde_json::{json, Value};
use tracing::warn;

use crate::WebState;

pub const UNREACHABLE_REPLY: &str = "(error) cannot reach assistant";

/// Used when the browser posts no usable JSON.
fn default_request() -> Value {
    json!({ "query": "describe the scene", "detections": [], "status": {} })
}

#[post("/speak")]
async fn speak(state: web::Data<WebState>, body: web::Bytes) -> HttpResponse {
    let request = serde_json::from_slice::<Value>(&body)
        .ok()
        .filter(Value::is_object)
        .unwrap_or_else(default_request);

    match state.upstream.ask_assistant(&request).await {
        Ok(reply) => HttpResponse::Ok().json(reply),
        Err(e) => {
            warn!("Assistant unreachable: {:#}", e);
            HttpResponse::Ok().json(json!({ "reply": UNREACHABLE_REPLY }))
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(speak);
}
