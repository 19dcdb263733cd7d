use actix_web::{post, web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Default, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    query: String,
}

#[derive(Debug, Serialize)]
struct ChatReply {
    reply: String,
}

/// Always 200: assistant failures come back as a fallback reply.
#[post("/chat")]
async fn chat(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let request: ChatRequest = serde_json::from_slice(&body).unwrap_or_default();
    let reply = state.assistant.ask(&request.query).await;
    HttpResponse::Ok().json(ChatReply { reply })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(chat);
}
