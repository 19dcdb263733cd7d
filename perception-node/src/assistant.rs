//! Outbound chat call to the remote assistant.

use std::sync::Arc;
use std::time::Duration;

use mitra_common::Detection;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::config::AssistantConfig;
use crate::error::{PerceptionError, Result};
use crate::events::{Event, EventBus};
use crate::metrics::Metrics;
use crate::state::{LiveState, StatusStore};

pub const NO_REPLY: &str = "(no reply)";

#[derive(Debug, Serialize)]
struct AssistantRequest<'a> {
    query: &'a str,
    detections: &'a [Detection],
    status: &'a Map<String, Value>,
    image_caption: Option<String>,
}

/// Asks the assistant about the current scene. Never fails: transport
/// errors and timeouts turn into a fallback reply, and every reply is
/// published as an assistant event.
pub struct RemoteCallGateway {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    live: Arc<LiveState>,
    status: Arc<StatusStore>,
    bus: Arc<EventBus>,
    metrics: Arc<Metrics>,
}

impl RemoteCallGateway {
    pub fn new(
        config: &AssistantConfig,
        live: Arc<LiveState>,
        status: Arc<StatusStore>,
        bus: Arc<EventBus>,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PerceptionError::ConfigError(format!("assistant client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            timeout: config.timeout(),
            live,
            status,
            bus,
            metrics,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn ask(&self, query: &str) -> String {
        let reply = match self.call(query).await {
            Ok(reply) => reply,
            Err(e) => {
                self.metrics.assistant_fallbacks.inc();
                warn!("Assistant call to {} failed: {}", self.url, e);
                format!("(assistant error) {}", e)
            }
        };

        self.bus.publish(Event::assistant_reply(reply.clone()));
        reply
    }

    async fn call(&self, query: &str) -> Result<String> {
        let detections = self.live.latest_detections();
        let status = self.status.snapshot();
        let request = AssistantRequest {
            query,
            detections: &detections,
            status: &status,
            image_caption: None,
        };

        debug!("Asking assistant at {}", self.url);
        let exchange = async {
            let response = self.client.post(&self.url).json(&request).send().await?;
            let body: Value = response.json().await?;
            Ok::<_, PerceptionError>(body)
        };
        let body = tokio::time::timeout(self.timeout, exchange).await??;

        Ok(extract_reply(&body))
    }
}

fn extract_reply(body: &Value) -> String {
    match body.get("reply") {
        Some(Value::String(reply)) => reply.clone(),
        Some(Value::Null) | None => NO_REPLY.to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventPayload;
    use serde_json::json;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct Fixture {
        gateway: RemoteCallGateway,
        bus: Arc<EventBus>,
        metrics: Arc<Metrics>,
    }

    fn fixture(url: String, timeout_sec: u64) -> Fixture {
        let metrics = Arc::new(Metrics::new().unwrap());
        let bus = Arc::new(EventBus::new(8, Arc::clone(&metrics)));
        let config = AssistantConfig { url, timeout_sec };
        let gateway = RemoteCallGateway::new(
            &config,
            Arc::new(LiveState::default()),
            Arc::new(StatusStore::new()),
            Arc::clone(&bus),
            Arc::clone(&metrics),
        )
        .unwrap();
        Fixture { gateway, bus, metrics }
    }

    /// Answers one request with `body` and hands back the request it read.
    async fn one_shot_server(body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/ask", listener.local_addr().unwrap());
        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut request = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text
                        .lines()
                        .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap()))
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (url, task)
    }

    #[test]
    fn reply_field_is_extracted() {
        assert_eq!(extract_reply(&json!({"reply": "hi"})), "hi");
        assert_eq!(extract_reply(&json!({"other": 1})), NO_REPLY);
    }

    #[tokio::test]
    async fn successful_call_returns_and_publishes_reply() {
        let (url, server) = one_shot_server(r#"{"reply":"I see a person"}"#).await;
        let fx = fixture(url, 5);
        let sub = fx.bus.subscribe();

        let reply = fx.gateway.ask("what do you see?").await;

        assert_eq!(reply, "I see a person");
        let request = server.await.unwrap();
        assert!(request.contains(r#""query":"what do you see?""#));
        assert!(request.contains(r#""image_caption":null"#));
        match &sub.try_recv().unwrap().payload {
            EventPayload::Reply(text) => assert_eq!(text, "I see a person"),
            other => panic!("unexpected payload {:?}", other),
        }
        assert_eq!(fx.metrics.assistant_fallbacks.get(), 0);
    }

    #[tokio::test]
    async fn silent_endpoint_times_out_with_fallback_event() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/ask", listener.local_addr().unwrap());
        // Accept and hold connections without ever answering.
        let _server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let fx = fixture(url, 1);
        let sub = fx.bus.subscribe();

        let started = Instant::now();
        let reply = fx.gateway.ask("hello?").await;

        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(reply.starts_with("(assistant error)"), "got {}", reply);
        match &sub.try_recv().unwrap().payload {
            EventPayload::Reply(text) => assert_eq!(text, &reply),
            other => panic!("unexpected payload {:?}", other),
        }
        assert_eq!(fx.metrics.assistant_fallbacks.get(), 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_falls_back() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/ask", listener.local_addr().unwrap());
        drop(listener);
        let fx = fixture(url, 2);

        let reply = fx.gateway.ask("hello?").await;

        assert!(reply.starts_with("(assistant error) "));
    }
}
