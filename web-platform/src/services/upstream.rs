use std::pin::Pin;
use std::time::Duration;

use actix_web::web::Bytes;
use anyhow::{Context, Result};
use futures::Stream;
use mitra_common::Detection;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{AssistantConfig, UpstreamConfig};

pub type ByteStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, reqwest::Error>>>>;

/// HTTP client for the perception node, the lane camera and the assistant.
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    upstream: UpstreamConfig,
    assistant: AssistantConfig,
}

impl UpstreamClient {
    pub fn new(upstream: UpstreamConfig, assistant: AssistantConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(upstream.connect_timeout())
            .build()
            .context("Failed to build upstream HTTP client")?;

        Ok(Self {
            client,
            upstream,
            assistant,
        })
    }

    pub fn upstream(&self) -> &UpstreamConfig {
        &self.upstream
    }

    /// Opens a long-lived upstream body. Fails only if the connection or
    /// the response status fails; the body itself is passed through as is.
    pub async fn open_stream(&self, url: &str) -> Result<ByteStream> {
        debug!("Opening upstream stream {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to connect to {}", url))?
            .error_for_status()
            .with_context(|| format!("Upstream {} returned an error status", url))?;

        Ok(Box::pin(response.bytes_stream()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, timeout: Duration) -> Result<T> {
        let value = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?
            .json::<T>()
            .await
            .with_context(|| format!("Invalid JSON from {}", url))?;
        Ok(value)
    }

    /// Latest detections from the perception node; empty on any failure.
    pub async fn latest_detections(&self) -> Vec<Detection> {
        match self
            .get_json(&self.upstream.detections_url, self.upstream.json_timeout())
            .await
        {
            Ok(detections) => detections,
            Err(e) => {
                warn!("Detections unavailable: {:#}", e);
                Vec::new()
            }
        }
    }

    /// Lane camera state object; `{}` on any failure.
    pub async fn lane_state(&self) -> Value {
        match self
            .get_json::<Value>(&self.upstream.lane_state_url, self.upstream.json_timeout())
            .await
        {
            Ok(state @ Value::Object(_)) => state,
            Ok(other) => {
                warn!("Lane state is not an object: {}", other);
                Value::Object(Default::default())
            }
            Err(e) => {
                warn!("Lane state unavailable: {:#}", e);
                Value::Object(Default::default())
            }
        }
    }

    /// Forwards a request body to the assistant and returns its JSON reply.
    pub async fn ask_assistant(&self, request: &Value) -> Result<Value> {
        let reply = self
            .client
            .post(&self.assistant.url)
            .timeout(self.assistant.timeout())
            .json(request)
            .send()
            .await
            .with_context(|| format!("Failed to reach assistant at {}", self.assistant.url))?
            .json::<Value>()
            .await
            .context("Invalid JSON from assistant")?;
        Ok(reply)
    }
}
