use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Base URL of the assistant host; `/ask` is appended.
pub const ASSISTANT_BASE_ENV: &str = "MITRA_MAC";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct WebConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub assistant: AssistantConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    /// `*` allows any origin.
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct UpstreamConfig {
    pub video_url: String,
    pub events_url: String,
    pub detections_url: String,
    pub lane_video_url: String,
    pub lane_state_url: String,
    pub json_timeout_sec: u64,
    pub connect_timeout_sec: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AssistantConfig {
    pub url: String,
    pub timeout_sec: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            workers: 2,
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            video_url: "http://127.0.0.1:5000/video_feed".to_string(),
            events_url: "http://127.0.0.1:5000/events".to_string(),
            detections_url: "http://127.0.0.1:5000/latest_detections".to_string(),
            lane_video_url: "http://127.0.0.1:5010/video_feed".to_string(),
            lane_state_url: "http://127.0.0.1:5010/lane_state".to_string(),
            json_timeout_sec: 2,
            connect_timeout_sec: 5,
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:6000/ask".to_string(),
            timeout_sec: 5,
        }
    }
}

impl UpstreamConfig {
    pub fn json_timeout(&self) -> Duration {
        Duration::from_secs(self.json_timeout_sec)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_sec)
    }
}

impl AssistantConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }
}

/// Assistant endpoint for a `MITRA_MAC` style base URL.
pub fn assistant_url_from_base(base: &str) -> String {
    format!("{}/ask", base.trim().trim_end_matches('/'))
}

impl WebConfig {
    /// Optional YAML file, then `MITRA_WEB_*` overrides
    /// (`MITRA_WEB_SERVER__PORT=8080`), then `MITRA_MAC`.
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("MITRA_WEB")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let mut config: WebConfig = settings.try_deserialize()?;

        if let Ok(base) = std::env::var(ASSISTANT_BASE_ENV) {
            if !base.trim().is_empty() {
                config.assistant.url = assistant_url_from_base(&base);
            }
        }

        Ok(config)
    }
}
