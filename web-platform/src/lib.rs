pub mod api;
pub mod config;
pub mod services;

use config::WebConfig;
use services::UpstreamClient;

pub struct WebState {
    pub config: WebConfig,
    pub upstream: UpstreamClient,
}

impl WebState {
    pub fn new(config: WebConfig) -> anyhow::Result<Self> {
        let upstream = UpstreamClient::new(config.upstream.clone(), config.assistant.clone())?;
        Ok(Self { config, upstream })
    }
}
