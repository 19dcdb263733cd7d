pub mod api;
pub mod assistant;
pub mod camera;
pub mod config;
pub mod error;
pub mod events;
pub mod inference;
pub mod metrics;
pub mod processing;
pub mod state;
pub mod streaming;

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use assistant::RemoteCallGateway;
use config::PerceptionConfig;
use error::Result;
use events::EventBus;
use metrics::Metrics;
use processing::ProducerHandle;
use state::{LiveState, StatusStore};

// Application state shared by the producer and every HTTP worker
pub struct AppState {
    pub config: PerceptionConfig,
    pub live: Arc<LiveState>,
    pub status: Arc<StatusStore>,
    pub bus: Arc<EventBus>,
    pub metrics: Arc<Metrics>,
    pub assistant: RemoteCallGateway,
    pub shutdown: CancellationToken,
    producer: Option<ProducerHandle>,
    started_at: Instant,
}

impl AppState {
    pub fn new(config: PerceptionConfig, metrics: Arc<Metrics>, shutdown: CancellationToken) -> Result<Self> {
        let live = Arc::new(LiveState::new(config.inference.confidence_threshold));
        let status = Arc::new(StatusStore::new());
        let bus = Arc::new(EventBus::new(config.streaming.mailbox_capacity, Arc::clone(&metrics)));
        let assistant = RemoteCallGateway::new(
            &config.assistant,
            Arc::clone(&live),
            Arc::clone(&status),
            Arc::clone(&bus),
            Arc::clone(&metrics),
        )?;

        Ok(Self {
            config,
            live,
            status,
            bus,
            metrics,
            assistant,
            shutdown,
            producer: None,
            started_at: Instant::now(),
        })
    }

    pub fn with_producer(mut self, handle: ProducerHandle) -> Self {
        self.producer = Some(handle);
        self
    }

    pub fn producer(&self) -> Option<&ProducerHandle> {
        self.producer.as_ref()
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}
