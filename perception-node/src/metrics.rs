use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};

use crate::error::{PerceptionError, Result};

/// Process metrics. Each instance owns its registry, so tests can build
/// as many as they like.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub frames_captured: IntCounter,
    pub cycles_failed: IntCounter,
    pub detection_failures: IntCounter,
    pub events_published: IntCounter,
    pub events_dropped: IntCounter,
    pub assistant_fallbacks: IntCounter,
    pub consumers_dropped: IntCounter,
    pub sse_subscribers: IntGauge,
    pub mjpeg_clients: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("mitra".to_string()), None)?;

        let frames_captured = counter(&registry, "frames_captured_total", "Frames read from the capture source")?;
        let cycles_failed = counter(&registry, "cycles_failed_total", "Producer cycles that ended in an error")?;
        let detection_failures = counter(&registry, "detection_failures_total", "Inferences that failed and were treated as empty")?;
        let events_published = counter(&registry, "events_published_total", "Events handed to the event bus")?;
        let events_dropped = counter(&registry, "events_dropped_total", "Events discarded from full subscriber mailboxes")?;
        let assistant_fallbacks = counter(&registry, "assistant_fallbacks_total", "Assistant calls answered with the fallback reply")?;
        let consumers_dropped = counter(&registry, "consumers_dropped_total", "Stream clients that went away mid-delivery")?;
        let sse_subscribers = gauge(&registry, "sse_subscribers", "Live event-stream subscribers")?;
        let mjpeg_clients = gauge(&registry, "mjpeg_clients", "Live MJPEG stream clients")?;

        Ok(Self {
            registry,
            frames_captured,
            cycles_failed,
            detection_failures,
            events_published,
            events_dropped,
            assistant_fallbacks,
            consumers_dropped,
            sse_subscribers,
            mjpeg_clients,
        })
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| PerceptionError::SerializationError(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| PerceptionError::SerializationError(e.to_string()))
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter> {
    let counter = IntCounter::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge> {
    let gauge = IntGauge::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}
