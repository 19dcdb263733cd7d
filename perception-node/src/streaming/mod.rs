//! Long-lived per-client response bodies: MJPEG from [`LiveState`]
//! snapshots and SSE from [`EventBus`] subscriptions.
//!
//! [`LiveState`]: crate::state::LiveState
//! [`EventBus`]: crate::events::EventBus

use prometheus::{IntCounter, IntGauge};
use tracing::debug;

use crate::error::PerceptionError;

mod mjpeg;
mod sse;

pub use mjpeg::{mjpeg_part, mjpeg_stream, MJPEG_BOUNDARY, MJPEG_CONTENT_TYPE};
pub use sse::{sse_stream, KEEP_ALIVE_RECORD, SSE_CONTENT_TYPE};

/// Counts a live client for as long as it is held.
struct ClientGuard(IntGauge);

impl ClientGuard {
    fn new(gauge: IntGauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.0.dec();
    }
}

/// Treats a stream dropped before [`finish`](Self::finish) as a client that
/// went away mid-delivery. Only that consumer is affected.
struct DeliveryWatch {
    stream: &'static str,
    dropped: IntCounter,
    finished: bool,
}

impl DeliveryWatch {
    fn new(stream: &'static str, dropped: IntCounter) -> Self {
        Self {
            stream,
            dropped,
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for DeliveryWatch {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.dropped.inc();
        let error = PerceptionError::DeliveryFailure(format!("{} client disconnected", self.stream));
        debug!(%error, "Consumer dropped");
    }
}
