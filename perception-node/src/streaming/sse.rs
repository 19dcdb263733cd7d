use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use bytes::Bytes;
use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::DeliveryWatch;
use crate::error::PerceptionError;
use crate::events::{Event, Subscription};
use crate::metrics::Metrics;

pub const SSE_CONTENT_TYPE: &str = "text/event-stream";
pub const KEEP_ALIVE_RECORD: &[u8] = b": keep-alive\n\n";

enum Step {
    Deliver(Arc<Event>),
    KeepAlive,
    Stop,
}

/// Forwards a subscription as `text/event-stream` records. The stream owns
/// the subscription, so dropping the response (client gone, shutdown)
/// unsubscribes it.
pub fn sse_stream(
    subscription: Subscription,
    metrics: &Metrics,
    keepalive: Duration,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<Bytes, PerceptionError>> + 'static {
    let dropped = metrics.consumers_dropped.clone();

    stream! {
        let subscription = subscription;
        let mut watch = DeliveryWatch::new("sse", dropped);
        debug!(subscriber_id = %subscription.id(), "SSE client connected");

        loop {
            let step = tokio::select! {
                _ = cancel.cancelled() => Step::Stop,
                next = tokio::time::timeout(keepalive, subscription.recv()) => match next {
                    Ok(Some(event)) => Step::Deliver(event),
                    Ok(None) => Step::Stop,
                    Err(_) => Step::KeepAlive,
                },
            };

            match step {
                Step::Deliver(event) => yield Ok(Bytes::from(event.sse_record())),
                Step::KeepAlive => yield Ok(Bytes::from_static(KEEP_ALIVE_RECORD)),
                Step::Stop => break,
            }
        }

        watch.finish();
        debug!(subscriber_id = %subscription.id(), "SSE stream ended");
    }
}
