use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use bytes::{BufMut, Bytes, BytesMut};
use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ClientGuard, DeliveryWatch};
use crate::camera::Frame;
use crate::config::StreamingConfig;
use crate::error::PerceptionError;
use crate::metrics::Metrics;
use crate::state::LiveState;

pub const MJPEG_BOUNDARY: &str = "frame";
pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// One multipart part: boundary, JPEG header, frame bytes.
pub fn mjpeg_part(frame: &Frame) -> Bytes {
    let mut part = BytesMut::with_capacity(frame.data.len() + 64);
    part.put_slice(b"--");
    part.put_slice(MJPEG_BOUNDARY.as_bytes());
    part.put_slice(b"\r\nContent-Type: image/jpeg\r\n\r\n");
    part.put_slice(&frame.data);
    part.put_slice(b"\r\n");
    part.freeze()
}

/// Emits the current frame every `mjpeg_frame_delay` until the client goes
/// away or `cancel` fires. Before the first frame exists it polls every
/// `mjpeg_idle_poll` instead of ending.
pub fn mjpeg_stream(
    live: Arc<LiveState>,
    metrics: &Metrics,
    config: &StreamingConfig,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<Bytes, PerceptionError>> + 'static {
    let frame_delay = config.mjpeg_frame_delay();
    let idle_poll = config.mjpeg_idle_poll();
    let gauge = metrics.mjpeg_clients.clone();
    let dropped = metrics.consumers_dropped.clone();

    stream! {
        let _client = ClientGuard::new(gauge);
        let mut watch = DeliveryWatch::new("mjpeg", dropped);
        debug!("MJPEG client connected");

        loop {
            // Copy out and release the snapshot before waiting.
            let part = live.read().frame.as_ref().map(mjpeg_part);

            let delay: Duration = match part {
                Some(part) => {
                    yield Ok(part);
                    frame_delay
                }
                None => idle_poll,
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        watch.finish();
        debug!("MJPEG stream ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn config() -> StreamingConfig {
        StreamingConfig {
            mjpeg_frame_delay_ms: 5,
            mjpeg_idle_poll_ms: 10,
            ..StreamingConfig::default()
        }
    }

    #[test]
    fn part_has_boundary_header_and_trailing_crlf() {
        let frame = Frame::new(&b"JPEG"[..], 2, 2, 1);
        assert_eq!(
            mjpeg_part(&frame).as_ref(),
            b"--frame\r\nContent-Type: image/jpeg\r\n\r\nJPEG\r\n"
        );
    }

    #[tokio::test]
    async fn waits_for_first_frame_then_emits_it() {
        let live = Arc::new(LiveState::default());
        let metrics = Metrics::new().unwrap();
        let stream = mjpeg_stream(Arc::clone(&live), &metrics, &config(), CancellationToken::new());
        futures::pin_mut!(stream);

        let writer = Arc::clone(&live);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            writer.update(Frame::new(&b"first"[..], 2, 2, 7), Vec::new());
        });

        let part = tokio::time::timeout(Duration::from_secs(3), stream.next())
            .await
            .expect("no frame emitted")
            .expect("stream ended")
            .unwrap();
        assert_eq!(part, mjpeg_part(&Frame::new(&b"first"[..], 2, 2, 7)));
        assert_eq!(metrics.mjpeg_clients.get(), 1);
    }

    #[tokio::test]
    async fn cancellation_ends_stream_and_releases_gauge() {
        let live = Arc::new(LiveState::default());
        live.update(Frame::new(&b"x"[..], 1, 1, 1), Vec::new());
        let metrics = Metrics::new().unwrap();
        let cancel = CancellationToken::new();
        let stream = mjpeg_stream(live, &metrics, &config(), cancel.clone());
        futures::pin_mut!(stream);

        assert!(stream.next().await.is_some());
        cancel.cancel();

        let end = tokio::time::timeout(Duration::from_secs(1), stream.next()).await.unwrap();
        assert!(end.is_none());
        assert_eq!(metrics.mjpeg_clients.get(), 0);
        assert_eq!(metrics.consumers_dropped.get(), 0);
    }

    #[tokio::test]
    async fn client_leaving_mid_stream_counts_as_dropped_consumer() {
        let live = Arc::new(LiveState::default());
        live.update(Frame::new(&b"x"[..], 1, 1, 1), Vec::new());
        let metrics = Metrics::new().unwrap();
        let mut stream = Box::pin(mjpeg_stream(live, &metrics, &config(), CancellationToken::new()));

        assert!(stream.next().await.is_some());
        drop(stream);

        assert_eq!(metrics.consumers_dropped.get(), 1);
        assert_eq!(metrics.mjpeg_clients.get(), 0);
    }
}
