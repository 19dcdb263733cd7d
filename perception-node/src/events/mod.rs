//! Discrete notifications (detections, status updates, assistant replies)
//! and their fan-out to event-stream subscribers.

use chrono::{DateTime, Local};
use mitra_common::{utils::format_event_timestamp, DetectionSet};
use serde_json::{Map, Value};

mod bus;

pub use bus::{EventBus, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Detection,
    StatusUpdate,
    AssistantReply,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// Every detection of one producer cycle.
    Detections(DetectionSet),
    Status(Map<String, Value>),
    Reply(String),
}

#[derive(Debug, Clone)]
pub struct Event {
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            timestamp: Local::now(),
            payload,
        }
    }

    pub fn detections(detections: DetectionSet) -> Self {
        Self::new(EventPayload::Detections(detections))
    }

    pub fn status(status: Map<String, Value>) -> Self {
        Self::new(EventPayload::Status(status))
    }

    pub fn assistant_reply(reply: impl Into<String>) -> Self {
        Self::new(EventPayload::Reply(reply.into()))
    }

    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::Detections(_) => EventKind::Detection,
            EventPayload::Status(_) => EventKind::StatusUpdate,
            EventPayload::Reply(_) => EventKind::AssistantReply,
        }
    }

    /// Text payload: `DETECT|ts|class|conf` records joined by newlines,
    /// `STATUS|ts|{json}` or `ASSISTANT|ts|reply`.
    pub fn wire_payload(&self) -> String {
        let ts = format_event_timestamp(&self.timestamp);
        match &self.payload {
            EventPayload::Detections(detections) => detections
                .iter()
                .map(|d| d.event_record(&ts))
                .collect::<Vec<_>>()
                .join("\n"),
            EventPayload::Status(status) => {
                let json = serde_json::to_string(status).unwrap_or_else(|_| "{}".to_string());
                format!("STATUS|{}|{}", ts, json)
            }
            EventPayload::Reply(reply) => format!("ASSISTANT|{}|{}", ts, reply),
        }
    }

    /// One `text/event-stream` record. Each payload line gets its own
    /// `data:` field so multi-record events survive SSE framing.
    pub fn sse_record(&self) -> String {
        let payload = self.wire_payload();
        let mut record = String::with_capacity(payload.len() + 16);
        for line in payload.split('\n') {
            record.push_str("data: ");
            record.push_str(line);
            record.push('\n');
        }
        record.push('\n');
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mitra_common::{BBox, Detection};
    use serde_json::json;

    fn at_noon(payload: EventPayload) -> Event {
        Event {
            timestamp: Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            payload,
        }
    }

    #[test]
    fn detection_event_joins_records_per_cycle() {
        let event = at_noon(EventPayload::Detections(vec![
            Detection::new("person", 0.91, BBox::new(1, 2, 3, 4)),
            Detection::new("dog", 0.5, BBox::new(1, 2, 3, 4)),
        ]));

        assert_eq!(event.kind(), EventKind::Detection);
        assert_eq!(
            event.wire_payload(),
            "DETECT|2024-06-01 12:00:00|person|0.910\nDETECT|2024-06-01 12:00:00|dog|0.500"
        );
        assert_eq!(
            event.sse_record(),
            "data: DETECT|2024-06-01 12:00:00|person|0.910\ndata: DETECT|2024-06-01 12:00:00|dog|0.500\n\n"
        );
    }

    #[test]
    fn status_event_serializes_map_as_json() {
        let map = json!({"lat": 1.5}).as_object().cloned().unwrap();
        let event = at_noon(EventPayload::Status(map));

        assert_eq!(event.kind(), EventKind::StatusUpdate);
        assert_eq!(event.wire_payload(), r#"STATUS|2024-06-01 12:00:00|{"lat":1.5}"#);
    }

    #[test]
    fn assistant_event_is_single_sse_record() {
        let event = at_noon(EventPayload::Reply("I see a person".to_string()));
        assert_eq!(event.sse_record(), "data: ASSISTANT|2024-06-01 12:00:00|I see a person\n\n");
    }
}
