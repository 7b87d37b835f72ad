//! Firehose envelope model.
//!
//! Envelopes follow the dropsonde protocol: common attributes, an `eventType`
//! discriminant and one payload keyed by the variant. The live firehose sends
//! them as protobuf (see `infra::dropsonde`); replay captures hold the same shape
//! as camelCase JSON, decoded here. [`Envelope`] folds either into a sum type so
//! translators only ever see the payload that matches the variant.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Variant discriminant, named as the platform names it on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    HttpStartStop,
    LogMessage,
    ContainerMetric,
    CounterEvent,
    ValueMetric,
    Error,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::HttpStartStop => "HttpStartStop",
            EventType::LogMessage => "LogMessage",
            EventType::ContainerMetric => "ContainerMetric",
            EventType::CounterEvent => "CounterEvent",
            EventType::ValueMetric => "ValueMetric",
            EventType::Error => "Error",
        }
    }

    /// Map a wire name to a known variant. Unknown names yield `None`.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "HttpStartStop" => Some(EventType::HttpStartStop),
            "LogMessage" => Some(EventType::LogMessage),
            "ContainerMetric" => Some(EventType::ContainerMetric),
            "CounterEvent" => Some(EventType::CounterEvent),
            "ValueMetric" => Some(EventType::ValueMetric),
            "Error" => Some(EventType::Error),
            _ => None,
        }
    }

    pub fn is_metric(&self) -> bool {
        matches!(
            self,
            EventType::ContainerMetric | EventType::CounterEvent | EventType::ValueMetric
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 128-bit identifier carried as two little-endian 64-bit halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Uuid128 {
    pub low: u64,
    pub high: u64,
}

impl Uuid128 {
    /// Canonical `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` rendering: the low half's
    /// little-endian bytes followed by the high half's.
    pub fn to_hyphenated(&self) -> String {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&self.low.to_le_bytes());
        bytes[8..].copy_from_slice(&self.high.to_le_bytes());
        uuid::Uuid::from_bytes(bytes).hyphenated().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PeerType {
    Client,
    Server,
}

impl PeerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerType::Client => "Client",
            PeerType::Server => "Server",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum MessageType {
    #[serde(rename = "OUT")]
    Out,
    #[serde(rename = "ERR")]
    Err,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Out => "OUT",
            MessageType::Err => "ERR",
        }
    }
}

/// One HTTP request as seen by a router or an application container.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpTransaction {
    pub start_timestamp: Option<i64>,
    pub stop_timestamp: Option<i64>,
    pub request_id: Option<Uuid128>,
    pub peer_type: Option<PeerType>,
    pub method: Option<String>,
    pub uri: Option<String>,
    pub remote_address: Option<String>,
    pub user_agent: Option<String>,
    pub status_code: Option<i32>,
    pub content_length: Option<i64>,
    pub application_id: Option<Uuid128>,
    pub instance_index: Option<i32>,
    pub instance_id: Option<String>,
    #[serde(default)]
    pub forwarded: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLine {
    pub message: Option<String>,
    pub message_type: Option<MessageType>,
    pub timestamp: Option<i64>,
    pub app_id: Option<String>,
    pub source_type: Option<String>,
    pub source_instance: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerMetric {
    pub application_id: Option<String>,
    pub instance_index: Option<i32>,
    pub cpu_percentage: Option<f64>,
    pub memory_bytes: Option<u64>,
    pub disk_bytes: Option<u64>,
    pub memory_bytes_quota: Option<u64>,
    pub disk_bytes_quota: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterEvent {
    pub name: Option<String>,
    pub delta: Option<u64>,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueMetric {
    pub name: Option<String>,
    pub value: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNotice {
    pub source: Option<String>,
    pub code: Option<i32>,
    pub message: Option<String>,
}

impl fmt::Display for ErrorNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(source) = &self.source {
            parts.push(format!("source:{:?}", source));
        }
        if let Some(code) = self.code {
            parts.push(format!("code:{}", code));
        }
        if let Some(message) = &self.message {
            parts.push(format!("message:{:?}", message));
        }
        f.write_str(&parts.join(" "))
    }
}

/// The variant payload of an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    HttpTransaction(HttpTransaction),
    LogLine(LogLine),
    ContainerMetric(ContainerMetric),
    CounterEvent(CounterEvent),
    ValueMetric(ValueMetric),
    ErrorNotice(ErrorNotice),
}

impl Event {
    pub fn event_type(&self) -> EventType {
        match self {
            Event::HttpTransaction(_) => EventType::HttpStartStop,
            Event::LogLine(_) => EventType::LogMessage,
            Event::ContainerMetric(_) => EventType::ContainerMetric,
            Event::CounterEvent(_) => EventType::CounterEvent,
            Event::ValueMetric(_) => EventType::ValueMetric,
            Event::ErrorNotice(_) => EventType::Error,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "WireEnvelope")]
pub struct Envelope {
    pub origin: Option<String>,
    pub deployment: Option<String>,
    pub job: Option<String>,
    pub index: Option<String>,
    pub ip: Option<String>,
    pub tags: BTreeMap<String, String>,
    /// `None` when the discriminant is absent or not one of the six known variants.
    pub event: Option<Event>,
}

impl Envelope {
    pub fn event_type(&self) -> Option<EventType> {
        self.event.as_ref().map(Event::event_type)
    }

    pub fn is_metric(&self) -> bool {
        self.event_type().map(|t| t.is_metric()).unwrap_or(false)
    }

    /// Decode one envelope from a JSON document.
    pub fn from_json(input: &str) -> serde_json::Result<Self> {
        serde_json::from_str(input)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    origin: Option<String>,
    event_type: Option<String>,
    deployment: Option<String>,
    job: Option<String>,
    index: Option<String>,
    ip: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    http_start_stop: Option<HttpTransaction>,
    log_message: Option<LogLine>,
    container_metric: Option<ContainerMetric>,
    counter_event: Option<CounterEvent>,
    value_metric: Option<ValueMetric>,
    error: Option<ErrorNotice>,
}

impl From<WireEnvelope> for Envelope {
    fn from(wire: WireEnvelope) -> Self {
        // A discriminant without its payload object decodes as an empty payload.
        let event = wire
            .event_type
            .as_deref()
            .and_then(EventType::from_wire)
            .map(|event_type| match event_type {
                EventType::HttpStartStop => {
                    Event::HttpTransaction(wire.http_start_stop.unwrap_or_default())
                }
                EventType::LogMessage => Event::LogLine(wire.log_message.unwrap_or_default()),
                EventType::ContainerMetric => {
                    Event::ContainerMetric(wire.container_metric.unwrap_or_default())
                }
                EventType::CounterEvent => {
                    Event::CounterEvent(wire.counter_event.unwrap_or_default())
                }
                EventType::ValueMetric => Event::ValueMetric(wire.value_metric.unwrap_or_default()),
                EventType::Error => Event::ErrorNotice(wire.error.unwrap_or_default()),
            });

        Envelope {
            origin: wire.origin,
            deployment: wire.deployment,
            job: wire.job,
            index: wire.index,
            ip: wire.ip,
            tags: wire.tags,
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_formatting_is_little_endian() {
        let id = Uuid128 {
            low: 0x0102030405060708,
            high: 0x1112131415161718,
        };
        assert_eq!(id.to_hyphenated(), "08070605-0403-0201-1817-161514131211");
    }

    #[test]
    fn test_uuid_formatting_zero() {
        let id = Uuid128 { low: 0, high: 0 };
        assert_eq!(id.to_hyphenated(), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn test_decode_log_message_envelope() {
        let json = r#"{
            "origin": "rep",
            "eventType": "LogMessage",
            "deployment": "cf",
            "job": "diego_cell",
            "index": "7c3f",
            "ip": "10.0.16.5",
            "tags": {"source_id": "abc"},
            "logMessage": {"message": "hello", "messageType": "OUT", "timestamp": 1500000000000000000, "appId": "abc"}
        }"#;
        let env = Envelope::from_json(json).unwrap();
        assert_eq!(env.event_type(), Some(EventType::LogMessage));
        assert_eq!(env.tags.get("source_id").map(String::as_str), Some("abc"));
        match env.event {
            Some(Event::LogLine(log)) => {
                assert_eq!(log.message.as_deref(), Some("hello"));
                assert_eq!(log.message_type, Some(MessageType::Out));
                assert_eq!(log.source_type, None);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_type_has_no_event() {
        let env = Envelope::from_json(r#"{"origin": "x", "eventType": "Heartbeat"}"#).unwrap();
        assert!(env.event.is_none());
        assert!(!env.is_metric());
    }

    #[test]
    fn test_missing_payload_decodes_as_empty_variant() {
        let env = Envelope::from_json(r#"{"eventType": "CounterEvent"}"#).unwrap();
        assert_eq!(env.event, Some(Event::CounterEvent(CounterEvent::default())));
        assert!(env.is_metric());
    }

    #[test]
    fn test_error_notice_display() {
        let notice = ErrorNotice {
            source: Some("doppler".into()),
            code: Some(3),
            message: Some("slow consumer".into()),
        };
        assert_eq!(
            notice.to_string(),
            r#"source:"doppler" code:3 message:"slow consumer""#
        );
    }
}
