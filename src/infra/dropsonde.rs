//! Dropsonde protocol buffers, the binary frames the traffic controller sends
//! over the firehose websocket, and their mapping onto [`Envelope`].

use prost::Message;

use crate::envelope::{
    ContainerMetric, CounterEvent, Envelope, ErrorNotice, Event, EventType, HttpTransaction,
    LogLine, MessageType, PeerType, Uuid128, ValueMetric,
};
use crate::error::NozzleError;

/// Wire messages. Every field is optional on the wire; absent values stay `None`.
pub mod pb {
    use std::collections::HashMap;

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Envelope {
        #[prost(string, optional, tag = "1")]
        pub origin: Option<String>,
        #[prost(int32, optional, tag = "2")]
        pub event_type: Option<i32>,
        #[prost(int64, optional, tag = "6")]
        pub timestamp: Option<i64>,
        #[prost(message, optional, tag = "7")]
        pub http_start_stop: Option<HttpStartStop>,
        #[prost(message, optional, tag = "8")]
        pub log_message: Option<LogMessage>,
        #[prost(message, optional, tag = "9")]
        pub value_metric: Option<ValueMetric>,
        #[prost(message, optional, tag = "10")]
        pub counter_event: Option<CounterEvent>,
        #[prost(message, optional, tag = "11")]
        pub error: Option<Error>,
        #[prost(message, optional, tag = "12")]
        pub container_metric: Option<ContainerMetric>,
        #[prost(string, optional, tag = "13")]
        pub deployment: Option<String>,
        #[prost(string, optional, tag = "14")]
        pub job: Option<String>,
        #[prost(string, optional, tag = "15")]
        pub index: Option<String>,
        #[prost(string, optional, tag = "16")]
        pub ip: Option<String>,
        #[prost(map = "string, string", tag = "17")]
        pub tags: HashMap<String, String>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Uuid {
        #[prost(uint64, optional, tag = "1")]
        pub low: Option<u64>,
        #[prost(uint64, optional, tag = "2")]
        pub high: Option<u64>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct HttpStartStop {
        #[prost(int64, optional, tag = "1")]
        pub start_timestamp: Option<i64>,
        #[prost(int64, optional, tag = "2")]
        pub stop_timestamp: Option<i64>,
        #[prost(message, optional, tag = "3")]
        pub request_id: Option<Uuid>,
        #[prost(int32, optional, tag = "4")]
        pub peer_type: Option<i32>,
        #[prost(int32, optional, tag = "5")]
        pub method: Option<i32>,
        #[prost(string, optional, tag = "6")]
        pub uri: Option<String>,
        #[prost(string, optional, tag = "7")]
        pub remote_address: Option<String>,
        #[prost(string, optional, tag = "8")]
        pub user_agent: Option<String>,
        #[prost(int32, optional, tag = "9")]
        pub status_code: Option<i32>,
        #[prost(int64, optional, tag = "10")]
        pub content_length: Option<i64>,
        #[prost(message, optional, tag = "12")]
        pub application_id: Option<Uuid>,
        #[prost(int32, optional, tag = "13")]
        pub instance_index: Option<i32>,
        #[prost(string, optional, tag = "14")]
        pub instance_id: Option<String>,
        #[prost(string, repeated, tag = "15")]
        pub forwarded: Vec<String>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct LogMessage {
        #[prost(bytes = "vec", optional, tag = "1")]
        pub message: Option<Vec<u8>>,
        #[prost(int32, optional, tag = "2")]
        pub message_type: Option<i32>,
        #[prost(int64, optional, tag = "3")]
        pub timestamp: Option<i64>,
        #[prost(string, optional, tag = "4")]
        pub app_id: Option<String>,
        #[prost(string, optional, tag = "5")]
        pub source_type: Option<String>,
        #[prost(string, optional, tag = "6")]
        pub source_instance: Option<String>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ValueMetric {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(double, optional, tag = "2")]
        pub value: Option<f64>,
        #[prost(string, optional, tag = "3")]
        pub unit: Option<String>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CounterEvent {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(uint64, optional, tag = "2")]
        pub delta: Option<u64>,
        #[prost(uint64, optional, tag = "3")]
        pub total: Option<u64>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ContainerMetric {
        #[prost(string, optional, tag = "1")]
        pub application_id: Option<String>,
        #[prost(int32, optional, tag = "2")]
        pub instance_index: Option<i32>,
        #[prost(double, optional, tag = "3")]
        pub cpu_percentage: Option<f64>,
        #[prost(uint64, optional, tag = "4")]
        pub memory_bytes: Option<u64>,
        #[prost(uint64, optional, tag = "5")]
        pub disk_bytes: Option<u64>,
        #[prost(uint64, optional, tag = "6")]
        pub memory_bytes_quota: Option<u64>,
        #[prost(uint64, optional, tag = "7")]
        pub disk_bytes_quota: Option<u64>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Error {
        #[prost(string, optional, tag = "1")]
        pub source: Option<String>,
        #[prost(int32, optional, tag = "2")]
        pub code: Option<i32>,
        #[prost(string, optional, tag = "3")]
        pub message: Option<String>,
    }
}

/// HTTP method names indexed by their dropsonde enum value.
const METHODS: &[(i32, &str)] = &[
    (1, "GET"),
    (2, "POST"),
    (3, "PUT"),
    (4, "DELETE"),
    (5, "HEAD"),
    (6, "ACL"),
    (7, "BASELINE_CONTROL"),
    (8, "BIND"),
    (9, "CHECKIN"),
    (10, "CHECKOUT"),
    (11, "CONNECT"),
    (12, "COPY"),
    (13, "DEBUG"),
    (14, "LABEL"),
    (15, "LINK"),
    (16, "LOCK"),
    (17, "MERGE"),
    (18, "MKACTIVITY"),
    (19, "MKCALENDAR"),
    (20, "MKCOL"),
    (21, "MKREDIRECTREF"),
    (22, "MKWORKSPACE"),
    (23, "MOVE"),
    (24, "OPTIONS"),
    (25, "ORDERPATCH"),
    (26, "PATCH"),
    (27, "PRI"),
    (28, "PROPFIND"),
    (29, "PROPPATCH"),
    (30, "REBIND"),
    (31, "REPORT"),
    (32, "SEARCH"),
    (33, "SHOWMETHOD"),
    (34, "SPACEJUMP"),
    (35, "TEXTSEARCH"),
    (36, "TRACE"),
    (37, "TRACK"),
    (38, "UNBIND"),
    (39, "UNCHECKOUT"),
    (40, "UNLINK"),
    (41, "UNLOCK"),
    (42, "UPDATE"),
    (43, "UPDATEREDIRECTREF"),
    (44, "VERSION_CONTROL"),
];

fn method_name(code: i32) -> Option<String> {
    METHODS
        .iter()
        .find(|(value, _)| *value == code)
        .map(|(_, name)| name.to_string())
}

fn event_type(code: i32) -> Option<EventType> {
    match code {
        4 => Some(EventType::HttpStartStop),
        5 => Some(EventType::LogMessage),
        6 => Some(EventType::ValueMetric),
        7 => Some(EventType::CounterEvent),
        8 => Some(EventType::Error),
        9 => Some(EventType::ContainerMetric),
        _ => None,
    }
}

fn peer_type(code: i32) -> Option<PeerType> {
    match code {
        1 => Some(PeerType::Client),
        2 => Some(PeerType::Server),
        _ => None,
    }
}

fn message_type(code: i32) -> Option<MessageType> {
    match code {
        1 => Some(MessageType::Out),
        2 => Some(MessageType::Err),
        _ => None,
    }
}

impl From<pb::Uuid> for Uuid128 {
    fn from(id: pb::Uuid) -> Self {
        Uuid128 {
            low: id.low.unwrap_or_default(),
            high: id.high.unwrap_or_default(),
        }
    }
}

impl From<pb::HttpStartStop> for HttpTransaction {
    fn from(http: pb::HttpStartStop) -> Self {
        HttpTransaction {
            start_timestamp: http.start_timestamp,
            stop_timestamp: http.stop_timestamp,
            request_id: http.request_id.map(Uuid128::from),
            peer_type: http.peer_type.and_then(peer_type),
            method: http.method.and_then(method_name),
            uri: http.uri,
            remote_address: http.remote_address,
            user_agent: http.user_agent,
            status_code: http.status_code,
            content_length: http.content_length,
            application_id: http.application_id.map(Uuid128::from),
            instance_index: http.instance_index,
            instance_id: http.instance_id,
            forwarded: http.forwarded,
        }
    }
}

impl From<pb::LogMessage> for LogLine {
    fn from(log: pb::LogMessage) -> Self {
        LogLine {
            message: log
                .message
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
            message_type: log.message_type.and_then(message_type),
            timestamp: log.timestamp,
            app_id: log.app_id,
            source_type: log.source_type,
            source_instance: log.source_instance,
        }
    }
}

impl From<pb::ContainerMetric> for ContainerMetric {
    fn from(m: pb::ContainerMetric) -> Self {
        ContainerMetric {
            application_id: m.application_id,
            instance_index: m.instance_index,
            cpu_percentage: m.cpu_percentage,
            memory_bytes: m.memory_bytes,
            disk_bytes: m.disk_bytes,
            memory_bytes_quota: m.memory_bytes_quota,
            disk_bytes_quota: m.disk_bytes_quota,
        }
    }
}

impl From<pb::Envelope> for Envelope {
    fn from(wire: pb::Envelope) -> Self {
        // Same rule as the JSON model: a known type without its payload is an empty payload.
        let event = wire
            .event_type
            .and_then(event_type)
            .map(|event_type| match event_type {
                EventType::HttpStartStop => Event::HttpTransaction(
                    wire.http_start_stop.map(Into::into).unwrap_or_default(),
                ),
                EventType::LogMessage => {
                    Event::LogLine(wire.log_message.map(Into::into).unwrap_or_default())
                }
                EventType::ContainerMetric => Event::ContainerMetric(
                    wire.container_metric.map(Into::into).unwrap_or_default(),
                ),
                EventType::CounterEvent => {
                    let c = wire.counter_event.unwrap_or_default();
                    Event::CounterEvent(CounterEvent {
                        name: c.name,
                        delta: c.delta,
                        total: c.total,
                    })
                }
                EventType::ValueMetric => {
                    let v = wire.value_metric.unwrap_or_default();
                    Event::ValueMetric(ValueMetric {
                        name: v.name,
                        value: v.value,
                        unit: v.unit,
                    })
                }
                EventType::Error => {
                    let e = wire.error.unwrap_or_default();
                    Event::ErrorNotice(ErrorNotice {
                        source: e.source,
                        code: e.code,
                        message: e.message,
                    })
                }
            });

        Envelope {
            origin: wire.origin,
            deployment: wire.deployment,
            job: wire.job,
            index: wire.index,
            ip: wire.ip,
            tags: wire.tags.into_iter().collect(),
            event,
        }
    }
}

/// Decode one binary websocket frame.
pub fn decode_frame(frame: &[u8]) -> Result<Envelope, NozzleError> {
    pb::Envelope::decode(frame)
        .map(Envelope::from)
        .map_err(|e| NozzleError::Decode(e.to_string()))
}
