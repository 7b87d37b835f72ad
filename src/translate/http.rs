use super::uri;
use crate::constants::HTTP_PREFIX;
use crate::envelope::HttpTransaction;
use crate::record::{Dataset, FieldValue, TranslatedRecord};

/// Unpack an http start/stop event.
pub fn translate(hss: &HttpTransaction, record: &mut TranslatedRecord) {
    let p = HTTP_PREFIX;
    record.dataset = Some(Dataset::Logs);

    if let Some(start) = hss.start_timestamp {
        record.add_field(format!("{p}StartTimestamp"), FieldValue::from_unix_nanos(start));
    }
    if let Some(stop) = hss.stop_timestamp {
        record.add_field(format!("{p}StopTimestamp"), FieldValue::from_unix_nanos(stop));
    }
    if let (Some(start), Some(stop)) = (hss.start_timestamp, hss.stop_timestamp) {
        let duration_ms = stop.saturating_sub(start) as f64 / 1_000_000.0;
        record.add_field(format!("{p}DurMs"), duration_ms);
    }

    record.add_opt(
        format!("{p}RequestId"),
        hss.request_id.map(|id| id.to_hyphenated()),
    );
    record.add_opt(format!("{p}PeerType"), hss.peer_type.map(|t| t.as_str()));
    record.add_opt(format!("{p}Method"), hss.method.as_deref());

    if let Some(raw) = &hss.uri {
        record.add_field(format!("{p}Uri"), raw.as_str());
        let shape = uri::parse(raw);
        record.add_field(format!("{p}UriPath"), shape.path);
        if !shape.query.is_empty() {
            record.add_field(format!("{p}UriQuery"), shape.query);
            record.add_field(format!("{p}UriQueryShape"), shape.query_shape);
        }
    }

    record.add_opt(format!("{p}RemoteAddress"), hss.remote_address.as_deref());
    record.add_opt(format!("{p}UserAgent"), hss.user_agent.as_deref());
    record.add_opt(format!("{p}StatusCode"), hss.status_code);
    record.add_opt(format!("{p}ContentLength"), hss.content_length);
    record.add_opt(
        format!("{p}ApplicationId"),
        hss.application_id.map(|id| id.to_hyphenated()),
    );
    record.add_opt(format!("{p}InstanceIndex"), hss.instance_index);
    record.add_opt(format!("{p}InstanceId"), hss.instance_id.as_deref());

    for (i, address) in hss.forwarded.iter().enumerate() {
        record.add_field(format!("{p}Forwarded-{i}"), address.as_str());
    }
}
