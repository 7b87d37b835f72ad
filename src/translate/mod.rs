//! Envelope dispatch and per-variant translation.
//!
//! The dispatcher extracts the fields every envelope shares, then hands the
//! variant payload to its translator. Each translator owns a distinct field
//! prefix and assigns the record's dataset.

pub mod http;
pub mod log;
pub mod metric;
pub mod uri;

use std::sync::Arc;

use crate::cache::AppNameCache;
use crate::constants::{ERROR_NOTICE_FIELD, TAG_PREFIX};
use crate::envelope::{Envelope, Event};
use crate::record::{Dataset, TranslatedRecord};

/// Outcome of dispatching one envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    Record(TranslatedRecord),
    /// A metric envelope dropped by suppression before any field extraction.
    SkippedMetric,
}

pub struct Dispatcher {
    cache: Arc<AppNameCache>,
    send_metrics: bool,
}

impl Dispatcher {
    pub fn new(cache: Arc<AppNameCache>, send_metrics: bool) -> Self {
        Self {
            cache,
            send_metrics,
        }
    }

    pub fn sends_metrics(&self) -> bool {
        self.send_metrics
    }

    pub async fn dispatch(&self, envelope: Envelope) -> Dispatched {
        // Metrics dominate firehose volume; drop them before touching any field.
        if !self.send_metrics && envelope.is_metric() {
            return Dispatched::SkippedMetric;
        }
        Dispatched::Record(self.translate(envelope).await)
    }

    /// Translate one envelope regardless of suppression. Envelopes without a
    /// known variant produce only the common fields and no dataset.
    pub async fn translate(&self, envelope: Envelope) -> TranslatedRecord {
        let mut record = TranslatedRecord::new();
        add_common_fields(&envelope, &mut record);

        match envelope.event {
            Some(Event::HttpTransaction(hss)) => http::translate(&hss, &mut record),
            Some(Event::LogLine(line)) => log::translate(&line, &self.cache, &mut record).await,
            Some(Event::ContainerMetric(cm)) => metric::container_metric(&cm, &mut record),
            Some(Event::CounterEvent(ce)) => metric::counter_event(&ce, &mut record),
            Some(Event::ValueMetric(vm)) => metric::value_metric(&vm, &mut record),
            Some(Event::ErrorNotice(notice)) => {
                record.dataset = Some(Dataset::Errors);
                record.add_field(ERROR_NOTICE_FIELD, notice.to_string());
            }
            None => {}
        }

        record
    }
}

fn add_common_fields(envelope: &Envelope, record: &mut TranslatedRecord) {
    record.add_opt("origin", envelope.origin.as_deref());
    record.add_opt("eventType", envelope.event_type().map(|t| t.as_str()));
    record.add_opt("deployment", envelope.deployment.as_deref());
    record.add_opt("job", envelope.job.as_deref());
    record.add_opt("index", envelope.index.as_deref());
    record.add_opt("ip", envelope.ip.as_deref());
    for (name, value) in &envelope.tags {
        record.add_field(format!("{TAG_PREFIX}{name}"), value.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{CounterEvent, ErrorNotice, HttpTransaction, LogLine, ValueMetric};
    use crate::record::FieldValue;
    use std::collections::BTreeMap;

    fn envelope(event: Option<Event>) -> Envelope {
        let mut tags = BTreeMap::new();
        tags.insert("source_id".to_string(), "router".to_string());
        tags.insert("product".to_string(), "PAS".to_string());
        Envelope {
            origin: Some("gorouter".into()),
            deployment: Some("cf".into()),
            job: Some("router".into()),
            index: Some("9f3a".into()),
            ip: Some("10.0.1.7".into()),
            tags,
            event,
        }
    }

    fn dispatcher(send_metrics: bool) -> Dispatcher {
        Dispatcher::new(Arc::new(AppNameCache::uninitialized()), send_metrics)
    }

    #[tokio::test]
    async fn test_common_fields_and_tags() {
        let env = envelope(Some(Event::HttpTransaction(HttpTransaction::default())));
        let record = dispatcher(true).translate(env).await;

        assert_eq!(record.get("origin"), Some(&FieldValue::from("gorouter")));
        assert_eq!(record.get("eventType"), Some(&FieldValue::from("HttpStartStop")));
        assert_eq!(record.get("deployment"), Some(&FieldValue::from("cf")));
        assert_eq!(record.get("job"), Some(&FieldValue::from("router")));
        assert_eq!(record.get("index"), Some(&FieldValue::from("9f3a")));
        assert_eq!(record.get("ip"), Some(&FieldValue::from("10.0.1.7")));
        assert_eq!(record.get("tag_source_id"), Some(&FieldValue::from("router")));
        assert_eq!(record.get("tag_product"), Some(&FieldValue::from("PAS")));
        assert_eq!(record.dataset, Some(Dataset::Logs));
    }

    #[tokio::test]
    async fn test_unknown_variant_has_common_fields_only() {
        let record = dispatcher(true).translate(envelope(None)).await;
        assert_eq!(record.dataset, None);
        assert!(!record.contains("eventType"));
        assert_eq!(record.len(), 7);
    }

    #[tokio::test]
    async fn test_error_notice_routes_to_errors() {
        let notice = ErrorNotice {
            source: Some("doppler".into()),
            code: Some(1),
            message: Some("dropped".into()),
        };
        let record = dispatcher(true)
            .translate(envelope(Some(Event::ErrorNotice(notice))))
            .await;

        assert_eq!(record.dataset, Some(Dataset::Errors));
        assert_eq!(
            record.get("errorField"),
            Some(&FieldValue::from(r#"source:"doppler" code:1 message:"dropped""#))
        );
    }

    #[tokio::test]
    async fn test_suppressed_metrics_are_skipped() {
        let d = dispatcher(false);
        for event in [
            Event::ContainerMetric(Default::default()),
            Event::CounterEvent(CounterEvent {
                name: Some("x".into()),
                delta: Some(1),
                total: Some(2),
            }),
            Event::ValueMetric(ValueMetric::default()),
        ] {
            assert_eq!(d.dispatch(envelope(Some(event))).await, Dispatched::SkippedMetric);
        }
    }

    #[tokio::test]
    async fn test_suppression_does_not_affect_logs() {
        let d = dispatcher(false);
        let line = LogLine {
            message: Some("hi".into()),
            ..Default::default()
        };
        match d.dispatch(envelope(Some(Event::LogLine(line)))).await {
            Dispatched::Record(record) => {
                assert_eq!(record.dataset, Some(Dataset::Logs));
                assert!(record.contains("logMessage"));
            }
            other => panic!("expected a record, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_metrics_translated_when_enabled() {
        let d = dispatcher(true);
        let vm = ValueMetric {
            name: Some("total_tcp_routes".into()),
            value: Some(3.0),
            unit: Some("gauge".into()),
        };
        match d.dispatch(envelope(Some(Event::ValueMetric(vm)))).await {
            Dispatched::Record(record) => {
                assert_eq!(record.dataset, Some(Dataset::Metrics));
                assert_eq!(record.get("valuemValue"), Some(&FieldValue::Float(3.0)));
            }
            other => panic!("expected a record, got {:?}", other),
        }
    }
}
