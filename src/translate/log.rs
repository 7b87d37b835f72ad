use serde_json::{Map, Value};
use tracing::trace;

use crate::cache::AppNameCache;
use crate::constants::LOG_PREFIX;
use crate::envelope::LogLine;
use crate::record::{Dataset, FieldValue, TranslatedRecord};

/// Unpack an application log line. The app name lookup is best effort: any
/// failure leaves the record without `logAppName`.
pub async fn translate(log: &LogLine, cache: &AppNameCache, record: &mut TranslatedRecord) {
    let p = LOG_PREFIX;
    record.dataset = Some(Dataset::Logs);

    if let Some(message) = &log.message {
        record.add_field(format!("{p}Message"), message.as_str());
        if let Some(parsed) = parse_embedded_json(message) {
            for (key, value) in parsed {
                if let Some(value) = FieldValue::from_json(value) {
                    record.add_field(format!("{p}Message-{key}"), value);
                }
            }
        }
    }

    record.add_opt(format!("{p}MessageType"), log.message_type.map(|t| t.as_str()));
    if let Some(ts) = log.timestamp {
        record.add_field(format!("{p}Timestamp"), FieldValue::from_unix_nanos(ts));
    }

    if let Some(app_id) = &log.app_id {
        record.add_field(format!("{p}AppId"), app_id.as_str());
        match cache.resolve(app_id).await {
            Ok(name) if !name.is_empty() => record.add_field(format!("{p}AppName"), name),
            Ok(_) => {}
            Err(e) => trace!(app_id = %app_id, error = %e, "app name lookup skipped"),
        }
    }

    record.add_opt(format!("{p}SourceType"), log.source_type.as_deref());
    record.add_opt(format!("{p}SourceInstance"), log.source_instance.as_deref());
}

/// Parse a log body as a flat JSON object. Anything else yields `None`.
pub fn parse_embedded_json(body: &str) -> Option<Map<String, Value>> {
    serde_json::from_str::<Map<String, Value>>(body).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::AppNameResolver;
    use crate::envelope::MessageType;
    use crate::error::{NozzleError, Result};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedResolver(Option<&'static str>);

    #[async_trait]
    impl AppNameResolver for FixedResolver {
        async fn app_name(&self, _app_guid: &str) -> Result<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| NozzleError::Transport("lookup failed".into()))
        }
    }

    fn full_log() -> LogLine {
        LogLine {
            message: Some("GET /orders 200".into()),
            message_type: Some(MessageType::Out),
            timestamp: Some(1_500_000_000_000_000_000),
            app_id: Some("6f1c1c2e".into()),
            source_type: Some("APP/PROC/WEB".into()),
            source_instance: Some("0".into()),
        }
    }

    #[tokio::test]
    async fn test_full_log_field_set() {
        let cache = AppNameCache::new(Arc::new(FixedResolver(Some("orders"))));
        let mut record = TranslatedRecord::new();
        translate(&full_log(), &cache, &mut record).await;

        let names: Vec<&str> = record.fields.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec![
                "logAppId",
                "logAppName",
                "logMessage",
                "logMessageType",
                "logSourceInstance",
                "logSourceType",
                "logTimestamp",
            ]
        );
        assert_eq!(record.get("logAppName"), Some(&FieldValue::from("orders")));
        assert_eq!(record.get("logMessageType"), Some(&FieldValue::from("OUT")));
    }

    #[tokio::test]
    async fn test_json_body_is_expanded() {
        let cache = AppNameCache::uninitialized();
        let log = LogLine {
            message: Some(r#"{"a":1,"b":"x"}"#.into()),
            ..Default::default()
        };
        let mut record = TranslatedRecord::new();
        translate(&log, &cache, &mut record).await;

        assert_eq!(
            record.get("logMessage"),
            Some(&FieldValue::from(r#"{"a":1,"b":"x"}"#))
        );
        assert_eq!(record.get("logMessage-a"), Some(&FieldValue::Int(1)));
        assert_eq!(record.get("logMessage-b"), Some(&FieldValue::from("x")));
        assert_eq!(record.len(), 3);
    }

    #[tokio::test]
    async fn test_plain_body_emits_only_message() {
        let cache = AppNameCache::uninitialized();
        let log = LogLine {
            message: Some("not json".into()),
            ..Default::default()
        };
        let mut record = TranslatedRecord::new();
        translate(&log, &cache, &mut record).await;

        assert_eq!(record.len(), 1);
        assert!(record.contains("logMessage"));
    }

    #[tokio::test]
    async fn test_failed_lookup_omits_app_name() {
        let cache = AppNameCache::new(Arc::new(FixedResolver(None)));
        let mut record = TranslatedRecord::new();
        translate(&full_log(), &cache, &mut record).await;

        assert!(record.contains("logAppId"));
        assert!(!record.contains("logAppName"));
    }

    #[tokio::test]
    async fn test_empty_app_name_is_not_emitted() {
        let cache = AppNameCache::new(Arc::new(FixedResolver(Some(""))));
        let mut record = TranslatedRecord::new();
        translate(&full_log(), &cache, &mut record).await;
        assert!(!record.contains("logAppName"));
    }

    #[test]
    fn test_parse_embedded_json_rejects_non_objects() {
        assert!(parse_embedded_json("[1,2,3]").is_none());
        assert!(parse_embedded_json("42").is_none());
        assert!(parse_embedded_json("{broken").is_none());
        assert!(parse_embedded_json(r#"{"k":"v"}"#).is_some());
    }
}
