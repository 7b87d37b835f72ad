use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;

use firehose_nozzle::app::aggregator::{Counters, IntervalStats, StreamAggregator};
use firehose_nozzle::app::ports::EnvelopeSource;
use firehose_nozzle::cache::AppNameCache;
use firehose_nozzle::infra::file_source::{FileSource, ReplayInput};
use firehose_nozzle::infra::memory_sink::MemorySink;
use firehose_nozzle::record::{Dataset, FieldValue};
use firehose_nozzle::translate::Dispatcher;

const CAPTURE: &[&str] = &[
    r#"{"origin":"rep","eventType":"LogMessage","deployment":"cf","job":"diego_cell","index":"0","ip":"10.0.16.5","logMessage":{"message":"{\"level\":\"info\",\"latency_ms\":12}","messageType":"OUT","timestamp":1500000000000000000,"appId":"6f1c1c2e","sourceType":"APP/PROC/WEB","sourceInstance":"0"}}"#,
    r#"{"origin":"gorouter","eventType":"HttpStartStop","httpStartStop":{"startTimestamp":1000000000,"stopTimestamp":1250000000,"method":"GET","uri":"/v2/apps?q=name&page=2","statusCode":200,"requestId":{"low":1,"high":2}}}"#,
    r#"{"origin":"bbs","eventType":"ValueMetric","valueMetric":{"name":"LRPsRunning","value":42,"unit":"Metric"}}"#,
    r#"{"origin":"doppler","eventType":"Error","error":{"source":"doppler","code":1,"message":"slow consumer"}}"#,
    r#"{"origin":"mystery","eventType":"Heartbeat"}"#,
    "this line is not an envelope",
];

fn capture_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in CAPTURE {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

async fn replay(send_metrics: bool) -> (Arc<MemorySink>, Counters, Vec<IntervalStats>) {
    let file = capture_file();
    let sink = Arc::new(MemorySink::new());
    let (stats_tx, mut stats_rx) = mpsc::unbounded_channel();

    let dispatcher = Dispatcher::new(Arc::new(AppNameCache::uninitialized()), send_metrics);
    let source: Box<dyn EnvelopeSource> =
        Box::new(FileSource::new(ReplayInput::Path(file.path().to_path_buf())));
    let totals = StreamAggregator::new(dispatcher, sink.clone(), Duration::from_secs(60))
        .with_stats_listener(stats_tx)
        .run(source.start())
        .await;

    let mut reports = Vec::new();
    while let Ok(stats) = stats_rx.try_recv() {
        reports.push(stats);
    }
    (sink, totals, reports)
}

#[tokio::test]
async fn test_replay_with_metrics_suppressed() {
    let (sink, totals, reports) = replay(false).await;

    assert_eq!(totals.events, 4);
    assert_eq!(totals.skipped_metrics, 1);
    assert_eq!(totals.errors, 1);

    let records = sink.records();
    let count = |dataset: Dataset| records.iter().filter(|r| r.dataset == Some(dataset)).count();
    assert_eq!(count(Dataset::Logs), 2);
    assert_eq!(count(Dataset::Errors), 2);
    assert_eq!(count(Dataset::Metrics), 0);

    let final_report = reports.last().unwrap();
    assert_eq!(final_report.total_events, 4);
    assert_eq!(final_report.total_skipped_metrics, 1);
    assert_eq!(final_report.total_errors, 1);
}

#[tokio::test]
async fn test_replay_translates_payloads() {
    let (sink, _, _) = replay(false).await;
    let records = sink.records();

    let log = records
        .iter()
        .find(|r| r.contains("logMessage"))
        .expect("log record");
    assert_eq!(log.get("logMessage-level"), Some(&FieldValue::from("info")));
    assert_eq!(log.get("logMessage-latency_ms"), Some(&FieldValue::Int(12)));
    assert_eq!(log.get("logMessageType"), Some(&FieldValue::from("OUT")));
    assert!(!log.contains("logAppName"));

    let http = records
        .iter()
        .find(|r| r.contains("httpMethod"))
        .expect("http record");
    assert_eq!(http.get("httpDurMs"), Some(&FieldValue::Float(250.0)));
    assert_eq!(http.get("httpUriPath"), Some(&FieldValue::from("/v2/apps")));
    assert_eq!(http.get("httpUriQueryShape"), Some(&FieldValue::from("page=?&q=?")));
    assert_eq!(http.get("origin"), Some(&FieldValue::from("gorouter")));

    let notice = records
        .iter()
        .find(|r| r.contains("errorField"))
        .expect("error notice record");
    assert_eq!(notice.dataset, Some(Dataset::Errors));

    let transport = records
        .iter()
        .find(|r| r.contains("error"))
        .expect("transport error record");
    assert_eq!(transport.dataset, Some(Dataset::Errors));
    assert!(transport.get("error").and_then(FieldValue::as_str).unwrap().contains("Undecodable"));
}

#[tokio::test]
async fn test_replay_with_metrics_enabled() {
    let (sink, totals, _) = replay(true).await;

    assert_eq!(totals.events, 5);
    assert_eq!(totals.skipped_metrics, 0);

    let metric = sink
        .records()
        .into_iter()
        .find(|r| r.dataset == Some(Dataset::Metrics))
        .expect("metric record");
    assert_eq!(metric.get("valuemName"), Some(&FieldValue::from("LRPsRunning")));
    assert_eq!(metric.get("valuemValue"), Some(&FieldValue::Float(42.0)));
}
