//! The main stream loop.
//!
//! One task drains envelopes, transport errors and a reporting ticker through a
//! single `select!`, so the counters read at a tick always reflect everything
//! handled before it.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::app::ports::{EnvelopeStreams, EventSink};
use crate::constants::TRANSPORT_ERROR_FIELD;
use crate::envelope::Envelope;
use crate::error::NozzleError;
use crate::observability::metrics;
use crate::record::{Dataset, TranslatedRecord};
use crate::translate::{Dispatched, Dispatcher};

/// Cumulative counters since process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub events: u64,
    pub skipped_metrics: u64,
    pub errors: u64,
}

/// One reporting interval's diagnostic record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IntervalStats {
    pub total_events: u64,
    pub total_skipped_metrics: u64,
    pub total_errors: u64,
    pub reporting_interval_sec: u64,
    pub events_per_interval: u64,
    pub metrics_per_interval_skipped: u64,
    pub errs_per_interval: u64,
    pub events_per_sec: f64,
    pub metrics_per_sec_skipped: f64,
    pub errs_per_sec: f64,
}

impl IntervalStats {
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Current counters plus the snapshot taken at the previous report.
#[derive(Debug, Default)]
pub struct StreamStats {
    current: Counters,
    previous: Counters,
}

impl StreamStats {
    pub fn record_event(&mut self) {
        self.current.events += 1;
    }

    pub fn record_skipped_metric(&mut self) {
        self.current.skipped_metrics += 1;
    }

    pub fn record_error(&mut self) {
        self.current.errors += 1;
    }

    pub fn totals(&self) -> Counters {
        self.current
    }

    /// Compute deltas against the previous snapshot, then take a new snapshot.
    pub fn report(&mut self, interval_secs: u64) -> IntervalStats {
        let events = self.current.events - self.previous.events;
        let skipped = self.current.skipped_metrics - self.previous.skipped_metrics;
        let errors = self.current.errors - self.previous.errors;
        let per_sec = |delta: u64| {
            if interval_secs == 0 {
                0.0
            } else {
                delta as f64 / interval_secs as f64
            }
        };

        let stats = IntervalStats {
            total_events: self.current.events,
            total_skipped_metrics: self.current.skipped_metrics,
            total_errors: self.current.errors,
            reporting_interval_sec: interval_secs,
            events_per_interval: events,
            metrics_per_interval_skipped: skipped,
            errs_per_interval: errors,
            events_per_sec: per_sec(events),
            metrics_per_sec_skipped: per_sec(skipped),
            errs_per_sec: per_sec(errors),
        };
        self.previous = self.current;
        stats
    }
}

pub struct StreamAggregator {
    dispatcher: Dispatcher,
    sink: Arc<dyn EventSink>,
    reporting_interval: Duration,
    stats: StreamStats,
    stats_listener: Option<mpsc::UnboundedSender<IntervalStats>>,
}

impl StreamAggregator {
    pub fn new(dispatcher: Dispatcher, sink: Arc<dyn EventSink>, reporting_interval: Duration) -> Self {
        Self {
            dispatcher,
            sink,
            reporting_interval,
            stats: StreamStats::default(),
            stats_listener: None,
        }
    }

    /// Also deliver every diagnostic record to `listener`.
    pub fn with_stats_listener(mut self, listener: mpsc::UnboundedSender<IntervalStats>) -> Self {
        self.stats_listener = Some(listener);
        self
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub async fn handle_envelope(&mut self, envelope: Envelope) {
        match self.dispatcher.dispatch(envelope).await {
            Dispatched::SkippedMetric => {
                self.stats.record_skipped_metric();
                metrics::translate::metric_skipped();
            }
            Dispatched::Record(record) => {
                self.stats.record_event();
                match record.dataset {
                    Some(dataset) => {
                        metrics::translate::envelope_translated(dataset.as_str());
                        self.sink.send(record);
                    }
                    None => {
                        metrics::translate::untranslatable();
                        debug!(fields = record.len(), "envelope without a known event type, not forwarded");
                    }
                }
            }
        }
    }

    pub fn handle_error(&mut self, error: NozzleError) {
        self.stats.record_error();
        metrics::translate::transport_error();
        warn!("firehose error: {}", error);

        let mut record = TranslatedRecord::with_dataset(Dataset::Errors);
        record.add_field(TRANSPORT_ERROR_FIELD, error.to_string());
        self.sink.send(record);
    }

    /// Close the current interval and emit its diagnostic record.
    pub fn report(&mut self) -> IntervalStats {
        let stats = self.stats.report(self.reporting_interval.as_secs());
        match stats.to_json_line() {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("failed to serialize interval stats: {}", e),
        }
        if let Some(listener) = &self.stats_listener {
            let _ = listener.send(stats.clone());
        }
        stats
    }

    /// Run until both input streams close. A live firehose never closes, so in
    /// production this runs for the life of the process.
    pub async fn run(mut self, streams: EnvelopeStreams) -> Counters {
        let EnvelopeStreams {
            mut envelopes,
            mut errors,
        } = streams;
        let mut envelopes_open = true;
        let mut errors_open = true;

        let period = self.reporting_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = period.as_secs(),
            send_metrics = self.dispatcher.sends_metrics(),
            "stream aggregator started"
        );

        while envelopes_open || errors_open {
            tokio::select! {
                received = envelopes.recv(), if envelopes_open => match received {
                    Some(envelope) => self.handle_envelope(envelope).await,
                    None => {
                        debug!("envelope stream closed");
                        envelopes_open = false;
                    }
                },
                received = errors.recv(), if errors_open => match received {
                    Some(error) => self.handle_error(error),
                    None => {
                        debug!("error stream closed");
                        errors_open = false;
                    }
                },
                _ = ticker.tick() => {
                    self.report();
                }
            }
        }

        self.report();
        let totals = self.stats.totals();
        info!(
            events = totals.events,
            skipped_metrics = totals.skipped_metrics,
            errors = totals.errors,
            "stream aggregator stopped"
        );
        totals
    }
}
