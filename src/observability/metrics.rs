//! Internal metrics for the nozzle
//!
//! Thin wrappers over the `metrics` facade, grouped by the component that
//! records them. Without an installed recorder every call is a no-op, so
//! library code and tests can record freely.

use std::fmt;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Enum representing all metric names used by the nozzle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Translation
    EnvelopesTranslated,
    MetricsSkipped,
    TransportErrors,
    Untranslatable,

    // Identifier cache
    CacheHits,
    CacheMisses,
    CacheLookupFailures,

    // Sink
    SinkEventsSent,
    SinkEventsFailed,
    SinkEventsSampledOut,
    SinkQueueDepth,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::EnvelopesTranslated => "nozzle_translate_envelopes_total",
            MetricName::MetricsSkipped => "nozzle_translate_metrics_skipped_total",
            MetricName::TransportErrors => "nozzle_translate_transport_errors_total",
            MetricName::Untranslatable => "nozzle_translate_untranslatable_total",

            MetricName::CacheHits => "nozzle_cache_hits_total",
            MetricName::CacheMisses => "nozzle_cache_misses_total",
            MetricName::CacheLookupFailures => "nozzle_cache_lookup_failures_total",

            MetricName::SinkEventsSent => "nozzle_sink_events_sent_total",
            MetricName::SinkEventsFailed => "nozzle_sink_events_failed_total",
            MetricName::SinkEventsSampledOut => "nozzle_sink_events_sampled_out_total",
            MetricName::SinkQueueDepth => "nozzle_sink_queue_depth",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            MetricName::EnvelopesTranslated => "Envelopes translated into records",
            MetricName::MetricsSkipped => "Metric envelopes skipped by suppression",
            MetricName::TransportErrors => "Errors reported by the firehose connection",
            MetricName::Untranslatable => "Envelopes without a known variant",
            MetricName::CacheHits => "App name lookups served from the cache",
            MetricName::CacheMisses => "App name lookups sent to the resolver",
            MetricName::CacheLookupFailures => "App name lookups that failed remotely",
            MetricName::SinkEventsSent => "Events accepted by the sink endpoint",
            MetricName::SinkEventsFailed => "Events the sink failed to deliver",
            MetricName::SinkEventsSampledOut => "Events dropped by sampling",
            MetricName::SinkQueueDepth => "Events queued for delivery",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            EnvelopesTranslated,
            MetricsSkipped,
            TransportErrors,
            Untranslatable,
            CacheHits,
            CacheMisses,
            CacheLookupFailures,
            SinkEventsSent,
            SinkEventsFailed,
            SinkEventsSampledOut,
            SinkQueueDepth,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder, serving `/metrics` on `addr` when given.
///
/// Idempotent: later calls return without touching the installed recorder.
/// Serving requires a running tokio runtime.
pub fn init(addr: Option<SocketAddr>) {
    if HANDLE.get().is_some() {
        return;
    }

    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let handle = match addr {
        Some(addr) => match builder.with_http_listener(addr).build() {
            Ok((recorder, exporter)) => {
                let handle = recorder.handle();
                if ::metrics::set_global_recorder(recorder).is_err() {
                    warn!("A global metrics recorder is already installed");
                    return;
                }
                tokio::spawn(async move {
                    match exporter.await {
                        Ok(()) => {}
                        Err(_) => warn!("Prometheus exporter stopped"),
                    }
                });
                info!("Prometheus HTTP exporter listening on http://{}/metrics", addr);
                handle
            }
            Err(e) => {
                warn!("Failed to build Prometheus exporter: {}", e);
                return;
            }
        },
        None => match builder.install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
                return;
            }
        },
    };

    let _ = HANDLE.set(handle);
    describe_all();
}

/// Render the current metric values in Prometheus text format.
pub fn render() -> Option<String> {
    HANDLE.get().map(|handle| handle.render())
}

fn describe_all() {
    for name in MetricName::all_metrics() {
        if name == MetricName::SinkQueueDepth {
            ::metrics::describe_gauge!(name.as_str(), name.help());
        } else {
            ::metrics::describe_counter!(name.as_str(), name.help());
        }
    }
}

// ============================================================================
// Translation Metrics
// ============================================================================

pub mod translate {
    use super::MetricName;

    pub fn envelope_translated(dataset: &'static str) {
        ::metrics::counter!(MetricName::EnvelopesTranslated.as_str(), "dataset" => dataset)
            .increment(1);
    }

    pub fn metric_skipped() {
        ::metrics::counter!(MetricName::MetricsSkipped.as_str()).increment(1);
    }

    pub fn transport_error() {
        ::metrics::counter!(MetricName::TransportErrors.as_str()).increment(1);
    }

    pub fn untranslatable() {
        ::metrics::counter!(MetricName::Untranslatable.as_str()).increment(1);
    }
}

// ============================================================================
// Identifier Cache Metrics
// ============================================================================

pub mod cache {
    use super::MetricName;

    pub fn hit() {
        ::metrics::counter!(MetricName::CacheHits.as_str()).increment(1);
    }

    pub fn miss() {
        ::metrics::counter!(MetricName::CacheMisses.as_str()).increment(1);
    }

    pub fn lookup_failed() {
        ::metrics::counter!(MetricName::CacheLookupFailures.as_str()).increment(1);
    }
}

// ============================================================================
// Sink Metrics
// ============================================================================

pub mod sink {
    use super::MetricName;

    pub fn events_sent(dataset: &'static str, count: u64) {
        ::metrics::counter!(MetricName::SinkEventsSent.as_str(), "dataset" => dataset)
            .increment(count);
    }

    pub fn events_failed(dataset: &'static str, count: u64) {
        ::metrics::counter!(MetricName::SinkEventsFailed.as_str(), "dataset" => dataset)
            .increment(count);
    }

    pub fn event_sampled_out() {
        ::metrics::counter!(MetricName::SinkEventsSampledOut.as_str()).increment(1);
    }

    pub fn queue_depth(depth: usize) {
        ::metrics::gauge!(MetricName::SinkQueueDepth.as_str()).set(depth as f64);
    }
}
