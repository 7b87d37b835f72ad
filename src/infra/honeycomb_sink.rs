//! Best-effort delivery of translated records to Honeycomb.
//!
//! `send` samples, stamps the event time and enqueues; a background task groups
//! queued records by dataset and posts them to the batch API. Delivery failures
//! are logged and counted, never surfaced to the stream loop.

use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::app::ports::EventSink;
use crate::config::{NozzleConfig, ProcessIdentity};
use crate::constants::{
    NOZZLE_APP_ID_FIELD, NOZZLE_INSTANCE_ID_FIELD, NOZZLE_IN_FLIGHT_FIELD, NOZZLE_MEM_FIELD,
    NOZZLE_VERSION_FIELD,
};
use crate::error::{NozzleError, Result};
use crate::infra::http_client::ensure_success;
use crate::observability::metrics;
use crate::record::{Dataset, TranslatedRecord};

const MAX_BATCH_SIZE: usize = 50;
const FLUSH_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct HoneycombSettings {
    pub api_host: String,
    pub write_key: String,
    pub sample_rate: u32,
    pub process: ProcessIdentity,
}

impl HoneycombSettings {
    pub fn from_config(config: &NozzleConfig) -> Result<Self> {
        Ok(Self {
            api_host: config.api_host.clone(),
            write_key: config.require_write_key()?.to_string(),
            sample_rate: config.sample_rate.max(1),
            process: config.process.clone(),
        })
    }
}

struct Queued {
    dataset: Dataset,
    time: DateTime<Utc>,
    record: TranslatedRecord,
}

pub struct HoneycombSink {
    tx: mpsc::UnboundedSender<Queued>,
    in_flight: Arc<AtomicUsize>,
    sample_rate: u32,
}

impl HoneycombSink {
    /// Start the delivery task. It drains and exits once every handle to the
    /// sink has been dropped.
    pub fn spawn(client: Client, settings: HoneycombSettings) -> Result<(Self, JoinHandle<()>)> {
        let base_url = Url::parse(&settings.api_host).map_err(|e| {
            NozzleError::Config(format!("Invalid Honeycomb API host '{}': {}", settings.api_host, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(NozzleError::Config(format!(
                "Honeycomb API host '{}' is not a base URL",
                settings.api_host
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let delivery = Delivery {
            client,
            base_url,
            write_key: settings.write_key,
            sample_rate: settings.sample_rate,
            process: settings.process,
            in_flight: in_flight.clone(),
        };
        let handle = tokio::spawn(delivery.run(rx));

        Ok((
            Self {
                tx,
                in_flight,
                sample_rate: settings.sample_rate,
            },
            handle,
        ))
    }

    fn sampled(&self) -> bool {
        self.sample_rate <= 1 || rand::thread_rng().gen_range(0..self.sample_rate) == 0
    }
}

impl EventSink for HoneycombSink {
    fn send(&self, record: TranslatedRecord) {
        let Some(dataset) = record.dataset else {
            debug!("dropping record without a dataset");
            return;
        };
        if !self.sampled() {
            metrics::sink::event_sampled_out();
            return;
        }

        let depth = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::sink::queue_depth(depth);
        let queued = Queued {
            dataset,
            time: Utc::now(),
            record,
        };
        if self.tx.send(queued).is_err() {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            metrics::sink::events_failed(dataset.as_str(), 1);
            warn!("Honeycomb delivery task has stopped; record dropped");
        }
    }
}

#[derive(Debug, Deserialize)]
struct BatchResult {
    status: u16,
    #[serde(default)]
    error: Option<String>,
}

struct Delivery {
    client: Client,
    base_url: Url,
    write_key: String,
    sample_rate: u32,
    process: ProcessIdentity,
    in_flight: Arc<AtomicUsize>,
}

impl Delivery {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<Queued>) {
        let mut pending: Vec<Queued> = Vec::with_capacity(MAX_BATCH_SIZE);
        let mut ticker = time::interval(FLUSH_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                queued = rx.recv() => match queued {
                    Some(queued) => {
                        pending.push(queued);
                        if pending.len() >= MAX_BATCH_SIZE {
                            self.flush(&mut pending).await;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if !pending.is_empty() {
                        self.flush(&mut pending).await;
                    }
                }
            }
        }

        if !pending.is_empty() {
            self.flush(&mut pending).await;
        }
        debug!("Honeycomb delivery task finished");
    }

    async fn flush(&self, pending: &mut Vec<Queued>) {
        let drained = std::mem::take(pending);
        let count = drained.len();
        let in_flight = self.in_flight.load(Ordering::SeqCst);
        let mem = resident_memory_bytes();

        let mut by_dataset: BTreeMap<&'static str, Vec<Value>> = BTreeMap::new();
        for queued in drained {
            let dataset = queued.dataset.as_str();
            let event = self.batch_event(queued, in_flight, mem);
            by_dataset.entry(dataset).or_default().push(event);
        }

        for (dataset, events) in by_dataset {
            let total = events.len() as u64;
            match self.post_batch(dataset, &events).await {
                Ok(results) => {
                    let failed = results
                        .iter()
                        .filter(|r| !(200..300).contains(&r.status))
                        .count() as u64;
                    if let Some(err) = results.iter().find_map(|r| r.error.as_deref()) {
                        warn!(dataset, failed, error = err, "Honeycomb rejected events");
                    }
                    metrics::sink::events_sent(dataset, total.saturating_sub(failed));
                    metrics::sink::events_failed(dataset, failed);
                }
                Err(e) => {
                    warn!(dataset, count = total, error = %e, "Honeycomb batch failed");
                    metrics::sink::events_failed(dataset, total);
                }
            }
        }

        let remaining = self
            .in_flight
            .fetch_sub(count, Ordering::SeqCst)
            .saturating_sub(count);
        metrics::sink::queue_depth(remaining);
    }

    fn batch_event(&self, queued: Queued, in_flight: usize, mem: Option<u64>) -> Value {
        let mut data = Map::new();
        data.insert(NOZZLE_APP_ID_FIELD.into(), json!(self.process.app_id));
        data.insert(NOZZLE_INSTANCE_ID_FIELD.into(), json!(self.process.instance_id));
        data.insert(NOZZLE_VERSION_FIELD.into(), json!(self.process.version));
        data.insert(NOZZLE_IN_FLIGHT_FIELD.into(), json!(in_flight));
        if let Some(mem) = mem {
            data.insert(NOZZLE_MEM_FIELD.into(), json!(mem));
        }
        for (name, value) in queued.record.fields {
            match serde_json::to_value(&value) {
                Ok(value) => {
                    data.insert(name, value);
                }
                Err(e) => debug!(field = %name, error = %e, "skipping unserializable field"),
            }
        }

        json!({
            "time": queued.time.to_rfc3339_opts(SecondsFormat::Nanos, true),
            "samplerate": self.sample_rate,
            "data": data,
        })
    }

    fn batch_url(&self, dataset: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| NozzleError::Config("Honeycomb API host is not a base URL".into()))?
            .pop_if_empty()
            .extend(["1", "batch", dataset]);
        Ok(url)
    }

    async fn post_batch(&self, dataset: &str, events: &[Value]) -> Result<Vec<BatchResult>> {
        let resp = self
            .client
            .post(self.batch_url(dataset)?)
            .header("X-Honeycomb-Team", &self.write_key)
            .json(events)
            .send()
            .await?;
        let resp = ensure_success(resp, "Honeycomb").await?;
        let body = resp.text().await?;
        // Older API versions answer with an empty body.
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Resident set size of this process, from procfs where available.
fn resident_memory_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss(&status)
}

fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}
