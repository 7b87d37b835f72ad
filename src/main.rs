use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use firehose_nozzle::app::aggregator::StreamAggregator;
use firehose_nozzle::app::ports::{EnvelopeSource, EventSink};
use firehose_nozzle::cache::AppNameCache;
use firehose_nozzle::config::NozzleConfig;
use firehose_nozzle::infra::auth;
use firehose_nozzle::infra::file_source::{FileSource, ReplayInput};
use firehose_nozzle::infra::firehose_source::FirehoseSource;
use firehose_nozzle::infra::honeycomb_sink::{HoneycombSettings, HoneycombSink};
use firehose_nozzle::infra::http_client::build_client;
use firehose_nozzle::infra::stdout_sink::StdoutSink;
use firehose_nozzle::observability::{init_logging, metrics};
use firehose_nozzle::server;
use firehose_nozzle::translate::Dispatcher;

#[derive(Parser)]
#[command(name = "firehose-nozzle")]
#[command(about = "Forward Cloud Foundry firehose events to Honeycomb")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the firehose and forward events (default)
    Run,
    /// Translate recorded NDJSON envelopes and print records to stdout
    Replay {
        /// Input file, or `-` for stdin
        #[arg(long, default_value = "-")]
        input: String,
        /// Translate metric envelopes instead of skipping them
        #[arg(long)]
        send_metrics: bool,
        /// Seconds between stats lines
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = NozzleConfig::from_env().context("loading configuration")?;
    init_logging(config.log_dir.as_deref());

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Replay {
            input,
            send_metrics,
            interval_secs,
        } => {
            let interval = interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.reporting_interval());
            replay(ReplayInput::parse(&input), send_metrics, interval).await
        }
    }
}

async fn run(config: NozzleConfig) -> anyhow::Result<()> {
    metrics::init(config.metrics_addr);

    let port = config.port;
    tokio::spawn(async move {
        if let Err(e) = server::start_server(port).await {
            error!(error = %e, "health check server stopped");
        }
    });

    let client = build_client(config.skip_ssl).context("building HTTP client")?;
    let settings = HoneycombSettings::from_config(&config)?;
    let boot = auth::bootstrap(&config, &client)
        .await
        .context("authenticating against the platform")?;
    info!(
        firehose = %boot.firehose_url,
        app_names = boot.cache.is_initialized(),
        send_metrics = config.send_metrics,
        sample_rate = config.sample_rate,
        "nozzle starting"
    );

    let (sink, delivery) = HoneycombSink::spawn(client, settings)?;
    let source: Box<dyn EnvelopeSource> = Box::new(
        FirehoseSource::new(&boot.firehose_url, &config.subscription_id, boot.tokens)
            .with_skip_ssl(config.skip_ssl),
    );

    let dispatcher = Dispatcher::new(boot.cache, config.send_metrics);
    let sink: Arc<dyn EventSink> = Arc::new(sink);
    let totals = StreamAggregator::new(dispatcher, sink, config.reporting_interval())
        .run(source.start())
        .await;

    info!(?totals, "firehose stream ended; flushing");
    delivery.await.context("waiting for Honeycomb delivery")?;
    Ok(())
}

async fn replay(input: ReplayInput, send_metrics: bool, interval: Duration) -> anyhow::Result<()> {
    metrics::init(None);

    let dispatcher = Dispatcher::new(Arc::new(AppNameCache::uninitialized()), send_metrics);
    let source: Box<dyn EnvelopeSource> = Box::new(FileSource::new(input));
    let totals = StreamAggregator::new(dispatcher, Arc::new(StdoutSink), interval)
        .run(source.start())
        .await;

    info!(
        events = totals.events,
        skipped_metrics = totals.skipped_metrics,
        errors = totals.errors,
        "replay finished"
    );
    if let Some(rendered) = metrics::render() {
        debug!("internal metrics:\n{}", rendered);
    }
    Ok(())
}
