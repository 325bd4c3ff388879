//! tlstap - passive TLS handshake sensor
//!
//! Attaches a TC classifier to a network interface and reports every TLS
//! handshake it sees: offered versions and ciphers, SNI, and the
//! negotiated parameters. Capture is fully passive; no traffic is
//! modified or terminated.

mod config;
mod shutdown;
mod sink;

use clap::Parser;
use config::{ConfigLoader, SensorConfig};
use std::path::PathBuf;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "tlstap")]
#[command(version)]
#[command(about = "Passive TLS handshake sensor using TC/eBPF", long_about = None)]
struct Cli {
    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to configuration file
    #[arg(short, long, env = "TLSTAP_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to observe (overrides config)
    #[arg(short, long)]
    interface: Option<String>,

    /// Path to the compiled eBPF object (overrides config)
    #[arg(long = "ebpf-object")]
    object: Option<PathBuf>,

    /// JSONL output file (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = ConfigLoader::new().with_cli_path(cli.config.clone()).load()?;
    let mut sensor_config = loaded.config;
    apply_cli_overrides(&mut sensor_config, &cli);

    // CLI verbose flag takes precedence over the configured level.
    let log_level = if cli.verbose > 0 {
        match cli.verbose {
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    } else {
        match sensor_config.sensor.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // The loader ran before logging was up; report its outcome now.
    for path in &loaded.ignored {
        warn!("config path does not exist: {}", path.display());
    }
    match &loaded.source {
        Some(path) => info!("loaded configuration from {}", path.display()),
        None => debug!("no config file found, using defaults"),
    }

    run(sensor_config).await
}

fn apply_cli_overrides(config: &mut SensorConfig, cli: &Cli) {
    if let Some(interface) = &cli.interface {
        config.capture.interface = interface.clone();
    }
    if let Some(object) = &cli.object {
        config.capture.object_path = object.clone();
    }
    if let Some(output) = &cli.output {
        config.export.jsonl_path = Some(output.clone());
    }
}

#[cfg(target_os = "linux")]
async fn run(config: SensorConfig) -> anyhow::Result<()> {
    use sink::{FanoutSink, JsonlSink, JsonlSinkConfig, LogSink};
    use std::sync::Arc;
    use tlstap_core::{AddressEnricher, EventSink};
    use tlstap_enrich::LocalHostEnricher;
    use tlstap_tc::{run_reader, AttachConfig, TcAttachment, EVENT_CHANNEL_CAPACITY};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    let attach_config = AttachConfig {
        interface: config.capture.interface.clone(),
        object_path: config.capture.object_path.clone(),
    };
    let mut attachment = TcAttachment::attach(&attach_config)?;

    let report = attachment.report();
    if report.is_degraded() {
        warn!(
            iface = %report.interface,
            directions = ?report.attached_directions(),
            "running degraded, only one direction attached"
        );
    }

    let mut sinks: Vec<Box<dyn EventSink>> = Vec::new();
    if let Some(path) = &config.export.jsonl_path {
        sinks.push(Box::new(JsonlSink::new(JsonlSinkConfig {
            path: path.clone(),
            append: config.export.append,
            flush_each: config.export.flush_each,
        })?));
    }
    if config.export.log_events || sinks.is_empty() {
        sinks.push(Box::new(LogSink));
    }
    let sink: Arc<dyn EventSink> = Arc::new(FanoutSink::new(sinks));
    let enricher: Arc<dyn AddressEnricher> = Arc::new(LocalHostEnricher::new());

    let pump_cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (pumps, pump_stats) = attachment
        .take_event_channel()?
        .spawn_pumps(pump_cancel.clone(), tx)?;

    // The reader gets its own token: on shutdown the pumps are cancelled
    // first and the reader drains what is already queued, exiting when
    // the last sender is gone.
    let reader_cancel = CancellationToken::new();
    let reader = tokio::spawn(run_reader(
        rx,
        reader_cancel.clone(),
        enricher,
        sink.clone(),
    ));

    info!(iface = %config.capture.interface, "sensor running, ctrl-c to stop");
    shutdown::wait_for_signal().await;

    pump_cancel.cancel();
    for pump in pumps {
        let _ = pump.await;
    }
    let stats = match reader.await {
        Ok(stats) => stats,
        Err(err) => {
            warn!(error = %err, "reader task panicked");
            Default::default()
        }
    };
    if let Err(err) = sink.flush().await {
        warn!(error = %err, "final flush failed");
    }
    drop(attachment);

    info!(
        decoded = stats.decoded,
        dropped = stats.dropped,
        lost = pump_stats.lost(),
        published = stats.published,
        "sensor stopped"
    );
    Ok(())
}

#[cfg(not(target_os = "linux"))]
async fn run(_config: SensorConfig) -> anyhow::Result<()> {
    anyhow::bail!("TC capture requires Linux")
}
