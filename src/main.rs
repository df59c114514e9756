//! ping-exporter binary entry point.
//!
//! Runs the probe scheduler and the metrics endpoint until interrupted.
//! Core functionality is provided by the `ping_exporter` library crate.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use ping_exporter::{
    AppConfig, IcmpConfig, IcmpProber, MetricsRegistry, Prober, Scheduler,
    probe::reduce,
    server::{AppState, create_router},
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to wait for the scheduler and server to stop after a signal.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// ping-exporter - ICMP reachability and latency exporter
#[derive(Parser, Debug)]
#[command(name = "ping-exporter", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML, or JSON with a .json extension)
    #[arg(
        short,
        long,
        default_value = "configs/config.yaml",
        env = "PING_EXPORTER_CONFIG"
    )]
    config: String,

    /// Metrics endpoint bind address (overrides config file)
    #[arg(long, env = "PING_EXPORTER_BIND")]
    bind: Option<String>,

    /// Metrics endpoint port (overrides config file)
    #[arg(long, env = "PING_EXPORTER_PORT")]
    port: Option<u16>,

    /// Stop after this many rounds instead of running until interrupted
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    rounds: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe a single host once and print the measurement as JSON
    Probe {
        /// Hostname or IP address
        host: String,

        /// Number of echo requests
        #[arg(short = 'n', long, default_value_t = 5)]
        count: u32,

        /// Per-request timeout (e.g. "1s", "500ms")
        #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
        timeout: Duration,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ping_exporter=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut cli = Cli::parse();

    match cli.command.take() {
        Some(Command::Probe {
            host,
            count,
            timeout,
        }) => probe_once(&host, count, timeout).await,
        None => run(cli).await,
    }
}

/// Probe one host and print the reduced measurement.
async fn probe_once(
    host: &str,
    count: u32,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = IcmpConfig::default().with_count(count).with_timeout(timeout);
    let prober = IcmpProber::new(config);

    tracing::info!(host = %host, count, "Pinging");
    let attempts = prober.probe(host, count).await?;
    let measurement = reduce(host, &attempts);

    println!("{}", serde_json::to_string_pretty(&measurement)?);
    Ok(())
}

/// Run the scheduler and metrics endpoint until a signal or the round limit.
async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("ping-exporter - ICMP reachability and latency exporter");

    // Load configuration from file
    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = AppConfig::load(&cli.config)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;
    let addr = config.server.socket_addr()?;

    tracing::info!(
        "Targets: {}, interval: {}s, endpoint: {}",
        config.servers.len(),
        config.interval,
        addr,
    );

    let registry = Arc::new(MetricsRegistry::new());
    let shutdown = CancellationToken::new();

    let mut run_config = config.to_run_config();
    if let Some(rounds) = cli.rounds {
        run_config = run_config.with_max_rounds(rounds);
    }
    let scheduler = Scheduler::new(
        IcmpProber::new(config.probe.clone()),
        Arc::clone(&registry),
        run_config,
    );

    // Bind before spawning so that a port conflict aborts startup
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics endpoint listening on: http://{}/metrics", addr);

    let app = create_router(AppState {
        registry: Arc::clone(&registry),
    });
    let server_shutdown = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
    });

    let scheduler_shutdown = shutdown.clone();
    let mut scheduler = tokio::spawn(async move { scheduler.run(scheduler_shutdown).await });

    tracing::info!("Press Ctrl+C to shutdown");

    tokio::select! {
        _ = shutdown_signal() => {}
        result = &mut scheduler => {
            match result {
                Ok(rounds) => tracing::info!(rounds, "Scheduler finished"),
                Err(e) => tracing::error!(error = %e, "Scheduler task failed"),
            }
        }
        result = &mut server => {
            shutdown.cancel();
            return match result {
                Ok(Ok(())) => Err("metrics server exited unexpectedly".into()),
                Ok(Err(e)) => Err(e.into()),
                Err(e) => Err(e.into()),
            };
        }
    }

    shutdown.cancel();

    tracing::info!("Shutting down...");
    if !scheduler.is_finished()
        && tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut scheduler)
            .await
            .is_err()
    {
        tracing::warn!("Scheduler shutdown timed out");
        scheduler.abort();
    }
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "Metrics server failed"),
        Ok(Err(e)) => tracing::error!(error = %e, "Metrics server task failed"),
        Err(_) => tracing::warn!("Metrics server shutdown timed out"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
