//! Vehicle Collector - polls fleet telemetry into InfluxDB
//!
//! Startup sequence:
//! - Load `.env` and read configuration from the environment
//! - Discover the fleet and resolve tracked vehicles (fatal on failure)
//! - Run the collection loop until Ctrl-C / SIGTERM

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vehicle_collector::{CollectionEngine, CollectorConfig, InfluxSink, TeslaClient};

/// Collector process: configuration plus the running engine
struct Collector {
    config: CollectorConfig,
    engine: CollectionEngine<TeslaClient, InfluxSink>,
}

impl Collector {
    /// Build clients and discover the fleet
    async fn new(config: CollectorConfig) -> Result<Self> {
        info!("Initializing Vehicle Collector v{}", env!("CARGO_PKG_VERSION"));

        let http = reqwest::Client::builder()
            .timeout(config.polling.request_timeout)
            .user_agent(concat!("vehicle-collector/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        let client = TeslaClient::new(http.clone(), &config.tesla);
        let sink = InfluxSink::new(http, &config.influx);

        let engine = CollectionEngine::start(client, sink, &config.tesla.vehicles, config.polling)
            .await
            .context("Failed to discover vehicles")?;

        Ok(Collector { config, engine })
    }

    /// Run until the shutdown token fires
    async fn run(&mut self, shutdown: CancellationToken) {
        info!(
            api = %self.config.tesla.api_url,
            influx = %self.config.influx.url,
            bucket = %self.config.influx.bucket,
            "Starting collection"
        );
        self.engine.run(shutdown).await;
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "info,vehicle_collector=debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM
fn spawn_shutdown_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to install Ctrl+C handler: {}", e);
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
                    warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        info!("Shutdown requested, finishing current cycle...");
        shutdown.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    let config = CollectorConfig::from_env().context("Invalid configuration")?;
    init_tracing(config.verbose);

    info!("Starting...");

    let mut collector = Collector::new(config)
        .await
        .context("Failed to create collector")?;

    let shutdown = CancellationToken::new();
    spawn_shutdown_listener(shutdown.clone());

    collector.run(shutdown).await;

    info!("Collector stopped");
    Ok(())
}
