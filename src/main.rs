//! predictor - prediction service.
//!
//! Usage:
//!   predictor serve [--config FILE]   Run the HTTP service until Ctrl+C
//!   predictor config [--config FILE]  Print the effective settings

use clap::{Parser, Subcommand};
use predictor::config::LogFormat;
use predictor::{
    ApiConfig, EventBus, Executor, LoggingHandler, Metrics, MetricsRecorder, Settings,
    SettingsLoader, StubModel, create_api_state,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// predictor - serialized model predictions over HTTP
#[derive(Parser)]
#[command(name = "predictor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Path to a YAML settings file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Address to bind to (overrides settings)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides settings)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the effective settings as YAML
    Config {
        /// Path to a YAML settings file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is normal.
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => {
            let mut settings = SettingsLoader::load(config.as_deref())?;
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }

            init_logging(&settings);
            if dotenv_loaded {
                info!("Loaded environment from .env");
            }

            serve(settings).await?;
        }
        Commands::Config { config } => {
            let settings = SettingsLoader::load(config.as_deref())?;
            print!("{}", serde_yaml::to_string(&settings)?);
        }
    }

    Ok(())
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    match settings.logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Run the service until Ctrl+C, then drain the executor.
async fn serve(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let metrics = Arc::new(Metrics::new());

    let event_bus = EventBus::new();
    event_bus.register(Arc::new(LoggingHandler)).await;
    event_bus
        .register(Arc::new(MetricsRecorder::new(Arc::clone(&metrics))))
        .await;

    let model = StubModel::new(settings.model.min_delay(), settings.model.max_delay());
    info!(
        min_delay_ms = settings.model.min_delay_ms,
        max_delay_ms = settings.model.max_delay_ms,
        timeout_secs = settings.model.timeout_secs,
        "Model ready"
    );

    let executor = Arc::new(
        Executor::builder(Arc::new(model))
            .with_event_bus(Arc::new(event_bus))
            .with_shutdown_timeout(settings.shutdown_timeout())
            .start(),
    );

    let state = create_api_state(
        Arc::clone(&executor),
        metrics,
        settings.rate_limit,
        settings.model.timeout(),
    );
    let api_config = ApiConfig::from_settings(&settings);

    info!("Press Ctrl+C to stop");
    predictor::api::serve(&api_config, state, shutdown_signal()).await?;

    info!(
        queued = executor.queue_depth(),
        "Shutting down executor..."
    );
    executor.shutdown().await;

    info!("Goodbye!");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
