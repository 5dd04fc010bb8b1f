//! Panel Sync CLI
//!
//! Headless consumer of the dashboard sync core, plus the settings surface
//! and one-shot user actions.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use panel_sync::health::ConnectionHealthMonitor;
use panel_sync::io::{HttpClient, ReqwestHttpClient};
use panel_sync::mutation::run_mutation;
use panel_sync::notify::TracingSink;
use panel_sync::order::OrderFlow;
use panel_sync::resources::Backend;
use panel_sync::settings::{
    ConfigProvider, FileSettingsStore, BACKEND_ADDRESS_KEY, SECRET_KEY_KEY,
};
use panel_sync::{build_client, load_config, Config};
use tracing::Level;

#[derive(Parser)]
#[command(name = "panel-sync")]
#[command(about = "Resource synchronization core for the automation backend dashboard")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Settings file with the backend address and secret (overrides config file)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the configured resources and log their state (default)
    Watch,
    /// Store the backend address and/or API secret
    Configure {
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        secret: Option<String>,
        /// Remove the stored secret; requests go out without auth headers
        #[arg(long, conflicts_with = "secret")]
        clear_secret: bool,
    },
    /// Probe the backend once
    Check,
    /// Preview the price of an order
    Quote {
        #[arg(long)]
        product: String,
        #[arg(long)]
        location: String,
        #[arg(long = "addon")]
        addons: Vec<String>,
    },
    /// Submit an order to the purchase queue
    Order {
        #[arg(long)]
        product: String,
        #[arg(long)]
        location: String,
        #[arg(long = "addon")]
        addons: Vec<String>,
    },
    /// Remove an item from the purchase queue
    Dequeue { id: String },
    /// Enable or disable an availability monitor
    Monitor {
        id: String,
        #[arg(long)]
        disable: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, settings={:?}, log_level={:?}",
        args.config,
        args.settings,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    if let Some(settings) = args.settings {
        config.settings_path = settings;
    }

    let store = FileSettingsStore::new(config.settings_path.clone());
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let settings: Arc<dyn ConfigProvider> = Arc::new(store.clone());

    match args.command.unwrap_or(Command::Watch) {
        Command::Watch => {
            tracing::info!("Starting panel sync");
            panel_sync::run(config).await?;
        }
        Command::Configure {
            address,
            secret,
            clear_secret,
        } => {
            if let Some(address) = address {
                store.set(BACKEND_ADDRESS_KEY, &address)?;
            }
            if let Some(secret) = secret {
                store.set(SECRET_KEY_KEY, &secret)?;
            }
            if clear_secret {
                store.remove(SECRET_KEY_KEY)?;
            }
            let backend = store.backend();
            tracing::info!(
                "Backend {} ({})",
                backend.base_address,
                if backend.has_secret() {
                    "secret set"
                } else {
                    "no secret"
                }
            );
        }
        Command::Check => {
            let client = build_client(&config, http, settings);
            let monitor = ConnectionHealthMonitor::new(client, config.health.endpoint.clone());
            if !monitor.check_now().await {
                return Err("backend is not reachable".into());
            }
            tracing::info!("Backend reachable");
        }
        Command::Quote {
            product,
            location,
            addons,
        } => {
            let backend = Backend::new(build_client(&config, http, settings));
            let flow = OrderFlow::new(backend, Arc::new(TracingSink));
            select(&flow, product, location, &addons);

            let mut rx = flow.price_pipeline().subscribe();
            let state = tokio::time::timeout(
                Duration::from_millis(config.timeouts.data_timeout_ms),
                rx.wait_for(|s| !s.is_fetching),
            )
            .await
            .map_err(|_| "price lookup timed out")??
            .clone();

            match (state.value, state.last_error) {
                (Some(quote), _) => tracing::info!("Price: {:.2} {}", quote.amount, quote.currency),
                (None, Some(e)) => return Err(format!("price unavailable: {}", e).into()),
                (None, None) => return Err("price unavailable".into()),
            }
        }
        Command::Order {
            product,
            location,
            addons,
        } => {
            let backend = Backend::new(build_client(&config, http, settings));
            let flow = OrderFlow::new(backend, Arc::new(TracingSink));
            select(&flow, product, location, &addons);
            let receipt = flow.submit().await?;
            tracing::info!("Order queued as '{}'", receipt.id);
        }
        Command::Dequeue { id } => {
            let backend = Backend::new(build_client(&config, http, settings));
            run_mutation(
                &format!("Remove queue item '{}'", id),
                backend.delete_queue_item(&id),
                &TracingSink,
                &[],
            )
            .await?;
        }
        Command::Monitor { id, disable } => {
            let backend = Backend::new(build_client(&config, http, settings));
            let verb = if disable { "Disable" } else { "Enable" };
            run_mutation(
                &format!("{} monitor '{}'", verb, id),
                backend.set_monitor_enabled(&id, !disable),
                &TracingSink,
                &[],
            )
            .await?;
        }
    }

    Ok(())
}

fn select(flow: &OrderFlow, product: String, location: String, addons: &[String]) {
    flow.select_product(product);
    flow.select_location(location);
    for addon in addons {
        flow.toggle_addon(addon);
    }
}
