use anyhow::Result;
use clap::Parser;
use roi_gallery::app::App;
use roi_gallery::models::Config;
use roi_gallery::reconcile::{ReconcileSettings, Reconciler};
use roi_gallery::server;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "roi-gallery")]
#[command(about = "Upload images, crop their region of interest and browse the results")]
struct CliArgs {
    /// Listen address, overrides BIND_ADDR.
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// SQLite database file, overrides DATABASE_PATH.
    #[arg(long, value_name = "PATH")]
    database: Option<String>,
}

impl CliArgs {
    fn apply(self, mut config: Config) -> Config {
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(database) = self.database {
            config.database_path = database;
        }
        config
    }
}

fn reconcile_settings(config: &Config) -> ReconcileSettings {
    ReconcileSettings {
        interval: Duration::from_secs(config.reconcile_interval_secs.max(1)),
        max_attempts: config.reconcile_max_attempts,
        ..ReconcileSettings::default()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roi_gallery=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting roi-gallery");

    let args = CliArgs::parse();

    let config = match Config::from_env() {
        Ok(config) => args.apply(config),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let app = match App::new(&config).await {
        Ok(app) => Arc::new(app),
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    let reconciler = Reconciler::new(
        app.blob_service(),
        app.metadata_service(),
        reconcile_settings(&config),
    )
    .spawn();

    let result = server::start_server(&config.bind_addr, app, config.max_upload_bytes).await;
    reconciler.abort();

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Server failed: {}", e);
            std::process::exit(1);
        }
    }
}
