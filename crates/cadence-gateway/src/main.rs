use std::net::SocketAddr;
use std::sync::Arc;

use cadence_core::config::{CadenceConfig, StorageBackend};
use cadence_scheduler::{ReminderService, Scheduler, SchedulerSettings, SystemClock};
use cadence_store::{DocumentStore, MemoryStore, SqliteStore, StoreUserDirectory};
use clap::Parser;
use tracing::{info, warn};

mod app;
mod auth;
mod http;

#[derive(Parser, Debug)]
#[command(name = "cadence-gateway", version, about = "Habits and tasks API with email reminders")]
struct Cli {
    /// Path to cadence.toml (defaults to $CADENCE_CONFIG, then ~/.cadence/cadence.toml).
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cadence_gateway=info,cadence_scheduler=info,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > CADENCE_CONFIG env > ~/.cadence/cadence.toml
    let config_path = cli.config.or_else(|| std::env::var("CADENCE_CONFIG").ok());
    let config = CadenceConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        CadenceConfig::default()
    });

    if config.gateway.auth_token.is_none() {
        warn!("gateway.auth_token is not set; API requests are not authenticated");
    }

    let store = open_store(&config)?;
    let users = Arc::new(StoreUserDirectory::new(Arc::clone(&store)));
    let mailer = cadence_mail::build_mailer(&config.mail)?;
    info!(backend = mailer.name(), "mail transport ready");

    let settings = SchedulerSettings::from_config(&config.scheduler);
    info!(
        reminder_hour = settings.habit_reminder_hour,
        utc_offset = %settings.utc_offset,
        "scheduler configured"
    );
    let scheduler = Scheduler::new(Arc::new(SystemClock), settings);
    let reminders = ReminderService::new(scheduler.clone(), Arc::clone(&store), users, mailer);

    // rebuild in-memory jobs from persisted tasks and habits
    reminders.initialize_scheduler().await;

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(config, store, reminders));
    let router = app::build_router(state);

    info!("Cadence gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    Ok(())
}

fn open_store(config: &CadenceConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match config.database.backend {
        StorageBackend::Memory => {
            warn!("using the in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Sqlite => {
            let db_path = &config.database.path;
            ensure_parent_dir(db_path);
            info!(path = %db_path, "opening SQLite database");
            Ok(Arc::new(SqliteStore::open(db_path)?))
        }
    }
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
