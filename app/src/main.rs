use std::sync::Arc;

use settings::Settings;

use crate::core::AppContext;
use crate::history::{HistoryBackend, InMemoryStore, PgHistoryStore};

mod core;
mod device;
mod history;
mod relay;
mod settings;
mod telemetry;

struct Infrastructure {
    store: Arc<HistoryBackend>,
}

#[tokio::main(flavor = "multi_thread")]
pub async fn main() {
    let settings = Settings::new().expect("Error reading configuration");

    let infrastructure = Infrastructure::init(&settings)
        .await
        .expect("Error initializing infrastructure");

    let context = AppContext::init(&settings, infrastructure.store)
        .await
        .expect("Error initializing monitor");

    tracing::info!("Starting main loop");
    context.start();
    tracing::info!(health = ?context.health().await, "Monitor running");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Error waiting for shutdown signal: {}", e);
    }

    tracing::info!("Shutdown requested");
    context.shutdown().await;
}

impl Infrastructure {
    pub async fn init(settings: &Settings) -> anyhow::Result<Self> {
        settings.monitoring.init().expect("Error initializing monitoring");

        let store = match &settings.database {
            Some(database) => {
                let store = PgHistoryStore::new(database.new_pool().await?);
                store.ensure_schema().await?;
                HistoryBackend::Postgres(store)
            }
            None => {
                tracing::warn!("No database configured, history is kept in memory only");
                HistoryBackend::Memory(InMemoryStore::new())
            }
        };

        Ok(Self { store: Arc::new(store) })
    }
}
