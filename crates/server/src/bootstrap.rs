use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use pozinox_core::config::{AppConfig, ConfigError, LoadOptions, StorageBackend};
use pozinox_db::{connect_with, migrations, DbPool};
use pozinox_storage::{LocalStorage, ObjectStorage, StorageError, SupabaseStorage};

use crate::payments::MercadoPagoClient;

/// Shared request state: one pool, one storage backend, one optional
/// payment client behind `Arc`s so every router clones cheaply.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub storage: Arc<dyn ObjectStorage>,
    pub payments: Option<Arc<MercadoPagoClient>>,
    pub public_base_url: String,
}

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("storage backend initialization failed: {0}")]
    Storage(#[source] StorageError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool =
        connect_with(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let storage = build_storage(&config)?;
    info!(
        event_name = "system.bootstrap.storage_ready",
        backend = match config.storage.backend {
            StorageBackend::Local => "local",
            StorageBackend::Supabase => "supabase",
        },
    );

    let payments = config.mercadopago.access_token.clone().map(|token| {
        Arc::new(MercadoPagoClient::new(token, config.mercadopago.currency.clone()))
    });
    if payments.is_none() {
        info!(
            event_name = "system.bootstrap.payments_disabled",
            "no access token configured, checkout endpoints will reject requests"
        );
    }

    let state = AppState {
        db_pool,
        storage,
        payments,
        public_base_url: config.server.public_base_url.clone(),
    };

    Ok(Application { config, state })
}

fn build_storage(config: &AppConfig) -> Result<Arc<dyn ObjectStorage>, BootstrapError> {
    match config.storage.backend {
        StorageBackend::Local => {
            Ok(Arc::new(LocalStorage::new(config.storage.local_root.clone())))
        }
        StorageBackend::Supabase => {
            let url = config.storage.supabase_url.clone().ok_or_else(|| {
                BootstrapError::Config(ConfigError::Validation(
                    "storage.supabase_url is required for the supabase backend".to_string(),
                ))
            })?;
            let key = config.storage.supabase_key.clone().ok_or_else(|| {
                BootstrapError::Config(ConfigError::Validation(
                    "storage.supabase_key is required for the supabase backend".to_string(),
                ))
            })?;
            let storage = SupabaseStorage::new(
                url,
                config.storage.bucket.clone(),
                key,
                Duration::from_secs(config.storage.request_timeout_secs),
            )
            .map_err(BootstrapError::Storage)?;
            Ok(Arc::new(storage))
        }
    }
}
