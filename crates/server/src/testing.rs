//! Shared fixtures for handler tests: an isolated in-memory database
//! seeded with the demo catalog, plus a throwaway local media root.

use std::sync::Arc;

use tempfile::TempDir;

use pozinox_db::{connect_with_settings, migrations, seed_demo_catalog};
use pozinox_storage::LocalStorage;

use crate::bootstrap::AppState;

pub async fn test_state() -> (AppState, TempDir) {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("run migrations");
    seed_demo_catalog(&pool).await.expect("seed demo catalog");

    let media = TempDir::new().expect("temp dir");
    let storage = Arc::new(LocalStorage::with_url_prefix(
        media.path().to_path_buf(),
        "http://localhost:8080/media",
    ));

    let state = AppState {
        db_pool: pool,
        storage,
        payments: None,
        public_base_url: "http://localhost:8080".to_string(),
    };
    (state, media)
}
