#![allow(dead_code)]

use std::sync::Once;

use tessera::{GraphStore, StoreOptions, WalSyncMode};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a test subscriber once per process; `RUST_LOG` picks the level.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// In-memory store without fsync.
pub fn memory_store() -> GraphStore {
    init_tracing();
    GraphStore::open(StoreOptions::in_memory().wal_sync(WalSyncMode::Off)).expect("open store")
}
