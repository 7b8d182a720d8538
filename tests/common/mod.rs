//! Shared helpers for the integration tests.

pub mod fixtures;
pub mod stubs;

use std::path::PathBuf;
use std::sync::Once;
use tracing::Level;

static INIT: Once = Once::new();

/// Route `tracing` output through the test harness.
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .init();
    });
}

/// Repository root, where `deploy.sh` and `locales/` live.
pub fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}
