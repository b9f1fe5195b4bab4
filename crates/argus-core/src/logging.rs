//! tracing subscriber setup.

use std::sync::Once;

use tracing::Level;

static INIT_TEST_LOGGING: Once = Once::new();

/// Parse a level name, falling back to `INFO`.
pub fn parse_level(name: &str) -> Level {
    name.trim().parse().unwrap_or(Level::INFO)
}

/// Install a fmt subscriber at `level`. Returns false if a global
/// subscriber was already set.
pub fn init(level: &str) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(parse_level(level))
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Test logging through the libtest writer. Safe to call from every test.
pub fn init_test_logging() {
    INIT_TEST_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .with_ansi(false)
            .try_init();
    });
}
