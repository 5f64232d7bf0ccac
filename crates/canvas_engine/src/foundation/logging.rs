//! Logging utilities and structured logging support

use std::sync::Once;

use serde::{Deserialize, Serialize};

pub use log::{debug, error, info, trace, warn};

/// Logger configuration.
///
/// `filter` follows the `env_logger` filter syntax (e.g. "info",
/// "canvas_engine::ui=debug,canvas_engine::render=warn").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Explicit filter; falls back to `RUST_LOG`, then to `info`
    pub filter: Option<String>,
}

static INIT: Once = Once::new();

/// Initialize the logging system.
///
/// Only the first call installs the logger; later calls are ignored.
pub fn init(config: &LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = &config.filter {
            builder.parse_filters(filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Info);
        }

        // Tests may already have installed a logger
        if builder.try_init().is_ok() {
            log::debug!("logging initialized");
        }
    });
}
