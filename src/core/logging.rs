//! Logger setup

use std::sync::Once;

static INIT: Once = Once::new();

/// Install the `env_logger` backend once.
///
/// `RUST_LOG` wins over `filter`; with neither set the level is `info`.
/// Later calls are ignored, so tests and the engine can both call this.
pub fn init_logging(filter: Option<&str>) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Ok(env_filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&env_filter);
        } else if let Some(filter) = filter {
            builder.parse_filters(filter);
        } else {
            builder.filter_level(log::LevelFilter::Info);
        }

        // Another logger may already be installed (e.g. by a test harness)
        if builder.try_init().is_err() {
            return;
        }

        log::debug!("logging initialized");
    });
}
