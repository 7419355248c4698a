//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence over the `[logging]` table:
//! ```bash
//! RUST_LOG=docrag_vector=debug docrag build
//! ```

use std::sync::Once;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingSettings;

static INIT: Once = Once::new();

/// Install the global subscriber. Only the first call takes effect.
pub fn init_with_config(settings: &LoggingSettings) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(settings.directives())
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}
