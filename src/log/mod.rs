//! Opt-in structured logging. Installing a subscriber is never required for
//! correctness — a consumer embedding this crate in a game process installs
//! its own `tracing_subscriber`, or none. This mirrors the teacher's
//! reload-handle `Logger`, letting a test harness or host application raise
//! or lower the filter at runtime without reinstalling the subscriber.

use tracing_subscriber::{fmt, reload, EnvFilter, Registry};
use tracing_subscriber::prelude::*;

pub struct Logger {
    reload_handle: reload::Handle<EnvFilter, Registry>,
}

impl Logger {
    pub fn new(initial_level: &str) -> Self {
        let filter = EnvFilter::new(initial_level);
        let (filter_layer, reload_handle) = reload::Layer::new(filter);

        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer())
            .init();

        Self { reload_handle }
    }

    pub fn set_log_level(&self, level: &str) {
        let _ = self.reload_handle.modify(|f| *f = EnvFilter::new(level));
    }
}

pub fn init_logging() {
    let _ = Logger::new("info");
}
