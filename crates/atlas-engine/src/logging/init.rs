use std::sync::Once;

/// Logger setup for binaries built on the engine.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `env_logger` filter, e.g. `"atlas_engine=debug,wgpu=warn"`. Falls back
    /// to `RUST_LOG`, then to [`default_level`](Self::default_level).
    pub env_filter: Option<String>,
    pub default_level: log::LevelFilter,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            default_level: log::LevelFilter::Info,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    /// Filter string that will be applied, if any.
    fn resolved_filter(&self) -> Option<String> {
        self.env_filter
            .clone()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .filter(|f| !f.trim().is_empty())
    }
}

static INIT: Once = Once::new();

/// Installs the global `env_logger` backend. Calls after the first are no-ops.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        match config.resolved_filter() {
            Some(filter) => {
                builder.parse_filters(&filter);
            }
            None => {
                // wgpu is chatty at info.
                builder.filter_level(config.default_level);
                builder.filter_module("wgpu_core", log::LevelFilter::Warn);
                builder.filter_module("wgpu_hal", log::LevelFilter::Warn);
            }
        }

        builder.write_style(config.write_style);

        if builder.try_init().is_err() {
            log::warn!("a global logger was already installed");
            return;
        }
        log::debug!("logging initialized");
    });
}
