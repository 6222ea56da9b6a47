use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

use crate::Error;

/// Default filter used until the configuration is loaded.
const BOOT_LEVEL: &str = "info";

/// Adjusts the installed filter once the configured level is known.
pub struct LogHandle {
    reload: reload::Handle<EnvFilter, Registry>,
}

impl LogHandle {
    /// Applies `level` unless `RUST_LOG` is set.
    pub fn apply_level(&self, level: &str) -> Result<(), Error> {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return Ok(());
        }

        let filter = EnvFilter::try_new(level).map_err(|e| Error::LogLevel(e.to_string()))?;

        self.reload
            .modify(|current| *current = filter)
            .map_err(|e| Error::LogLevel(e.to_string()))
    }
}

/// Installs the global fmt subscriber.
pub fn init() -> LogHandle {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(BOOT_LEVEL));
    let (filter, reload) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    LogHandle { reload }
}
