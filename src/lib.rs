pub mod analyzer;
pub mod api;
pub mod core;

use once_cell::sync::OnceCell;

static LOGGER: OnceCell<()> = OnceCell::new();

/// Installs `env_logger` once; the filter defaults to `info` and follows
/// `RUST_LOG` when set. Later calls do nothing.
pub fn init_logging() {
    LOGGER.get_or_init(|| {
        let env = env_logger::Env::default().default_filter_or("info");
        // a host application may already own the global logger
        let _ = env_logger::Builder::from_env(env)
            .format_timestamp_millis()
            .try_init();
    });
}
