use tracing_subscriber::EnvFilter;

use crate::config::LogSettings;

/// `-v` forces `debug`; otherwise the configured level applies.
pub fn filter_directive(verbose: bool, settings: &LogSettings) -> String {
    if verbose {
        "debug".to_string()
    } else {
        settings.level.clone()
    }
}

/// Installs the fmt subscriber on stderr. `RUST_LOG` wins over both the flag
/// and the config file. Calling it twice is a no-op.
pub fn init(verbose: bool, settings: &LogSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbose, settings)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
