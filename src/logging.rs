use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "conduitd=info";

/// Installs the stderr subscriber. Stdout is reserved for IPC responses.
///
/// `RUST_LOG` is honored unless `level` is given.
pub fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(l) => EnvFilter::try_new(l).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
    };

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
