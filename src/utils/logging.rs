use tracing_subscriber::EnvFilter;

/// Map a level name to a `tracing::Level`. Unknown names fall back to INFO.
pub fn parse_level(name: &str) -> tracing::Level {
    match name.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" | "warning" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    }
}

/// Initialize tracing/logging for the process.
///
/// `RUST_LOG` takes precedence when set; otherwise everything at
/// `default_level` and above is emitted.
pub fn init(default_level: &str) {
    let lvl = parse_level(default_level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(lvl.as_str().to_lowercase()));

    // try_init so tests and embedding applications can call this repeatedly
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
