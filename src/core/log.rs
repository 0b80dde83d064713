use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Installs the global subscriber. Crate events are shown at debug level
/// with `verbose` and are silent otherwise. `RUST_LOG` replaces the default
/// directive.
pub fn init_logging(verbose: bool) {
    let (crate_level, default_directive) = if verbose {
        (LevelFilter::DEBUG, "quotewise=debug,warn")
    } else {
        (LevelFilter::OFF, "off")
    };
    let app_filter = Targets::new()
        .with_target(env!("CARGO_CRATE_NAME"), crate_level)
        .with_default(LevelFilter::WARN);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // A second call (integration tests) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time().with_target(true))
        .with(app_filter)
        .with(env_filter)
        .try_init();
}
