//! Log output setup.

use std::env;
use std::io::IsTerminal;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, prelude::*};

use crate::config::{LogFormat, Logging};

/// Installs the global tracing subscriber, writing to stderr.
pub fn init_tracing(config: &Logging) {
    let format = match config.format {
        LogFormat::Auto if std::io::stderr().is_terminal() => LogFormat::Pretty,
        LogFormat::Auto => LogFormat::Simplified,
        format => format,
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);
    let layer = match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Simplified => layer.with_ansi(false).boxed(),
        LogFormat::Pretty | LogFormat::Auto => layer.with_ansi(true).compact().boxed(),
    };

    let (level, env_filter) = parse_rust_log(config.level);
    tracing_subscriber::registry()
        .with(layer.with_filter(level))
        .with(env_filter)
        .init();
}

/// Determines the log level and filter, giving `RUST_LOG` precedence over the configured level.
pub fn parse_rust_log(configured: LevelFilter) -> (LevelFilter, EnvFilter) {
    // Try to parse RUST_LOG as a simple level filter and apply default levels internally.
    // Otherwise, use it literally if the user knows which overrides they want to run.
    let level = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) => match value.parse::<LevelFilter>() {
            Ok(level) => level,
            Err(_) => return (LevelFilter::TRACE, EnvFilter::new(value)),
        },
        Err(_) => configured,
    };

    // This is the maximum verbosity that will be logged, we filter this down to `level`.
    // Dependencies are noisy at debug level, so they stay at INFO unless RUST_LOG asks for more.
    let env_filter = EnvFilter::new(
        "INFO,\
        reqwest=INFO,\
        hyper_util=WARN,\
        rampload=TRACE,\
        rampload_scenario=TRACE,\
        ",
    );

    (level, env_filter)
}
