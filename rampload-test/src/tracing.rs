//! Log capture for tests.

use tracing_subscriber::EnvFilter;

/// Crates whose logs are captured at full verbosity.
const CAPTURED_TARGETS: &[&str] = &["rampload", "rampload_scenario"];

/// Initialize the logger for testing.
///
/// Logs go to the output captured by the Rust test runner. Unless `RUST_LOG` says otherwise,
/// rampload's own crates log at `TRACE` and everything else, including `reqwest` and `hyper`,
/// only at `ERROR`. Calling this more than once is harmless.
///
/// # Example
///
/// ```
/// rampload_test::tracing::init();
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        CAPTURED_TARGETS
            .iter()
            .filter_map(|target| format!("{target}=TRACE").parse().ok())
            .fold(EnvFilter::new("ERROR"), EnvFilter::add_directive)
    });

    tracing_subscriber::fmt::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .compact()
        .try_init()
        .ok();
}
