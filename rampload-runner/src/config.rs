//! Configuration for the rampload runner.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `RAMPLOAD__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! See [`Config`] for a description of all configuration fields and their defaults.
//!
//! # Environment Variables
//!
//! Environment variables use `RAMPLOAD__` as a prefix and double underscores (`__`) to denote
//! nested configuration structures. For example:
//!
//! - `RAMPLOAD__HTTP__TIMEOUT=5s` sets the request timeout
//! - `RAMPLOAD__GRACEFUL_STOP=10s` sets how long VUs may finish their iteration at the end
//! - `RAMPLOAD__LOGGING__LEVEL=debug` sets the log level
//!
//! # YAML Configuration File
//!
//! ```yaml
//! scenario:
//!   name: notifications-health
//!   stages:
//!     - { duration: 1m, target: 50 }
//!     - { duration: 3m, target: 50 }
//!     - { duration: 2m, target: 0 }
//!   iteration:
//!     - { type: request, method: GET, url: http://localhost:8080/api/v1/notifications/health }
//!     - { type: pause, duration: 1s }
//!
//! http:
//!   timeout: 60s
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::{Result, ensure};
use figment::providers::{Env, Format, Serialized, Yaml};
use rampload_scenario::{Scenario, ScenarioDef, ScenarioError};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "RAMPLOAD__";

/// Target of the built-in scenario when no other URL is configured.
pub const DEFAULT_URL: &str = "http://localhost:8080/api/v1/notifications/health";

/// The range of HTTP status codes that count as a successful request.
///
/// Both bounds are inclusive.
///
/// Used in: [`Http::expected_statuses`]
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct StatusRange {
    /// Lowest successful status code.
    pub min: u16,
    /// Highest successful status code.
    pub max: u16,
}

impl StatusRange {
    /// Returns `true` if `status` lies within the range.
    pub fn contains(&self, status: u16) -> bool {
        (self.min..=self.max).contains(&status)
    }
}

impl Default for StatusRange {
    fn default() -> Self {
        Self { min: 200, max: 399 }
    }
}

impl fmt::Display for StatusRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// HTTP client configuration.
///
/// Used in: [`Config::http`]
#[derive(Debug, Deserialize, Serialize)]
pub struct Http {
    /// Total time a single request may take, including reading the response body.
    ///
    /// Requests exceeding it are recorded as failed with error kind `timeout`.
    ///
    /// # Default
    ///
    /// `60s`
    ///
    /// # Environment Variable
    ///
    /// `RAMPLOAD__HTTP__TIMEOUT`
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Time allowed for establishing a connection.
    ///
    /// # Default
    ///
    /// `10s`
    ///
    /// # Environment Variable
    ///
    /// `RAMPLOAD__HTTP__CONNECT_TIMEOUT`
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Value of the `User-Agent` header.
    ///
    /// # Default
    ///
    /// `rampload/<version>`
    ///
    /// # Environment Variable
    ///
    /// `RAMPLOAD__HTTP__USER_AGENT`
    pub user_agent: String,

    /// Status codes that count as success. Any other status is recorded as a failed request.
    ///
    /// Responses are not validated beyond their status code.
    ///
    /// # Default
    ///
    /// `200` to `399`
    ///
    /// # Environment Variables
    ///
    /// - `RAMPLOAD__HTTP__EXPECTED_STATUSES__MIN`
    /// - `RAMPLOAD__HTTP__EXPECTED_STATUSES__MAX`
    pub expected_statuses: StatusRange,
}

impl Default for Http {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("rampload/", env!("CARGO_PKG_VERSION")).to_owned(),
            expected_statuses: StatusRange::default(),
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted. The format can be explicitly specified or
/// auto-detected based on whether stderr is a TTY.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Colored, human readable output.
    Pretty,

    /// Plain text output without colors.
    Simplified,

    /// One JSON object per line.
    Json,
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr, so they never interleave with the report on stdout.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable takes precedence and allows per-module overrides.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `RAMPLOAD__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format. See [`LogFormat`] for available options.
    ///
    /// # Default
    ///
    /// `Auto`
    ///
    /// # Environment Variable
    ///
    /// `RAMPLOAD__LOGGING__FORMAT`
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Main configuration struct for the rampload runner.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// The scenario to run.
    ///
    /// Validated when the run starts; see [`Config::scenario`].
    ///
    /// # Default
    ///
    /// The built-in notifications health check against [`DEFAULT_URL`].
    pub scenario: ScenarioDef,

    /// HTTP client settings. See [`Http`].
    pub http: Http,

    /// How often the scheduler compares the running VUs with the load profile.
    ///
    /// # Default
    ///
    /// `100ms`
    ///
    /// # Environment Variable
    ///
    /// `RAMPLOAD__CONTROL_INTERVAL`
    #[serde(with = "humantime_serde")]
    pub control_interval: Duration,

    /// How long a VU removed during a ramp-down may take to finish its current iteration before
    /// it is interrupted.
    ///
    /// # Default
    ///
    /// `30s`
    ///
    /// # Environment Variable
    ///
    /// `RAMPLOAD__GRACEFUL_RAMP_DOWN`
    #[serde(with = "humantime_serde")]
    pub graceful_ramp_down: Duration,

    /// How long VUs may take to finish their current iteration once the last stage has ended.
    ///
    /// # Default
    ///
    /// `30s`
    ///
    /// # Environment Variable
    ///
    /// `RAMPLOAD__GRACEFUL_STOP`
    #[serde(with = "humantime_serde")]
    pub graceful_stop: Duration,

    /// Logging configuration. See [`Logging`].
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scenario: ScenarioDef::health_check(DEFAULT_URL),
            http: Http::default(),
            control_interval: Duration::from_millis(100),
            graceful_ramp_down: Duration::from_secs(30),
            graceful_stop: Duration::from_secs(30),
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the provided arguments.
    ///
    /// Configuration is merged in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if `path` is given)
    /// 3. Environment variables (prefixed with `RAMPLOAD__`)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The YAML configuration file cannot be read or parsed
    /// - Environment variables contain invalid values
    /// - `control_interval` is zero or `expected_statuses` is an empty range
    ///
    /// The scenario itself is validated separately by [`Config::scenario`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file_exact(path));
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        ensure!(
            !config.control_interval.is_zero(),
            "control_interval must be greater than zero"
        );
        ensure!(
            config.http.expected_statuses.min <= config.http.expected_statuses.max,
            "expected_statuses must not be empty, got {}",
            config.http.expected_statuses
        );

        Ok(config)
    }

    /// Validates the configured scenario and builds it.
    pub fn scenario(&self) -> Result<Scenario, ScenarioError> {
        self.scenario.build()
    }
}
