use thiserror::Error;

/// Errors raised while building a [`Scenario`](crate::Scenario) from its definition.
///
/// All of these are configuration errors. They are reported before any virtual user starts and
/// are never recovered from.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScenarioError {
    /// The load profile has no stages.
    #[error("load profile must contain at least one stage")]
    NoStages,

    /// A stage has a zero duration.
    #[error("stage {index}: duration must be greater than zero")]
    ZeroDuration {
        /// Zero-based position of the stage in the profile.
        index: usize,
    },

    /// Adding up the stage durations exceeds the longest representable run.
    #[error("stage {index}: total duration of the load profile is too long")]
    DurationOverflow {
        /// Zero-based position of the first stage that no longer fits.
        index: usize,
    },

    /// The iteration has no steps.
    #[error("iteration must contain at least one step")]
    NoSteps,

    /// The iteration only pauses and never sends a request.
    #[error("iteration must contain at least one request step")]
    NoRequests,

    /// A request step carries a URL that cannot be used.
    #[error("step {index}: invalid url `{url}`: {reason}")]
    InvalidUrl {
        /// Zero-based position of the step in the iteration.
        index: usize,
        /// The URL as written in the definition.
        url: String,
        /// Why the URL was rejected.
        reason: String,
    },
}

/// A convenience alias that defaults our [`ScenarioError`] type.
pub type Result<T, E = ScenarioError> = std::result::Result<T, E>;
