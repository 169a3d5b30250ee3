//! The iteration body that every virtual user repeats.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, ScenarioError};

/// HTTP methods a request step may use.
///
/// Request steps never carry a body, so only methods without request payloads are offered.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// `GET`
    #[default]
    Get,
    /// `HEAD`
    Head,
    /// `DELETE`
    Delete,
    /// `OPTIONS`
    Options,
}

impl HttpMethod {
    /// The method name as it goes on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single HTTP request without a body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestStep {
    method: HttpMethod,
    url: Url,
}

impl RequestStep {
    /// Parses `url` and creates a request step from it.
    ///
    /// Only absolute `http` and `https` URLs with a host are accepted. The returned error carries
    /// index `0`; [`IterationAction`] definitions rewrite it to the step's actual position.
    pub fn new(method: HttpMethod, url: &str) -> Result<Self> {
        let invalid = |reason: String| ScenarioError::InvalidUrl {
            index: 0,
            url: url.to_owned(),
            reason,
        };

        let parsed = Url::parse(url).map_err(|err| invalid(err.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme `{}`", parsed.scheme())));
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(invalid("missing host".to_owned()));
        }

        Ok(Self {
            method,
            url: parsed,
        })
    }

    /// Shorthand for a `GET` request step.
    pub fn get(url: &str) -> Result<Self> {
        Self::new(HttpMethod::Get, url)
    }

    /// The request method.
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// The request target.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns a copy of this step that targets `url` instead, keeping the method.
    pub fn with_url(&self, url: &str) -> Result<Self> {
        Self::new(self.method, url)
    }
}

impl fmt::Display for RequestStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// One step of an iteration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Step {
    /// Send a request and wait for its response.
    Request(RequestStep),
    /// Sleep for the given duration.
    Pause(Duration),
}

/// The ordered steps a virtual user executes once per loop iteration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IterationAction {
    steps: Vec<Step>,
}

impl IterationAction {
    /// Validates the steps and creates an iteration from them.
    ///
    /// An iteration needs at least one step, and at least one of them must be a request.
    pub fn new(steps: Vec<Step>) -> Result<Self> {
        if steps.is_empty() {
            return Err(ScenarioError::NoSteps);
        }
        if !steps.iter().any(|step| matches!(step, Step::Request(_))) {
            return Err(ScenarioError::NoRequests);
        }

        Ok(Self { steps })
    }

    /// All steps in execution order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The request steps of this iteration, in execution order.
    pub fn requests(&self) -> impl Iterator<Item = &RequestStep> {
        self.steps.iter().filter_map(|step| match step {
            Step::Request(request) => Some(request),
            Step::Pause(_) => None,
        })
    }

    /// Total time spent pausing in one iteration, saturating at [`Duration::MAX`].
    pub fn pause_duration(&self) -> Duration {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::Pause(duration) => Some(*duration),
                Step::Request(_) => None,
            })
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    /// Returns a copy of this iteration with every request pointed at `url`.
    pub fn retarget(&self, url: &str) -> Result<Self> {
        let steps = self
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| match step {
                Step::Request(request) => request
                    .with_url(url)
                    .map(Step::Request)
                    .map_err(|err| err.at_step(index)),
                Step::Pause(duration) => Ok(Step::Pause(*duration)),
            })
            .collect::<Result<_>>()?;

        Ok(Self { steps })
    }
}

impl ScenarioError {
    /// Attributes a step error to the step at `index`.
    pub(crate) fn at_step(self, index: usize) -> Self {
        match self {
            ScenarioError::InvalidUrl { url, reason, .. } => {
                ScenarioError::InvalidUrl { index, url, reason }
            }
            other => other,
        }
    }
}
