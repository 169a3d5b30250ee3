//! Per-run counters and latency distributions.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use sketches_ddsketch::DDSketch;

use crate::http::RequestError;

/// Everything recorded while running a scenario.
///
/// Each virtual user records into its own instance; the scheduler [merges](Self::merge) them
/// when the users exit.
#[derive(Default)]
pub struct RunMetrics {
    /// Latency of every request that received a response, in seconds.
    pub request_timing: DDSketch,
    /// Number of requests sent, including failed ones.
    pub requests: u64,
    /// Requests that errored or received an unexpected status.
    pub failed_requests: u64,
    /// Number of responses per status code.
    pub statuses: BTreeMap<u16, u64>,
    /// Number of transport errors per [`RequestError::kind`].
    pub errors: BTreeMap<&'static str, u64>,
    /// Iterations that ran to completion.
    pub iterations: u64,
    /// Iterations that were cut short because a virtual user was killed.
    pub interrupted_iterations: u64,
    /// The highest number of virtual users that ran at the same time.
    pub peak_vus: u32,
}

impl RunMetrics {
    /// Records a response. `expected` tells whether its status counts as success.
    pub fn record_response(&mut self, latency: Duration, status: u16, expected: bool) {
        self.requests += 1;
        self.request_timing.add(latency.as_secs_f64());
        *self.statuses.entry(status).or_default() += 1;
        if !expected {
            self.failed_requests += 1;
        }
    }

    /// Records a request that did not produce a response.
    pub fn record_error(&mut self, error: &RequestError) {
        self.requests += 1;
        self.failed_requests += 1;
        *self.errors.entry(error.kind()).or_default() += 1;
    }

    /// Tracks the number of concurrently running virtual users.
    pub fn observe_vus(&mut self, vus: u32) {
        self.peak_vus = self.peak_vus.max(vus);
    }

    /// Adds all values of `other` to this instance.
    pub fn merge(&mut self, other: &RunMetrics) {
        if let Err(err) = self.request_timing.merge(&other.request_timing) {
            tracing::warn!(error = ?err, "failed to merge request timings");
        }
        self.requests += other.requests;
        self.failed_requests += other.failed_requests;
        for (status, count) in &other.statuses {
            *self.statuses.entry(*status).or_default() += count;
        }
        for (kind, count) in &other.errors {
            *self.errors.entry(*kind).or_default() += count;
        }
        self.iterations += other.iterations;
        self.interrupted_iterations += other.interrupted_iterations;
        self.peak_vus = self.peak_vus.max(other.peak_vus);
    }
}

impl fmt::Debug for RunMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunMetrics")
            .field("timed_requests", &self.request_timing.count())
            .field("requests", &self.requests)
            .field("failed_requests", &self.failed_requests)
            .field("statuses", &self.statuses)
            .field("errors", &self.errors)
            .field("iterations", &self.iterations)
            .field("interrupted_iterations", &self.interrupted_iterations)
            .field("peak_vus", &self.peak_vus)
            .finish()
    }
}
