//! A staged HTTP load generator.
//!
//! rampload runs a [`Scenario`](rampload_scenario::Scenario) against a remote service: the
//! number of concurrent virtual users follows the scenario's load profile, and every virtual user
//! repeats the scenario's iteration, such as one `GET` against a health check followed by a
//! one-second pause, until the profile removes it again.
//!
//! The [`scheduler`] owns the virtual users, [`http`] sends their requests and [`metrics`]
//! records the outcome, which [`report`] prints once the run has finished. Requests that fail or
//! receive an unexpected status are recorded and never retried.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod cli;
pub mod config;
pub mod http;
pub mod metrics;
pub mod observability;
pub mod report;
pub mod scheduler;
mod vu;

pub use crate::scheduler::{RunOptions, RunSummary, run};
