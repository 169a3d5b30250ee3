//! Scenario definitions for the rampload load generator.
//!
//! A [`Scenario`] combines a [`LoadProfile`], which prescribes how many virtual users run at any
//! point in time, with an [`IterationAction`], the steps each of those users repeats in a loop.
//!
//! Scenarios are usually written as [`ScenarioDef`] in YAML and validated with
//! [`ScenarioDef::build`]. Validation fails fast on empty profiles, zero-length stages and URLs
//! that cannot be requested, so that no traffic is sent for a broken definition.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod action;
mod error;
mod profile;
mod scenario;

pub use action::{HttpMethod, IterationAction, RequestStep, Step};
pub use error::{Result, ScenarioError};
pub use profile::{LoadProfile, Segment, Stage};
pub use scenario::{HEALTH_CHECK_NAME, Scenario, ScenarioDef, StageDef, StepDef};
