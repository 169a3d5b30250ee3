//! The load profile: how many virtual users should be running at any point of a run.

use std::time::Duration;

use crate::error::{Result, ScenarioError};

/// A segment of the load profile.
///
/// Over its duration, the number of concurrent virtual users moves linearly from the previous
/// stage's target (or zero for the first stage) to this stage's target.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Stage {
    /// How long the stage lasts. Always greater than zero in a built profile.
    pub duration: Duration,
    /// The number of virtual users reached at the end of the stage.
    pub target: u32,
}

impl Stage {
    /// Creates a new stage.
    pub fn new(duration: Duration, target: u32) -> Self {
        Self { duration, target }
    }
}

/// An ordered, validated sequence of [`Stage`]s.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LoadProfile {
    stages: Vec<Stage>,
    total: Duration,
}

impl LoadProfile {
    /// Validates the stages and creates a profile from them.
    ///
    /// Fails if there are no stages, if any stage has a zero duration, or if the stages add up
    /// to more than [`Duration::MAX`].
    pub fn new(stages: Vec<Stage>) -> Result<Self> {
        if stages.is_empty() {
            return Err(ScenarioError::NoStages);
        }
        if let Some(index) = stages.iter().position(|s| s.duration.is_zero()) {
            return Err(ScenarioError::ZeroDuration { index });
        }

        let mut total = Duration::ZERO;
        for (index, stage) in stages.iter().enumerate() {
            total = total
                .checked_add(stage.duration)
                .ok_or(ScenarioError::DurationOverflow { index })?;
        }

        Ok(Self { stages, total })
    }

    /// The stages of this profile, in execution order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// The length of the whole run, which is the sum of all stage durations.
    pub fn total_duration(&self) -> Duration {
        self.total
    }

    /// The highest number of virtual users this profile ever asks for.
    pub fn max_target(&self) -> u32 {
        self.stages.iter().map(|s| s.target).max().unwrap_or(0)
    }

    /// Returns the number of virtual users that should be running `elapsed` into the run.
    ///
    /// Values between two targets are rounded towards the previous target, so a ramp never
    /// overshoots the stage it is heading to. Past the end of the run, this is the final target.
    pub fn target_at(&self, elapsed: Duration) -> u32 {
        let mut start = Duration::ZERO;
        let mut previous = 0;

        for stage in &self.stages {
            // Bounded by `total`, which was checked in `new`.
            let end = start + stage.duration;
            if elapsed < end {
                let progress = (elapsed - start).as_nanos();
                return interpolate(previous, stage.target, progress, stage.duration.as_nanos());
            }
            start = end;
            previous = stage.target;
        }

        previous
    }

    /// Iterates over the stages with their absolute position in the run.
    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.stages
            .iter()
            .enumerate()
            .scan((Duration::ZERO, 0), |(start, from), (index, stage)| {
                let segment = Segment {
                    index,
                    start: *start,
                    end: *start + stage.duration,
                    from: *from,
                    to: stage.target,
                };
                *start = segment.end;
                *from = segment.to;
                Some(segment)
            })
    }
}

/// A [`Stage`] placed on the run's timeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Segment {
    /// Zero-based position of the stage.
    pub index: usize,
    /// Offset into the run at which the stage begins.
    pub start: Duration,
    /// Offset into the run at which the stage ends.
    pub end: Duration,
    /// Virtual users at the start of the stage.
    pub from: u32,
    /// Virtual users at the end of the stage.
    pub to: u32,
}

fn interpolate(from: u32, to: u32, progress: u128, total: u128) -> u32 {
    // `progress < total` holds, so the delta always fits into the distance between the targets.
    if to >= from {
        let delta = u128::from(to - from) * progress / total;
        from + delta as u32
    } else {
        let delta = u128::from(from - to) * progress / total;
        from - delta as u32
    }
}
