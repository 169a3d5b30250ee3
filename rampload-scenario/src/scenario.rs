//! Scenarios and their serializable definitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::action::{HttpMethod, IterationAction, RequestStep, Step};
use crate::error::Result;
use crate::profile::{LoadProfile, Stage};

/// Name of the built-in health check scenario.
pub const HEALTH_CHECK_NAME: &str = "notifications-health";

/// A validated scenario: a load profile plus the iteration each virtual user repeats.
///
/// Scenarios are built once before a run and never change afterwards.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Scenario {
    name: String,
    profile: LoadProfile,
    action: IterationAction,
}

impl Scenario {
    /// Creates a scenario from already validated parts.
    pub fn new(name: impl Into<String>, profile: LoadProfile, action: IterationAction) -> Self {
        Self {
            name: name.into(),
            profile,
            action,
        }
    }

    /// The built-in health check scenario against `url`.
    ///
    /// Ramps up to 50 users over one minute, holds for three minutes and ramps down to zero
    /// over two minutes. Every iteration sends one `GET` to `url` and then pauses for a second.
    pub fn health_check(url: &str) -> Result<Self> {
        ScenarioDef::health_check(url).build()
    }

    /// Name for identification in logs and reports.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The load profile driving concurrency over time.
    pub fn profile(&self) -> &LoadProfile {
        &self.profile
    }

    /// The per-iteration steps.
    pub fn action(&self) -> &IterationAction {
        &self.action
    }

    /// Returns a copy of this scenario with all requests pointed at `url`.
    pub fn retarget(&self, url: &str) -> Result<Self> {
        Ok(Self {
            name: self.name.clone(),
            profile: self.profile.clone(),
            action: self.action.retarget(url)?,
        })
    }
}

/// The serializable form of a [`Scenario`].
///
/// ```yaml
/// name: notifications-health
/// stages:
///   - duration: 1m
///     target: 50
/// iteration:
///   - type: request
///     url: http://localhost:8080/api/v1/notifications/health
///   - type: pause
///     duration: 1s
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ScenarioDef {
    /// Name of the scenario.
    pub name: String,
    /// Stages of the load profile, in order.
    pub stages: Vec<StageDef>,
    /// Steps of one iteration, in order.
    pub iteration: Vec<StepDef>,
}

/// The serializable form of a [`Stage`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct StageDef {
    /// How long the stage lasts, for example `30s` or `2m`.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Virtual users at the end of the stage.
    pub target: u32,
}

/// The serializable form of a [`Step`].
///
/// The `type` field determines the variant.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StepDef {
    /// A request step (type `"request"`).
    Request {
        /// Request method, defaults to `GET`.
        #[serde(default)]
        method: HttpMethod,
        /// Absolute `http` or `https` URL.
        url: String,
    },
    /// A pause step (type `"pause"`).
    Pause {
        /// How long to sleep, for example `1s` or `500ms`.
        #[serde(with = "humantime_serde")]
        duration: Duration,
    },
}

impl ScenarioDef {
    /// The definition of the built-in health check scenario against `url`.
    pub fn health_check(url: &str) -> Self {
        Self {
            name: HEALTH_CHECK_NAME.to_owned(),
            stages: vec![
                StageDef {
                    duration: Duration::from_secs(60),
                    target: 50,
                },
                StageDef {
                    duration: Duration::from_secs(180),
                    target: 50,
                },
                StageDef {
                    duration: Duration::from_secs(120),
                    target: 0,
                },
            ],
            iteration: vec![
                StepDef::Request {
                    method: HttpMethod::Get,
                    url: url.to_owned(),
                },
                StepDef::Pause {
                    duration: Duration::from_secs(1),
                },
            ],
        }
    }

    /// Validates the definition and builds a [`Scenario`] from it.
    pub fn build(&self) -> Result<Scenario> {
        let stages = self
            .stages
            .iter()
            .map(|s| Stage::new(s.duration, s.target))
            .collect();
        let profile = LoadProfile::new(stages)?;

        let steps = self
            .iteration
            .iter()
            .enumerate()
            .map(|(index, step)| match step {
                StepDef::Request { method, url } => RequestStep::new(*method, url)
                    .map(Step::Request)
                    .map_err(|err| err.at_step(index)),
                StepDef::Pause { duration } => Ok(Step::Pause(*duration)),
            })
            .collect::<Result<_>>()?;
        let action = IterationAction::new(steps)?;

        Ok(Scenario::new(self.name.clone(), profile, action))
    }
}

#[cfg(test)]
mod tests {
    use crate::ScenarioError;

    use super::*;

    const HEALTH_URL: &str = "http://host/api/v1/notifications/health";

    #[test]
    fn health_check_matches_expected_shape() {
        let scenario = Scenario::health_check(HEALTH_URL).unwrap();

        assert_eq!(scenario.name(), HEALTH_CHECK_NAME);
        assert_eq!(
            scenario.profile().total_duration(),
            Duration::from_secs(360)
        );
        assert_eq!(scenario.profile().max_target(), 50);
        assert_eq!(
            scenario
                .profile()
                .target_at(scenario.profile().total_duration()),
            0
        );

        // exactly one GET, followed by exactly one one-second pause
        let steps = scenario.action().steps();
        assert_eq!(steps.len(), 2);
        let Step::Request(request) = &steps[0] else {
            panic!("expected the request first");
        };
        assert_eq!(request.method(), HttpMethod::Get);
        assert_eq!(request.url().as_str(), HEALTH_URL);
        assert_eq!(steps[1], Step::Pause(Duration::from_secs(1)));
    }

    #[test]
    fn parses_yaml_definition() {
        let yaml = r#"
            name: smoke
            stages:
              - duration: 1m
                target: 50
              - duration: 3m
                target: 50
              - duration: 2m
                target: 0
            iteration:
              - type: request
                url: http://host/api/v1/notifications/health
              - type: pause
                duration: 1s
        "#;

        let def: ScenarioDef = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            def,
            ScenarioDef {
                name: "smoke".to_owned(),
                ..ScenarioDef::health_check(HEALTH_URL)
            }
        );
        def.build().unwrap();
    }

    #[test]
    fn parses_explicit_method() {
        let yaml = r#"
            type: request
            method: HEAD
            url: http://host/
        "#;
        let step: StepDef = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            step,
            StepDef::Request {
                method: HttpMethod::Head,
                url: "http://host/".to_owned()
            }
        );
    }

    #[test]
    fn rejects_negative_pause() {
        let yaml = r#"
            type: pause
            duration: -1s
        "#;
        assert!(serde_yaml::from_str::<StepDef>(yaml).is_err());
    }

    #[test]
    fn rejects_negative_target() {
        let yaml = r#"
            duration: 1m
            target: -5
        "#;
        assert!(serde_yaml::from_str::<StageDef>(yaml).is_err());
    }

    #[test]
    fn build_reports_failing_step() {
        let mut def = ScenarioDef::health_check(HEALTH_URL);
        def.iteration.insert(
            1,
            StepDef::Request {
                method: HttpMethod::Get,
                url: "http//missing-colon".to_owned(),
            },
        );

        let err = def.build().unwrap_err();
        assert!(matches!(err, ScenarioError::InvalidUrl { index: 1, .. }));
    }

    #[test]
    fn build_reports_failing_stage() {
        let mut def = ScenarioDef::health_check(HEALTH_URL);
        def.stages[2].duration = Duration::ZERO;

        assert_eq!(
            def.build().unwrap_err(),
            ScenarioError::ZeroDuration { index: 2 }
        );
    }

    #[test]
    fn build_rejects_overlong_profile() {
        let yaml = r#"
            name: forever
            stages:
              - duration: 18446744073709551615s
                target: 1
              - duration: 18446744073709551615s
                target: 0
            iteration:
              - type: request
                url: http://host/health
        "#;

        let def: ScenarioDef = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            def.build().unwrap_err(),
            ScenarioError::DurationOverflow { index: 1 }
        );
    }

    #[test]
    fn retarget_replaces_url() {
        let scenario = Scenario::health_check(HEALTH_URL).unwrap();
        let retargeted = scenario.retarget("http://other:9000/health").unwrap();

        let urls: Vec<_> = retargeted
            .action()
            .requests()
            .map(|r| r.url().to_string())
            .collect();
        assert_eq!(urls, ["http://other:9000/health"]);
        assert_eq!(retargeted.profile(), scenario.profile());
    }
}
