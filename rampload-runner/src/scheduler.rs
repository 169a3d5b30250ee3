//! Drive virtual users along a scenario's load profile.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rampload_scenario::Scenario;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, StatusRange};
use crate::http::Remote;
use crate::metrics::RunMetrics;
use crate::vu::{VirtualUser, VuSignals};

/// Knobs of the scheduler that are not part of the scenario.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// How often running VUs are compared with the load profile.
    pub control_interval: Duration,
    /// Grace period for VUs removed during a ramp-down.
    pub graceful_ramp_down: Duration,
    /// Grace period for all remaining VUs once the profile has ended.
    pub graceful_stop: Duration,
    /// Status codes that count as successful requests.
    pub expected_statuses: StatusRange,
    /// Cancelling this token ends the run early, as if the last stage had ended.
    pub shutdown: CancellationToken,
    /// Show a progress spinner on the terminal.
    pub progress: bool,
}

impl RunOptions {
    /// Takes all options from the configuration, with a fresh shutdown token.
    pub fn from_config(config: &Config) -> Self {
        Self {
            control_interval: config.control_interval,
            graceful_ramp_down: config.graceful_ramp_down,
            graceful_stop: config.graceful_stop,
            expected_statuses: config.http.expected_statuses,
            shutdown: CancellationToken::new(),
            progress: true,
        }
    }
}

/// Number of running virtual users at one control tick.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VuSample {
    /// Offset into the run.
    pub elapsed: Duration,
    /// Active virtual users after adjusting to the profile.
    pub vus: u32,
}

/// The outcome of a completed run.
#[derive(Debug)]
pub struct RunSummary {
    /// Name of the scenario that ran.
    pub scenario: String,
    /// Wall time from the first tick until the last virtual user exited.
    pub elapsed: Duration,
    /// Whether the run was ended early through [`RunOptions::shutdown`].
    pub aborted: bool,
    /// Everything recorded by all virtual users.
    pub metrics: RunMetrics,
    /// Active virtual users at every control tick, closed by a sample with zero users once all
    /// of them have been told to stop.
    pub timeline: Vec<VuSample>,
}

struct ActiveVu {
    id: u64,
    signals: VuSignals,
    handle: JoinHandle<RunMetrics>,
}

struct RetiringVu {
    vu: ActiveVu,
    deadline: Instant,
}

/// Runs the scenario against the remote and collects metrics.
///
/// The number of virtual users follows [`LoadProfile::target_at`](rampload_scenario::LoadProfile::target_at),
/// re-evaluated every [`RunOptions::control_interval`]. Surplus users are asked to stop after
/// their current iteration, most recently started first, and are killed if they do not finish
/// within [`RunOptions::graceful_ramp_down`]. Once the profile ends, all users get
/// [`RunOptions::graceful_stop`] to finish before they are killed.
pub async fn run(
    scenario: &Scenario,
    remote: Arc<dyn Remote>,
    options: RunOptions,
) -> Result<RunSummary> {
    let profile = scenario.profile();
    let total = profile.total_duration();
    let action = Arc::new(scenario.action().clone());

    tracing::info!(
        scenario = scenario.name(),
        duration = %humantime::format_duration(total),
        max_vus = profile.max_target(),
        "starting run"
    );

    anyhow::ensure!(
        !options.control_interval.is_zero(),
        "control interval must be greater than zero"
    );
    let start = Instant::now();
    let end = start
        .checked_add(total)
        .context("run duration exceeds the supported range")?;
    // VUs are retired no later than one control tick past the end.
    end.checked_add(options.control_interval)
        .and_then(|last_tick| {
            last_tick.checked_add(options.graceful_ramp_down.max(options.graceful_stop))
        })
        .context("grace period exceeds the supported range")?;

    let bar = if options.progress {
        let bar = ProgressBar::new_spinner()
            .with_style(ProgressStyle::with_template("{spinner} {msg} {elapsed}")?)
            .with_message(format!("Running {}:", scenario.name()));
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut interval = tokio::time::interval(options.control_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let deadline = tokio::time::sleep_until(end);
    tokio::pin!(deadline);

    let mut metrics = RunMetrics::default();
    let mut timeline = Vec::new();
    let mut active: Vec<ActiveVu> = Vec::new();
    let mut retiring: Vec<RetiringVu> = Vec::new();
    let mut next_id = 0;
    let mut aborted = false;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut deadline => break,
            _ = options.shutdown.cancelled() => {
                tracing::info!("shutdown requested, stopping virtual users");
                aborted = true;
                break;
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= total {
            break;
        }

        let target = profile.target_at(elapsed) as usize;
        while active.len() < target {
            let signals = VuSignals::default();
            let user = VirtualUser {
                id: next_id,
                action: Arc::clone(&action),
                remote: Arc::clone(&remote),
                expected_statuses: options.expected_statuses,
            };
            let handle = tokio::spawn(user.run(signals.clone()));
            active.push(ActiveVu {
                id: next_id,
                signals,
                handle,
            });
            next_id += 1;
        }
        while active.len() > target {
            let Some(vu) = active.pop() else { break };
            vu.signals.stop.cancel();
            retiring.push(RetiringVu {
                vu,
                deadline: grace_deadline(options.graceful_ramp_down)?,
            });
        }

        reap(&mut retiring, &mut metrics).await?;

        let vus = active.len() as u32;
        metrics.observe_vus(vus);
        timeline.push(VuSample { elapsed, vus });
        bar.set_message(format!("Running {}: {vus} VUs", scenario.name()));
    }

    // Whatever the profile says at the end, nobody keeps running.
    let stop_deadline = grace_deadline(options.graceful_stop)?;
    for vu in active.drain(..) {
        vu.signals.stop.cancel();
        retiring.push(RetiringVu {
            vu,
            deadline: stop_deadline,
        });
    }
    timeline.push(VuSample {
        elapsed: start.elapsed(),
        vus: 0,
    });

    bar.set_message(format!("Stopping {} VUs:", retiring.len()));
    drain(retiring, &mut metrics).await?;
    bar.finish_and_clear();

    let elapsed = start.elapsed();
    tracing::info!(
        scenario = scenario.name(),
        elapsed = %humantime::format_duration(round_to_millis(elapsed)),
        requests = metrics.requests,
        failed = metrics.failed_requests,
        "run finished"
    );

    Ok(RunSummary {
        scenario: scenario.name().to_owned(),
        elapsed,
        aborted,
        metrics,
        timeline,
    })
}

/// Collects VUs that have exited and kills the ones past their deadline.
async fn reap(retiring: &mut Vec<RetiringVu>, metrics: &mut RunMetrics) -> Result<()> {
    let now = Instant::now();
    let mut index = 0;

    while index < retiring.len() {
        let entry = &retiring[index];
        if entry.vu.handle.is_finished() {
            let RetiringVu { vu, .. } = retiring.swap_remove(index);
            merge_exited(vu.id, vu.handle.await, metrics)?;
            continue;
        }
        if now >= entry.deadline && !entry.vu.signals.kill.is_cancelled() {
            tracing::debug!(vu = entry.vu.id, "graceful ramp-down expired, interrupting");
            entry.vu.signals.kill.cancel();
        }
        index += 1;
    }

    Ok(())
}

/// Waits for all VUs to exit, killing each one that outlives its deadline.
async fn drain(mut retiring: Vec<RetiringVu>, metrics: &mut RunMetrics) -> Result<()> {
    // Earliest deadline first, so waiting on one VU never delays killing another.
    retiring.sort_by_key(|entry| entry.deadline);

    for RetiringVu { mut vu, deadline } in retiring {
        let result = match tokio::time::timeout_at(deadline, &mut vu.handle).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(vu = vu.id, "graceful stop expired, interrupting");
                vu.signals.kill.cancel();
                vu.handle.await
            }
        };
        merge_exited(vu.id, result, metrics)?;
    }

    Ok(())
}

fn grace_deadline(grace: Duration) -> Result<Instant> {
    Instant::now()
        .checked_add(grace)
        .context("grace period exceeds the supported range")
}

fn merge_exited(
    id: u64,
    result: Result<RunMetrics, JoinError>,
    metrics: &mut RunMetrics,
) -> Result<()> {
    let vu_metrics = result.with_context(|| format!("virtual user {id} panicked"))?;
    metrics.merge(&vu_metrics);
    Ok(())
}

fn round_to_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}
