//! A single virtual user looping over the iteration.

use std::sync::Arc;

use rampload_scenario::{IterationAction, Step};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::StatusRange;
use crate::http::Remote;
use crate::metrics::RunMetrics;

/// Signals the scheduler uses to end a virtual user.
#[derive(Clone, Debug, Default)]
pub(crate) struct VuSignals {
    /// Finish the current iteration, then exit.
    pub stop: CancellationToken,
    /// Abort the current iteration immediately.
    pub kill: CancellationToken,
}

/// A simulated client repeating the iteration until it is stopped.
pub(crate) struct VirtualUser {
    pub id: u64,
    pub action: Arc<IterationAction>,
    pub remote: Arc<dyn Remote>,
    pub expected_statuses: StatusRange,
}

impl VirtualUser {
    /// Runs iterations until signalled and returns what this user recorded.
    ///
    /// The stop signal is only observed between iterations. A kill aborts the iteration in
    /// progress, including any in-flight request, and counts it as interrupted.
    pub async fn run(self, signals: VuSignals) -> RunMetrics {
        tracing::trace!(vu = self.id, "virtual user started");
        let mut metrics = RunMetrics::default();

        while !signals.stop.is_cancelled() {
            let completed = tokio::select! {
                biased;
                _ = signals.kill.cancelled() => false,
                _ = self.iterate(&mut metrics) => true,
            };

            if completed {
                metrics.iterations += 1;
            } else {
                metrics.interrupted_iterations += 1;
                break;
            }
        }

        tracing::trace!(vu = self.id, iterations = metrics.iterations, "virtual user exited");
        metrics
    }

    async fn iterate(&self, metrics: &mut RunMetrics) {
        for step in self.action.steps() {
            match step {
                Step::Request(request) => {
                    let start = Instant::now();
                    match self.remote.request(request).await {
                        Ok(status) => {
                            let expected = self.expected_statuses.contains(status);
                            if !expected {
                                tracing::debug!(
                                    vu = self.id,
                                    %request,
                                    status,
                                    "unexpected status"
                                );
                            }
                            metrics.record_response(start.elapsed(), status, expected);
                        }
                        Err(err) => {
                            tracing::debug!(
                                vu = self.id,
                                %request,
                                error = &err as &dyn std::error::Error,
                                "request failed"
                            );
                            metrics.record_error(&err);
                        }
                    }
                }
                Step::Pause(duration) => tokio::time::sleep(*duration).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use rampload_scenario::RequestStep;

    use crate::http::RequestError;

    use super::*;

    #[derive(Debug)]
    struct ScriptedRemote {
        responses: Mutex<Vec<Result<u16, RequestError>>>,
        latency: Duration,
    }

    #[async_trait]
    impl Remote for ScriptedRemote {
        async fn request(&self, _step: &RequestStep) -> Result<u16, RequestError> {
            tokio::time::sleep(self.latency).await;
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(200)
            } else {
                responses.remove(0)
            }
        }
    }

    fn user(responses: Vec<Result<u16, RequestError>>, pause: Duration) -> VirtualUser {
        let action = IterationAction::new(vec![
            Step::Request(RequestStep::get("http://host/health").unwrap()),
            Step::Pause(pause),
        ])
        .unwrap();

        VirtualUser {
            id: 1,
            action: Arc::new(action),
            remote: Arc::new(ScriptedRemote {
                responses: Mutex::new(responses),
                latency: Duration::from_millis(10),
            }),
            expected_statuses: StatusRange::default(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_finishes_current_iteration() {
        let signals = VuSignals::default();
        let handle = tokio::spawn(user(vec![], Duration::from_secs(1)).run(signals.clone()));

        // Stop in the middle of the first pause.
        tokio::time::sleep(Duration::from_millis(500)).await;
        signals.stop.cancel();

        let metrics = handle.await.unwrap();
        assert_eq!(metrics.iterations, 1);
        assert_eq!(metrics.interrupted_iterations, 0);
        assert_eq!(metrics.requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn kill_interrupts_current_iteration() {
        let signals = VuSignals::default();
        let handle = tokio::spawn(user(vec![], Duration::from_secs(10)).run(signals.clone()));

        tokio::time::sleep(Duration::from_millis(500)).await;
        signals.stop.cancel();
        signals.kill.cancel();

        let start = Instant::now();
        let metrics = handle.await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(metrics.iterations, 0);
        assert_eq!(metrics.interrupted_iterations, 1);
        // the request before the pause still counts
        assert_eq!(metrics.requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn records_failures_and_keeps_going() {
        let signals = VuSignals::default();
        let responses = vec![Ok(503), Err(RequestError::Timeout), Ok(204)];
        let user = user(responses, Duration::from_millis(100));
        let handle = tokio::spawn(user.run(signals.clone()));

        // Three iterations take ~330ms, stop during the fourth.
        tokio::time::sleep(Duration::from_millis(350)).await;
        signals.stop.cancel();

        let metrics = handle.await.unwrap();
        assert_eq!(metrics.iterations, 4);
        assert_eq!(metrics.requests, 4);
        assert_eq!(metrics.failed_requests, 2);
        assert_eq!(metrics.errors.get("timeout"), Some(&1));
        assert_eq!(metrics.statuses.get(&503), Some(&1));
        assert_eq!(metrics.statuses.get(&200), Some(&1));
    }
}
