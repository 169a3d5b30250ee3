//! Print run plans and summaries to stdout.

use std::fmt::{self, Write as _};
use std::time::Duration;

use rampload_scenario::{Scenario, Step};
use sketches_ddsketch::DDSketch;
use yansi::Paint;

use crate::metrics::RunMetrics;
use crate::scheduler::RunSummary;

/// Prints the stage timeline and iteration of a scenario without running it.
pub fn print_plan(scenario: &Scenario) {
    let profile = scenario.profile();

    println!(
        "{} {} (stages: {}, duration: {}, max VUs: {})",
        "## Scenario".bold(),
        scenario.name().bold().blue(),
        profile.stages().len(),
        humantime::format_duration(profile.total_duration()),
        profile.max_target().bold()
    );

    println!("{}", "STAGES:".bold().green());
    for segment in profile.segments() {
        let shape = match segment.from.cmp(&segment.to) {
            std::cmp::Ordering::Less => "ramp up",
            std::cmp::Ordering::Equal => "hold",
            std::cmp::Ordering::Greater => "ramp down",
        };
        println!(
            "  {}. {:>8} .. {:<8} {:>5} -> {:<5} VUs ({shape})",
            segment.index + 1,
            humantime::format_duration(segment.start).to_string(),
            humantime::format_duration(segment.end).to_string(),
            segment.from,
            segment.to,
        );
    }

    let action = scenario.action();
    println!(
        "{} (pausing {} per iteration)",
        "ITERATION:".bold().green(),
        humantime::format_duration(action.pause_duration())
    );
    for (index, step) in action.steps().iter().enumerate() {
        match step {
            Step::Request(request) => println!("  {}. {request}", index + 1),
            Step::Pause(duration) => {
                println!("  {}. pause {}", index + 1, humantime::format_duration(*duration))
            }
        }
    }
}

/// Prints the metrics of a finished run.
pub fn print_summary(summary: &RunSummary) {
    let metrics = &summary.metrics;

    println!();
    print!(
        "{} {} (elapsed: {}, peak VUs: {}",
        "## Run".bold(),
        summary.scenario.bold().blue(),
        humantime::format_duration(Duration::from_secs(summary.elapsed.as_secs())),
        metrics.peak_vus.bold()
    );
    if summary.aborted {
        print!(", {}", "ABORTED".bold().yellow());
    }
    println!(")");

    print_requests(metrics, summary.elapsed);
    print_iterations(metrics);
    println!();
}

fn print_requests(metrics: &RunMetrics, elapsed: Duration) {
    print!(
        "{} ({} requests",
        "REQUESTS:".bold().green(),
        metrics.requests.bold()
    );
    if metrics.failed_requests > 0 {
        print!(
            ", {}",
            format!("{} FAILURES", metrics.failed_requests).bold().red()
        );
    }
    println!(")");

    if metrics.requests == 0 {
        return;
    }

    print_rate(metrics.requests, elapsed);
    if metrics.request_timing.count() > 0 {
        print_percentiles(&metrics.request_timing, Duration::from_secs_f64);
    }
    if !metrics.statuses.is_empty() {
        println!("  status: {}", join_counts(&metrics.statuses));
    }
    if !metrics.errors.is_empty() {
        println!("  errors: {}", join_counts(&metrics.errors).red());
    }
}

fn print_iterations(metrics: &RunMetrics) {
    print!(
        "{} ({} completed",
        "ITERATIONS:".bold().green(),
        metrics.iterations.bold()
    );
    if metrics.interrupted_iterations > 0 {
        print!(
            ", {}",
            format!("{} interrupted", metrics.interrupted_iterations).yellow()
        );
    }
    println!(")");
}

fn print_rate(count: u64, elapsed: Duration) {
    let per_second = count as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    println!("  {:.2} requests/s", per_second.bold());
}

fn print_percentiles<T: fmt::Debug>(sketch: &DDSketch, map: impl Fn(f64) -> T) {
    let quantile = |q| sketch.quantile(q).ok().flatten().map(&map);
    let Some(sum) = sketch.sum() else { return };

    let avg = map(sum / sketch.count() as f64);
    println!(
        "  avg: {:.2?}; p50: {:.2?}; p90: {:.2?}; p99: {:.2?}",
        avg.bold(),
        Quantile(quantile(0.5)),
        Quantile(quantile(0.9)),
        Quantile(quantile(0.99)),
    );
}

fn join_counts<K: fmt::Display>(counts: &std::collections::BTreeMap<K, u64>) -> String {
    let mut joined = String::new();
    for (key, count) in counts {
        if !joined.is_empty() {
            joined.push_str(", ");
        }
        let _ = write!(joined, "{key} x{count}");
    }
    joined
}

/// Prints a missing quantile as `-`.
struct Quantile<T>(Option<T>);

impl<T: fmt::Debug> fmt::Debug for Quantile<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => value.fmt(f),
            None => f.write_str("-"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn joins_counts_in_key_order() {
        let counts = BTreeMap::from([(503, 2), (200, 10)]);
        assert_eq!(join_counts(&counts), "200 x10, 503 x2");
    }

    #[test]
    fn missing_quantile_prints_dash() {
        assert_eq!(format!("{:?}", Quantile::<Duration>(None)), "-");
        assert_eq!(
            format!("{:.2?}", Quantile(Some(Duration::from_millis(1500)))),
            "1.50s"
        );
    }
}
