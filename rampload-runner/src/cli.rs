//! Command line interface of the `rampload` binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use argh::FromArgs;

use crate::config::Config;
use crate::http::HttpRemote;
use crate::scheduler::{self, RunOptions};
use crate::{observability, report};

/// Staged HTTP load generator.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Validate(ValidateCommand),
    Plan(PlanCommand),
    Version(VersionCommand),
}

/// run the configured scenario and print a summary
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {
    /// send all requests to this URL instead of the configured ones
    #[argh(option)]
    url: Option<String>,

    /// do not show the progress spinner
    #[argh(switch)]
    no_progress: bool,
}

/// check the configuration and scenario without sending any traffic
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "validate")]
struct ValidateCommand {}

/// print the stage timeline and iteration steps of the scenario
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "plan")]
struct PlanCommand {}

/// print the rampload version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("rampload {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    observability::init_tracing(&config.logging);
    tracing::debug!(?config);

    let scenario = config.scenario().context("invalid scenario")?;

    match args.command {
        Command::Validate(ValidateCommand {}) => {
            println!("{}: OK", scenario.name());
            Ok(())
        }
        Command::Plan(PlanCommand {}) => {
            report::print_plan(&scenario);
            Ok(())
        }
        Command::Run(RunCommand { url, no_progress }) => {
            let scenario = match url {
                Some(url) => scenario.retarget(&url).context("invalid --url")?,
                None => scenario,
            };

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .thread_name("rampload")
                .enable_all()
                .build()?;

            runtime.block_on(async move {
                let remote = HttpRemote::new(&config.http).context("failed to create HTTP client")?;
                let options = RunOptions {
                    progress: !no_progress,
                    ..RunOptions::from_config(&config)
                };

                let shutdown = options.shutdown.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        shutdown.cancel();
                    }
                });

                let summary = scheduler::run(&scenario, Arc::new(remote), options).await?;
                report::print_summary(&summary);
                Ok::<_, anyhow::Error>(())
            })
        }
        Command::Version(VersionCommand {}) => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::from_args(&["rampload"], args).unwrap()
    }

    #[test]
    fn parses_run_with_overrides() {
        let args = parse(&[
            "-c",
            "load.yaml",
            "run",
            "--url",
            "http://host/health",
            "--no-progress",
        ]);

        assert_eq!(args.config, Some(PathBuf::from("load.yaml")));
        let Command::Run(run) = args.command else {
            panic!("expected run command");
        };
        assert_eq!(run.url.as_deref(), Some("http://host/health"));
        assert!(run.no_progress);
    }

    #[test]
    fn config_is_optional() {
        let args = parse(&["plan"]);
        assert_eq!(args.config, None);
        assert!(matches!(args.command, Command::Plan(_)));
    }

    #[test]
    fn rejects_unknown_subcommand() {
        assert!(Args::from_args(&["rampload"], &["explode"]).is_err());
    }
}
