mod jobs;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use backrun_core::app::RunnerConfig;
use backrun_core::observability::init_tracing;
use backrun_core::{BackgroundRunner, RunnerBuilder, StrategyKind};
use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::jobs::{DeliverNotice, RebuildDigest};

/// Dispatch and work background jobs.
#[derive(Parser, Debug)]
#[command(name = "backrun", version)]
struct Cli {
    /// Path to the TOML configuration.
    #[arg(long, env = "BACKRUN_CONFIG", default_value = "backrun.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration and print the selected strategy.
    Check,

    /// Dispatch one job.
    Dispatch {
        job_type: String,

        /// Positional arguments; each is parsed as JSON, falling back to a string.
        args: Vec<String>,
    },

    /// Consume the broker queues of the configured strategy until Ctrl-C.
    Work {
        /// Workers per queue.
        #[arg(long, default_value_t = 2)]
        concurrency: usize,

        /// Seconds a worker blocks on an empty queue before re-checking shutdown.
        #[arg(long, default_value_t = 2)]
        poll_timeout: u64,

        /// Move entries left in flight by a crashed consumer back onto their queues first.
        #[arg(long)]
        requeue_in_flight: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = RunnerConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_tracing(&config.logging);

    match cli.command {
        Command::Check => {
            let runner = build_runner(config).await?;
            println!("config ok: background_runner = {}", runner.strategy());
            for queue in runner.consumer_queues() {
                println!("  consumes queue: {queue}");
            }
            runner.shutdown().await;
        }
        Command::Dispatch { job_type, args } => {
            let runner = build_runner(config).await?;
            let args = args.iter().map(|raw| parse_arg(raw)).collect();
            let receipt = runner.run(job_type.as_str(), args).await;
            // in-process jobs only run while the pool is alive
            runner.shutdown().await;
            let receipt = receipt?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
        Command::Work {
            concurrency,
            poll_timeout,
            requeue_in_flight,
        } => {
            let runner = build_runner(config).await?;
            if runner.strategy() == StrategyKind::InProcess {
                anyhow::bail!("in_process runners perform jobs on dispatch; nothing to work");
            }
            if requeue_in_flight {
                let moved = runner.requeue_in_flight().await?;
                tracing::info!(moved, "requeued in-flight entries");
            }
            let group = runner.spawn_workers(concurrency, Duration::from_secs(poll_timeout))?;
            tracing::info!("working; press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            tracing::info!("shutting down workers");
            group.shutdown_and_join().await;
            runner.shutdown().await;
        }
    }

    Ok(())
}

async fn build_runner(config: RunnerConfig) -> anyhow::Result<BackgroundRunner> {
    let runner = RunnerBuilder::new(config)
        .register(DeliverNotice)?
        .register(RebuildDigest)?
        .build()
        .await?;
    Ok(runner)
}

fn parse_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn args_parse_as_json_or_string() {
        assert_eq!(parse_arg("42"), json!(42));
        assert_eq!(parse_arg("\"quoted\""), json!("quoted"));
        assert_eq!(parse_arg("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_arg("errbit"), json!("errbit"));
    }

    #[test]
    fn dispatch_command_parses() {
        let cli = Cli::try_parse_from([
            "backrun",
            "--config",
            "dev.toml",
            "dispatch",
            "deliver_notice",
            "errbit",
            "7",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("dev.toml"));
        match cli.command {
            Command::Dispatch { job_type, args } => {
                assert_eq!(job_type, "deliver_notice");
                assert_eq!(args, vec!["errbit".to_string(), "7".to_string()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn work_defaults() {
        let cli = Cli::try_parse_from(["backrun", "work"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Work {
                concurrency: 2,
                poll_timeout: 2,
                requeue_in_flight: false,
            }
        ));
    }

    #[test]
    fn work_recovery_flag() {
        let cli = Cli::try_parse_from(["backrun", "work", "--requeue-in-flight", "--poll-timeout", "5"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Work {
                poll_timeout: 5,
                requeue_in_flight: true,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn demo_jobs_register() {
        let mut config = RunnerConfig::new(StrategyKind::WorkerQueue);
        config.environment = backrun_core::app::Environment::Test;
        let runner = build_runner(config).await.unwrap();
        assert_eq!(runner.registry().len(), 2);
        runner
            .run("deliver_notice", vec![json!("errbit"), json!(7)])
            .await
            .unwrap();
    }
}
