//! # Task Runtime
//!
//! Command-line entry point: wires a local signing service to the task
//! list and runs a scripted session against it.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (env, then command-line overrides)
//! 2. Initialize telemetry
//! 3. Build the service container
//! 4. Wait for the signing service, discover, create, complete
//! 5. Print the final list (and metrics when asked)

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use task_runtime::container::{RuntimeConfig, ServiceContainer};
use task_runtime::session::{run_session, NewTask, SessionPlan, SessionReport};
use task_tokens::EvidencePolicy;

#[derive(Parser, Debug)]
#[command(name = "task-runtime")]
#[command(about = "Encrypted task list backed by value-bearing ledger records")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create tasks, complete some of them, print what is left
    Demo {
        /// Task to create, as `text=value` (repeatable)
        #[arg(long = "task")]
        tasks: Vec<NewTask>,

        /// Number of newest tasks to complete afterwards
        #[arg(long, default_value = "0")]
        complete: usize,

        /// Emit JSON logs and a JSON summary
        #[arg(long)]
        json_logs: bool,

        /// Evidence handling at completion (skip, warn, enforce)
        #[arg(long)]
        evidence_policy: Option<EvidencePolicy>,

        /// Satoshis minted into the local wallet at startup
        #[arg(long, default_value = "100000")]
        fund: u64,

        /// Flat fee per transaction
        #[arg(long, default_value = "0")]
        fee: u64,

        /// Seconds to wait for the signing service
        #[arg(long, default_value = "10")]
        wait_secs: u64,

        /// Print Prometheus metrics at the end
        #[arg(long)]
        metrics: bool,
    },
}

/// One configured run of the task runtime.
struct TaskRuntime {
    container: ServiceContainer,
    plan: SessionPlan,
    json_output: bool,
    print_metrics: bool,
}

impl TaskRuntime {
    fn from_args(args: Args) -> Result<(Self, task_telemetry::TelemetryGuard)> {
        let Command::Demo {
            tasks,
            complete,
            json_logs,
            evidence_policy,
            fund,
            fee,
            wait_secs,
            metrics,
        } = args.command;

        let mut config = RuntimeConfig::from_env().context("Invalid configuration")?;
        if let Some(policy) = evidence_policy {
            config.tokens.evidence_policy = policy;
        }
        config.telemetry.json_logs |= json_logs;
        config.telemetry.metrics_enabled |= metrics;
        config.wallet.funding = fund;
        config.wallet.fee = fee;

        let guard = task_telemetry::init_telemetry(config.telemetry.clone())
            .context("Failed to initialize telemetry")?;

        let json_output = config.telemetry.json_logs;
        let container = ServiceContainer::new(config).context("Failed to build services")?;

        Ok((
            Self {
                container,
                plan: SessionPlan {
                    tasks,
                    complete,
                    wait_timeout: Duration::from_secs(wait_secs),
                },
                json_output,
                print_metrics: metrics,
            },
            guard,
        ))
    }

    async fn run(mut self) -> Result<()> {
        info!(
            version = task_tokens::VERSION,
            tasks = self.plan.tasks.len(),
            complete = self.plan.complete,
            "Starting task runtime"
        );

        let report = run_session(&mut self.container, &self.plan).await?;
        if self.json_output {
            println!("{}", serde_json::to_string_pretty(&summary(&report))?);
        } else {
            print_text(&report);
        }

        if self.print_metrics {
            let text = task_telemetry::encode_metrics().context("Failed to encode metrics")?;
            println!("{text}");
        }
        Ok(())
    }
}

fn summary(report: &SessionReport) -> serde_json::Value {
    json!({
        "network": report.network.map(|n| n.to_string()),
        "discovered": report.discovered,
        "created": report.created.iter().map(|c| json!({
            "identity": c.record.identity.to_string(),
            "text": c.record.plaintext,
            "value": c.record.value,
        })).collect::<Vec<_>>(),
        "completed": report.redeemed.iter().map(|r| json!({
            "identity": r.identity.to_string(),
            "txid": hex::encode(r.txid),
            "value": r.value,
            "verification": r.verification.as_str(),
        })).collect::<Vec<_>>(),
        "remaining": report.remaining.iter().map(|t| json!({
            "identity": t.identity.to_string(),
            "text": t.plaintext,
            "value": t.value,
        })).collect::<Vec<_>>(),
    })
}

fn print_text(report: &SessionReport) {
    println!(
        "created {}, completed {}, remaining {}",
        report.created.len(),
        report.redeemed.len(),
        report.remaining.len()
    );
    for task in &report.remaining {
        println!("  [{}] {} ({} sats)", task.identity, task.plaintext, task.value);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (runtime, _telemetry) = TaskRuntime::from_args(args)?;
    runtime.run().await
}
