use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use errtrail_core::{Tracer, TracedError};
use tokio::time::{Duration, sleep};
use tracing::{debug, error, info};

/// Run a simulated batch and print the aggregated failure report
#[derive(Parser)]
#[command(name = "errtrail")]
#[command(about = "Demo of traced errors and batch aggregation", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run N jobs concurrently; every K-th job fails
    Run {
        /// Number of jobs to spawn
        #[arg(short, long, default_value = "8")]
        jobs: usize,

        /// Fail jobs whose index is a multiple of this (0 = never fail)
        #[arg(short, long, default_value = "3")]
        fail_every: usize,

        /// Show source files relative to this directory
        #[arg(long)]
        strip_prefix: Option<PathBuf>,
    },
}

/// Innermost step: the only place a foreign error is born.
fn fetch(tracer: &Tracer, job: usize, fail_every: usize) -> Result<Vec<u8>, TracedError> {
    if fail_every > 0 && job % fail_every == 0 {
        let err = std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            format!("job {job}: connection reset by peer"),
        );
        return Err(tracer.wrap(err));
    }
    Ok(format!("payload-{job}").into_bytes())
}

fn decode(tracer: &Tracer, job: usize, fail_every: usize) -> Result<String, TracedError> {
    match fetch(tracer, job, fail_every) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) => Err(tracer.wrap(err)),
    }
}

fn store(tracer: &Tracer, job: usize, fail_every: usize) -> Result<usize, TracedError> {
    match decode(tracer, job, fail_every) {
        Ok(text) => Ok(text.len()),
        Err(err) => Err(tracer.wrap(err)),
    }
}

/// Later jobs sleep less so failures arrive out of spawn order
fn stagger_delay(jobs: usize, job: usize) -> Duration {
    let millis = jobs.saturating_sub(job).saturating_mul(5);
    Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
}

async fn run(jobs: usize, fail_every: usize, strip_prefix: Option<PathBuf>) -> ExitCode {
    let mut builder = Tracer::builder();
    if let Some(prefix) = strip_prefix {
        builder = builder.strip_prefix(prefix);
    }
    let tracer = match builder.build() {
        Ok(tracer) => Arc::new(tracer),
        Err(e) => {
            eprintln!("invalid tracer settings: {e}");
            return ExitCode::FAILURE;
        }
    };

    let root = Arc::new(tracer.new_aggregate_root());

    let mut handles = Vec::with_capacity(jobs);
    for job in 0..jobs {
        let tracer = Arc::clone(&tracer);
        let root = Arc::clone(&root);
        handles.push(tokio::spawn(async move {
            sleep(stagger_delay(jobs, job)).await;
            match store(&tracer, job, fail_every) {
                Ok(bytes) => debug!(job, bytes, "job stored"),
                Err(err) => {
                    if let Err(e) = root.add(err) {
                        error!("failed to record job {job}: {e}");
                    }
                }
            }
        }));
    }
    for handle in handles {
        if let Err(e) = handle.await {
            error!("job task panicked: {e}");
        }
    }

    let failed = root.error_list().map_or(0, |list| list.len());
    info!(jobs, failed, "batch finished");
    println!("{root}");

    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(cli.verbose >= 2)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            jobs,
            fail_every,
            strip_prefix,
        } => run(jobs, fail_every, strip_prefix).await,
    }
}
