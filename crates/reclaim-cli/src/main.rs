//! `reclaim` -- deletes expired buckets from a directory-backed store.
//!
//! Exit codes: 0 on success, 1 when any bucket failed, 2 on invalid configuration.

mod cli;
mod report;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use reclaim_core::impls::LocalFsStorage;
use reclaim_core::{BucketReclaimer, CancelableScope, SweepError};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = cli.log_level.as_directive();
            format!("reclaim_cli={level},reclaim_core={level}").into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = ?e, "reclaim failed");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let policy = cli.policy().context("invalid configuration")?;
    let storage = Arc::new(LocalFsStorage::new(&cli.root));
    anyhow::ensure!(
        storage.root().is_dir(),
        "storage root {} is not a directory",
        storage.root().display()
    );

    let scope = CancelableScope::root();
    let on_signal = scope.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling sweep");
            on_signal.cancel();
        }
    });

    let outcome = BucketReclaimer::new(storage, policy).run(&scope).await;

    let (result, code) = match outcome {
        Ok(result) => (result, ExitCode::SUCCESS),
        Err(err) => {
            log_sweep_error(&err);
            (err.into_result(), ExitCode::FAILURE)
        }
    };
    println!("{}", report::render(&result, cli.report)?);
    Ok(code)
}

fn log_sweep_error(err: &SweepError) {
    for failure in err.failures() {
        tracing::error!(bucket = failure.bucket(), error = %failure, "sweep failure");
    }
}
