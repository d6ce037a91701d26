//! Command line flags. Every flag can also come from a `RECLAIM_*` env var.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use reclaim_core::domain::{DEFAULT_WORKER_COUNT, Policy, PolicyError};

#[derive(Debug, Parser)]
#[command(name = "reclaim", version, about = "Deletes expired buckets and everything inside them")]
pub struct Cli {
    /// Project whose buckets are swept
    #[arg(long, env = "RECLAIM_PROJECT")]
    pub project: String,

    /// Bucket name pattern with exactly one capture group holding a base-36 nanosecond timestamp
    #[arg(long, env = "RECLAIM_BUCKET_NAME_REGEXP")]
    pub bucket_name_regexp: String,

    /// Comma separated bucket names that are never deleted
    #[arg(long, env = "RECLAIM_EXCLUDED_BUCKETS", value_delimiter = ',')]
    pub excluded_buckets: Vec<String>,

    /// Minimum bucket age before it is deleted (e.g. `90m`, `2h`, `1d`)
    #[arg(long, env = "RECLAIM_DURATION", default_value = "2h", value_parser = humantime::parse_duration)]
    pub duration: Duration,

    /// Log what would be deleted without deleting anything
    #[arg(long, env = "RECLAIM_DRY_RUN")]
    pub dry_run: bool,

    /// Concurrent object deletions per bucket
    #[arg(long, env = "RECLAIM_WORKERS", default_value_t = DEFAULT_WORKER_COUNT)]
    pub workers: usize,

    #[arg(long, env = "RECLAIM_LOG_LEVEL", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Directory whose subdirectories are treated as buckets
    #[arg(long, env = "RECLAIM_ROOT", default_value = ".")]
    pub root: PathBuf,

    #[arg(long, env = "RECLAIM_REPORT", value_enum, default_value_t = ReportFormat::Text)]
    pub report: ReportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

impl Cli {
    pub fn policy(&self) -> Result<Policy, PolicyError> {
        Policy::builder(self.project.as_str())
            .bucket_name_pattern(self.bucket_name_regexp.as_str())
            .exclude(
                self.excluded_buckets
                    .iter()
                    .map(|name| name.trim())
                    .filter(|name| !name.is_empty()),
            )
            .lifespan(self.duration)
            .dry_run(self.dry_run)
            .workers(self.workers)
            .build()
    }
}
