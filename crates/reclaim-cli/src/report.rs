use std::fmt::Write as _;

use reclaim_core::SweepResult;
use reclaim_core::domain::BucketOutcome;

use crate::cli::ReportFormat;

/// One line per bucket, or the whole result as JSON.
pub fn render(result: &SweepResult, format: ReportFormat) -> anyhow::Result<String> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        ReportFormat::Text => render_text(result),
    }
}

fn render_text(result: &SweepResult) -> anyhow::Result<String> {
    let mut out = String::new();
    for report in result.buckets() {
        let line = match &report.outcome {
            BucketOutcome::Deleted { objects, dry_run: true } => {
                format!("[dry-run] reclaimed {} ({objects} objects)", report.bucket)
            }
            BucketOutcome::Deleted { objects, dry_run: false } => {
                format!("reclaimed {} ({objects} objects)", report.bucket)
            }
            BucketOutcome::Skipped(reason) => format!("skipped {}: {reason}", report.bucket),
            BucketOutcome::Errored { reason } => format!("failed {}: {reason}", report.bucket),
        };
        writeln!(out, "{line}")?;
    }
    write!(
        out,
        "{} reclaimed, {} skipped, {} failed",
        result.reclaimed().count(),
        result.skipped().count(),
        result.errored().count()
    )?;
    Ok(out)
}
