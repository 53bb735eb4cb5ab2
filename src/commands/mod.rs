pub mod evaluate;
pub mod evaluate_detection;
pub mod show;
pub mod verify;

use std::path::Path;

use anyhow::{Context, Result, bail};
use tempfile::TempDir;
use tracing::info;

use crate::model::MetricSet;
use crate::scoring::SCORER_VERSION;
use crate::util::{now_utc_string, sha256_path};

fn log_interface(submission: &Path, labels: &Path, report_path: &Path) -> Result<()> {
    if !submission.is_dir() {
        bail!("{} doesn't exist", submission.display());
    }
    if !labels.is_dir() {
        bail!("{} doesn't exist", labels.display());
    }

    info!(
        scorer_version = SCORER_VERSION,
        data = %labels.display(),
        predictions = %submission.display(),
        report = %report_path.display(),
        submission_sha256 = %sha256_path(submission)?,
        started_at = %now_utc_string(),
        "scoring interface"
    );
    Ok(())
}

/// Scratch area owned by one run and removed when dropped.
fn scratch_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("anomaly-scoring-")
        .tempdir()
        .context("failed to create scratch directory")
}

fn log_report(report: &MetricSet) {
    for (key, value) in report.iter() {
        info!(metric = key, value, "score");
    }
}
