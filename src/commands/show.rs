use anyhow::Result;
use tracing::info;

use super::log_report;
use crate::cli::ShowArgs;
use crate::scoring::report::read_report;

pub fn run(args: ShowArgs) -> Result<()> {
    let report = read_report(&args.report_path)?;
    info!(path = %args.report_path.display(), metrics = report.len(), "loaded score report");
    log_report(&report);
    Ok(())
}
