use std::collections::BTreeMap;

use anyhow::Result;
use tracing::info;

use super::{log_interface, log_report, scratch_dir};
use crate::cli::EvaluateArgs;
use crate::engine::CommandEngine;
use crate::naming::UnderscoreFileInfoParser;
use crate::scoring::aggregate::{DatasetWeights, aggregate, segmentation_report};
use crate::scoring::report::{REPORT_FILE_NAME, write_report};
use crate::scoring::segmentation::evaluate_segmentation;
use crate::scoring::ScoringConfig;
use crate::util::ensure_directory;

const SEGMENTATION_METRIC_KEYS: [&str; 2] = ["ap", "ap50"];
const SUBMISSION_DATASET: &str = "submission";

pub fn run(args: EvaluateArgs) -> Result<()> {
    let config = ScoringConfig {
        label_class: args.label_class,
        datasets: vec![
            args.dataset
                .clone()
                .unwrap_or_else(|| SUBMISSION_DATASET.to_string()),
        ],
        weights: DatasetWeights::new(),
        ..ScoringConfig::default()
    };

    let submission_dir = match &args.dataset {
        Some(dataset) => args.submit_path.join(dataset),
        None => args.submit_path.clone(),
    };
    let report_path = args.output_path.join(REPORT_FILE_NAME);
    log_interface(&submission_dir, &args.labels_path, &report_path)?;
    ensure_directory(&args.output_path)?;

    let scratch = scratch_dir()?;
    let engine = CommandEngine::new(
        args.engine.engine.clone(),
        args.engine.engine_args.clone(),
        &scratch.path().join("requests"),
    );

    let metrics = evaluate_segmentation(
        &engine,
        &UnderscoreFileInfoParser,
        &submission_dir,
        &args.labels_path,
        &scratch.path().join("predictions"),
        config.label_class,
    )?;

    let per_dataset: BTreeMap<String, _> = config
        .datasets
        .iter()
        .map(|dataset| (dataset.clone(), metrics.clone()))
        .collect();
    let unified = aggregate(&per_dataset, &config.weights, &SEGMENTATION_METRIC_KEYS)?;
    let report = segmentation_report(&unified)?;

    write_report(&report_path, &report)?;
    info!(path = %report_path.display(), "wrote score report");
    log_report(&report);

    Ok(())
}
