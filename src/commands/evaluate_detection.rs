use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tracing::info;

use super::{log_interface, log_report, scratch_dir};
use crate::cli::EvaluateDetectionArgs;
use crate::engine::{BoxEvalConfig, CommandEngine};
use crate::model::MetricSet;
use crate::scoring::ScoringConfig;
use crate::scoring::aggregate::{
    CONFUSION_METRIC_KEYS, DETECTION_METRIC_KEYS, DatasetWeights, UNIFIED, aggregate,
    detection_report,
};
use crate::scoring::detection::evaluate_dataset;
use crate::scoring::report::{REPORT_FILE_NAME, write_report};
use crate::util::ensure_directory;

pub fn run(args: EvaluateDetectionArgs) -> Result<()> {
    let config = ScoringConfig {
        threshold: args.threshold,
        datasets: args.datasets.clone(),
        weights: args.dataset_weights.iter().cloned().collect::<DatasetWeights>(),
        ..ScoringConfig::default()
    };

    let report_path = args.output_path.join(REPORT_FILE_NAME);
    log_interface(&args.submit_path, &args.labels_path, &report_path)?;
    ensure_directory(&args.output_path)?;

    let scratch = scratch_dir()?;
    let engine = CommandEngine::new(
        args.engine.engine.clone(),
        args.engine.engine_args.clone(),
        &scratch.path().join("requests"),
    );
    let box_config = BoxEvalConfig::default();
    let predictions_dir = scratch.path().join("predictions");

    let mut per_dataset: BTreeMap<String, MetricSet> = BTreeMap::new();
    for dataset in &config.datasets {
        let metrics = evaluate_dataset(
            &engine,
            &box_config,
            dataset,
            &args.submit_path,
            &args.labels_path,
            &predictions_dir,
            config.threshold,
        )
        .with_context(|| format!("failed to evaluate {dataset}"))?;
        per_dataset.insert(dataset.clone(), metrics);
    }

    let keys: Vec<&str> = DETECTION_METRIC_KEYS
        .iter()
        .chain(CONFUSION_METRIC_KEYS.iter())
        .copied()
        .collect();
    let unified = aggregate(&per_dataset, &config.weights, &keys)?;
    for (key, value) in unified.iter() {
        info!(dataset = UNIFIED, metric = key, value, "result");
    }

    let report = detection_report(&unified)?;
    write_report(&report_path, &report)?;
    info!(path = %report_path.display(), "wrote score report");
    log_report(&report);

    Ok(())
}
