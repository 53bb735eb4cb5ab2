use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::engine::{BoxEvalConfig, BoxEvaluator};
use crate::model::{CocoGroundTruth, DetectionRecord, ImageId, MetricSet};
use crate::scoring::aggregate::DETECTION_METRIC_KEYS;
use crate::scoring::confusion::classify;
use crate::util::write_json_pretty;

pub fn label_file_name(dataset: &str) -> String {
    format!("{dataset}_label.json")
}

pub fn prediction_file_name(dataset: &str) -> String {
    format!("{dataset}.json")
}

/// Drops predictions for images that are not part of the ground truth.
pub fn filter_to_ground_truth(
    predictions: Vec<DetectionRecord>,
    ground_truth: &CocoGroundTruth,
) -> Vec<DetectionRecord> {
    let known: HashSet<&ImageId> = ground_truth.images.iter().map(|image| &image.id).collect();
    predictions
        .into_iter()
        .filter(|prediction| known.contains(&prediction.image_id))
        .collect()
}

pub fn evaluate_dataset(
    engine: &dyn BoxEvaluator,
    config: &BoxEvalConfig,
    dataset: &str,
    submission_dir: &Path,
    labels_dir: &Path,
    scratch_dir: &Path,
    threshold: f64,
) -> Result<MetricSet> {
    info!(dataset, "evaluating");

    let gt_path = labels_dir.join(label_file_name(dataset));
    let prediction_path = submission_dir.join(prediction_file_name(dataset));

    let ground_truth: CocoGroundTruth = read_json(&gt_path)?;
    let predictions: Vec<DetectionRecord> = read_json(&prediction_path)?;
    info!(count = predictions.len(), "bounding box predictions");

    let filtered = filter_to_ground_truth(predictions, &ground_truth);
    info!(count = filtered.len(), "bounding box predictions for the ground truth");

    let filtered_path = scratch_dir.join(prediction_file_name(dataset));
    write_json_pretty(&filtered_path, &filtered)?;

    let evaluation = engine
        .evaluate(config, &gt_path, &filtered_path)
        .with_context(|| format!("bounding box engine failed for {dataset}"))?;

    let expected: BTreeSet<String> = ground_truth
        .images
        .iter()
        .map(|image| image.id.to_string())
        .collect();
    let returned: BTreeSet<String> = evaluation
        .images
        .iter()
        .map(|image| image.image_id.to_string())
        .collect();
    if expected != returned || evaluation.images.len() != expected.len() {
        let missing: Vec<&String> = expected.difference(&returned).collect();
        let unexpected: Vec<&String> = returned.difference(&expected).collect();
        warn!(
            dataset,
            engine_images = evaluation.images.len(),
            ground_truth_images = expected.len(),
            missing = ?missing,
            unexpected = ?unexpected,
            "engine overlaps do not cover the ground truth images"
        );
        bail!(
            "bounding box engine returned overlaps for {} images, ground truth has {} ({} missing, {} unexpected)",
            evaluation.images.len(),
            expected.len(),
            missing.len(),
            unexpected.len()
        );
    }

    let mut metrics: MetricSet = DETECTION_METRIC_KEYS
        .iter()
        .zip(evaluation.stats.iter())
        .map(|(key, value)| (*key, *value))
        .collect();

    let counts = classify(&evaluation.images, threshold);
    counts.write_metrics(&mut metrics);
    info!(
        dataset,
        true_positives = counts.true_positives,
        false_positives = counts.false_positives,
        false_negatives = counts.false_negatives,
        ppf = counts.detections_per_image(),
        "confusion counts"
    );

    Ok(metrics)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
