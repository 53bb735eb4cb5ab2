use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::engine::{InstanceEvalConfig, InstanceEvaluator, pair_predictions};
use crate::model::MetricSet;
use crate::naming::{FileInfoParser, IMAGE_SUFFIX};
use crate::scoring::remap::remap;

pub fn evaluate_segmentation(
    engine: &dyn InstanceEvaluator,
    parser: &dyn FileInfoParser,
    submission_dir: &Path,
    labels_dir: &Path,
    prediction_dir: &Path,
    label_class: u32,
) -> Result<MetricSet> {
    let remapped = remap(submission_dir, prediction_dir, label_class)
        .with_context(|| format!("failed to prepare {}", submission_dir.display()))?;

    let ground_truth = list_ground_truth_images(labels_dir)?;
    if ground_truth.is_empty() {
        warn!(labels = %labels_dir.display(), "cannot find any ground truth images");
        bail!("no ground truth images found in {}", labels_dir.display());
    }
    if remapped.index_files == 0 {
        warn!(submission = %submission_dir.display(), "no prediction index files");
        bail!(
            "no prediction index files in {}; pass --dataset to score one dataset directory",
            submission_dir.display()
        );
    }

    let pairs = pair_predictions(&ground_truth, prediction_dir, parser)
        .context("failed to match predictions to ground truth")?;
    info!(images = pairs.len(), "matched predictions to ground truth");

    let config = InstanceEvalConfig::new(prediction_dir, labels_dir);
    let averages = engine
        .evaluate(&config, &pairs)
        .context("instance segmentation engine failed")?;

    Ok([("ap", averages.all_ap), ("ap50", averages.all_ap50)]
        .into_iter()
        .collect())
}

pub fn list_ground_truth_images(labels_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(labels_dir)
        .with_context(|| format!("failed to read {}", labels_dir.display()))?;

    let mut images = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", labels_dir.display()))?;
        let path = entry.path();
        let is_png = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.ends_with(IMAGE_SUFFIX))
            .unwrap_or(false);
        if is_png {
            let absolute = path
                .canonicalize()
                .with_context(|| format!("failed to resolve {}", path.display()))?;
            images.push(absolute);
        }
    }

    images.sort();
    Ok(images)
}
