use serde::{Deserialize, Serialize};

use crate::model::{ImageId, MetricSet};

pub const DEFAULT_IOU_THRESHOLD: f64 = 0.5;

/// Per-image overlap data taken from the box engine's IoU cache for the scored category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOverlaps {
    pub image_id: ImageId,
    pub gt_count: u64,
    pub dt_count: u64,
    #[serde(default)]
    pub ious: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageConfusion {
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfusionCounts {
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub detections: u64,
    pub images: u64,
}

impl ConfusionCounts {
    pub fn single(image: &ImageConfusion, detections: u64) -> Self {
        Self {
            true_positives: image.true_positives,
            false_positives: image.false_positives,
            false_negatives: image.false_negatives,
            detections,
            images: 1,
        }
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
        self.detections += other.detections;
        self.images += other.images;
        self
    }

    /// Mean predicted instances per image, 0 for an empty dataset.
    pub fn detections_per_image(&self) -> f64 {
        if self.images == 0 {
            0.0
        } else {
            self.detections as f64 / self.images as f64
        }
    }

    pub fn write_metrics(&self, metrics: &mut MetricSet) {
        metrics.insert("tp50", self.true_positives as f64);
        metrics.insert("fp50", self.false_positives as f64);
        metrics.insert("fn50", self.false_negatives as f64);
        metrics.insert("ppf", self.detections_per_image());
    }
}

// Matches above threshold are clamped to the ground truth count rather than
// assigned one-to-one, so overlapping predictions on one instance still count.
pub fn classify_image(image: &ImageOverlaps, threshold: f64) -> ImageConfusion {
    let true_positives = if image.ious.is_empty() {
        0
    } else {
        let matches = image.ious.iter().filter(|iou| **iou > threshold).count() as u64;
        matches.min(image.gt_count)
    };

    ImageConfusion {
        true_positives,
        false_positives: image.dt_count.saturating_sub(true_positives),
        false_negatives: image.gt_count.saturating_sub(true_positives),
    }
}

pub fn classify(images: &[ImageOverlaps], threshold: f64) -> ConfusionCounts {
    images
        .iter()
        .map(|image| ConfusionCounts::single(&classify_image(image, threshold), image.dt_count))
        .fold(ConfusionCounts::default(), ConfusionCounts::merge)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(id: i64, gt: u64, dt: u64, ious: &[f64]) -> ImageOverlaps {
        ImageOverlaps {
            image_id: ImageId::Number(id),
            gt_count: gt,
            dt_count: dt,
            ious: ious.to_vec(),
        }
    }

    #[test]
    fn empty_iou_counts_all_ground_truth_as_missed() {
        let result = classify_image(&image(1, 3, 2, &[]), DEFAULT_IOU_THRESHOLD);
        assert_eq!(
            result,
            ImageConfusion {
                true_positives: 0,
                false_positives: 2,
                false_negatives: 3,
            }
        );
    }

    #[test]
    fn excess_matches_are_clamped_to_ground_truth() {
        let ious = [0.9, 0.8, 0.7, 0.6, 0.55, 0.1];
        let result = classify_image(&image(1, 3, 6, &ious), DEFAULT_IOU_THRESHOLD);
        assert_eq!(result.true_positives, 3);
        assert_eq!(result.false_negatives, 0);
        assert_eq!(result.false_positives, 3);
    }

    #[test]
    fn threshold_is_strict() {
        let result = classify_image(&image(1, 2, 2, &[0.5, 0.51, 0.0, 0.2]), 0.5);
        assert_eq!(result.true_positives, 1);
        assert_eq!(result.false_negatives, 1);
        assert_eq!(result.false_positives, 1);
    }

    #[test]
    fn invariants_hold_across_thresholds() {
        let images = vec![
            image(1, 3, 5, &[0.9, 0.2, 0.75, 0.6, 0.4, 0.33]),
            image(2, 0, 4, &[]),
            image(3, 2, 0, &[]),
            image(4, 1, 1, &[1.0]),
            image(5, 4, 2, &[0.05, 0.95, 0.5, 0.49]),
        ];

        for step in 0..=20 {
            let threshold = step as f64 / 20.0;
            for overlaps in &images {
                let result = classify_image(overlaps, threshold);
                assert_eq!(
                    result.true_positives + result.false_negatives,
                    overlaps.gt_count,
                    "tp + fn != gt at threshold {threshold}"
                );
                assert!(result.true_positives <= overlaps.gt_count);
                assert_eq!(
                    result.false_positives,
                    overlaps.dt_count.saturating_sub(result.true_positives)
                );
            }
        }
    }

    #[test]
    fn totals_and_detections_per_image() {
        let images = vec![image(1, 2, 3, &[0.8, 0.7]), image(2, 1, 1, &[])];
        let counts = classify(&images, DEFAULT_IOU_THRESHOLD);
        assert_eq!(counts.true_positives, 2);
        assert_eq!(counts.false_positives, 2);
        assert_eq!(counts.false_negatives, 1);
        assert_eq!(counts.detections_per_image(), 2.0);

        let split = classify(&images[..1], DEFAULT_IOU_THRESHOLD)
            .merge(classify(&images[1..], DEFAULT_IOU_THRESHOLD));
        assert_eq!(split, counts);
    }

    #[test]
    fn empty_dataset_has_zero_detections_per_image() {
        let counts = classify(&[], DEFAULT_IOU_THRESHOLD);
        assert_eq!(counts.detections_per_image(), 0.0);

        let mut metrics = MetricSet::new();
        counts.write_metrics(&mut metrics);
        assert_eq!(metrics.get("tp50"), Some(0.0));
        assert_eq!(metrics.get("ppf"), Some(0.0));
    }
}
