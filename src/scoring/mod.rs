pub mod aggregate;
pub mod confusion;
pub mod detection;
pub mod remap;
pub mod report;
pub mod segmentation;

use self::aggregate::DatasetWeights;
use self::confusion::DEFAULT_IOU_THRESHOLD;
use self::remap::DEFAULT_LABEL_CLASS;

pub const SCORER_VERSION: &str = "v0.0.1";

/// Settings for one scoring run; built once from the command line and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub threshold: f64,
    pub label_class: u32,
    pub datasets: Vec<String>,
    pub weights: DatasetWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_IOU_THRESHOLD,
            label_class: DEFAULT_LABEL_CLASS,
            datasets: vec!["fishyscapes".to_string()],
            weights: DatasetWeights::new().with("fishyscapes", 1.0),
        }
    }
}
