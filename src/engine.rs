//! Seams to the external metric engines.
//!
//! The engines compute AP/AR themselves. This module only prepares their
//! inputs, hands over an immutable configuration and reads back results.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::EngineError;
use crate::naming::FileInfoParser;
use crate::scoring::confusion::ImageOverlaps;

pub const GT_INSTANCES_FILE: &str = "gtinstances.json";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceEvalConfig {
    pub prediction_path: PathBuf,
    pub gt_instances_file: PathBuf,
    pub min_region_sizes: [f64; 3],
    pub json_output: bool,
    pub colorized: bool,
    pub quiet: bool,
}

impl InstanceEvalConfig {
    pub fn new(prediction_path: &Path, labels_path: &Path) -> Self {
        Self {
            prediction_path: prediction_path.to_path_buf(),
            gt_instances_file: labels_path.join(GT_INSTANCES_FILE),
            min_region_sizes: [10.0, 10.0, 10.0],
            json_output: false,
            colorized: false,
            quiet: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredictionPair {
    pub ground_truth: PathBuf,
    pub prediction: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct InstanceAverages {
    pub all_ap: f64,
    pub all_ap50: f64,
}

pub trait InstanceEvaluator {
    fn evaluate(
        &self,
        config: &InstanceEvalConfig,
        pairs: &[PredictionPair],
    ) -> Result<InstanceAverages, EngineError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxEvalConfig {
    pub iou_type: String,
    pub category_id: u32,
}

impl Default for BoxEvalConfig {
    fn default() -> Self {
        Self {
            iou_type: "bbox".to_string(),
            category_id: 1,
        }
    }
}

/// COCO summary statistics in engine order plus the per-image IoU cache.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoxEvaluation {
    pub stats: [f64; 12],
    #[serde(default)]
    pub images: Vec<ImageOverlaps>,
}

pub trait BoxEvaluator {
    fn evaluate(
        &self,
        config: &BoxEvalConfig,
        ground_truth: &Path,
        predictions: &Path,
    ) -> Result<BoxEvaluation, EngineError>;
}

#[derive(Serialize)]
struct InstanceRequest<'a> {
    config: &'a InstanceEvalConfig,
    pairs: &'a [PredictionPair],
}

#[derive(Serialize)]
struct BoxRequest<'a> {
    config: &'a BoxEvalConfig,
    ground_truth: &'a Path,
    predictions: &'a Path,
}

/// Runs `<program> <args..> <mode> <request.json>` and reads a JSON response from stdout.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
    request_dir: PathBuf,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>, request_dir: &Path) -> Self {
        Self {
            program: program.into(),
            args,
            request_dir: request_dir.to_path_buf(),
        }
    }

    fn invoke<T: Serialize>(&self, mode: &str, request: &T) -> Result<Vec<u8>, EngineError> {
        fs::create_dir_all(&self.request_dir).map_err(|source| EngineError::Io {
            path: self.request_dir.clone(),
            source,
        })?;
        let request_path = self.request_dir.join(format!("{mode}_request.json"));
        let payload = serde_json::to_vec_pretty(request)?;
        fs::write(&request_path, payload).map_err(|source| EngineError::Io {
            path: request_path.clone(),
            source,
        })?;

        info!(program = %self.program, mode, "running metric engine");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(mode)
            .arg(&request_path)
            .output()
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!(stderr = %stderr.trim(), "metric engine diagnostics");
        }
        Ok(output.stdout)
    }
}

impl InstanceEvaluator for CommandEngine {
    fn evaluate(
        &self,
        config: &InstanceEvalConfig,
        pairs: &[PredictionPair],
    ) -> Result<InstanceAverages, EngineError> {
        let stdout = self.invoke("instance", &InstanceRequest { config, pairs })?;
        Ok(serde_json::from_slice(&stdout)?)
    }
}

impl BoxEvaluator for CommandEngine {
    fn evaluate(
        &self,
        config: &BoxEvalConfig,
        ground_truth: &Path,
        predictions: &Path,
    ) -> Result<BoxEvaluation, EngineError> {
        let request = BoxRequest {
            config,
            ground_truth,
            predictions,
        };
        let stdout = self.invoke("bbox", &request)?;
        Ok(serde_json::from_slice(&stdout)?)
    }
}

/// Matches every ground truth image to exactly one prediction index by scene, sequence and frame.
pub fn pair_predictions(
    ground_truth: &[PathBuf],
    prediction_dir: &Path,
    parser: &dyn FileInfoParser,
) -> Result<Vec<PredictionPair>, EngineError> {
    let entries = fs::read_dir(prediction_dir).map_err(|source| EngineError::Io {
        path: prediction_dir.to_path_buf(),
        source,
    })?;

    let mut by_frame: HashMap<(String, String, String), Vec<PathBuf>> = HashMap::new();
    for entry in entries {
        let entry = entry.map_err(|source| EngineError::Io {
            path: prediction_dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !name.ends_with(".txt") {
            continue;
        }
        let info = parser.parse(name)?;
        let (scene, sequence, frame) = info.frame_key();
        by_frame
            .entry((scene.to_string(), sequence.to_string(), frame.to_string()))
            .or_default()
            .push(path);
    }

    let mut pairs = Vec::with_capacity(ground_truth.len());
    for gt in ground_truth {
        let name = gt
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let info = parser.parse(name)?;
        let (scene, sequence, frame) = info.frame_key();
        let key = (scene.to_string(), sequence.to_string(), frame.to_string());

        match by_frame.get(&key).map(Vec::as_slice) {
            None | Some([]) => return Err(EngineError::MissingPrediction(name.to_string())),
            Some([prediction]) => pairs.push(PredictionPair {
                ground_truth: gt.clone(),
                prediction: prediction.clone(),
            }),
            Some(candidates) => {
                let mut candidates: Vec<String> = candidates
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect();
                candidates.sort();
                return Err(EngineError::AmbiguousPrediction {
                    gt: name.to_string(),
                    candidates,
                });
            }
        }
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::UnderscoreFileInfoParser;

    #[test]
    fn pairs_ground_truth_with_matching_prediction() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        for name in [
            "fs_000001_000010_pred_x.txt",
            "fs_000001_000011_pred_x.txt",
            "fs_000001_000010_instanceIds_26.png",
        ] {
            fs::write(dir.path().join(name), "").expect("fixture should be written");
        }

        let gt = vec![PathBuf::from("/labels/fs_000001_000010_gtFine_instanceIds.png")];
        let pairs =
            pair_predictions(&gt, dir.path(), &UnderscoreFileInfoParser).expect("pairs");
        assert_eq!(pairs.len(), 1);
        assert_eq!(
            pairs[0].prediction,
            dir.path().join("fs_000001_000010_pred_x.txt")
        );
    }

    #[test]
    fn missing_prediction_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let gt = vec![PathBuf::from("fs_000002_000001_gtFine_instanceIds.png")];
        let err = pair_predictions(&gt, dir.path(), &UnderscoreFileInfoParser)
            .expect_err("missing prediction should fail");
        assert!(matches!(err, EngineError::MissingPrediction(_)));
    }

    struct PrefixParser;

    impl FileInfoParser for PrefixParser {
        fn parse(&self, file_name: &str) -> Result<crate::naming::FileInfo, crate::error::NamingError> {
            let scene = file_name.split('-').next().unwrap_or_default().to_string();
            Ok(crate::naming::FileInfo {
                scene,
                sequence: String::new(),
                frame: String::new(),
                kind: String::new(),
                kind2: String::new(),
                ext: String::new(),
            })
        }
    }

    #[test]
    fn injected_parser_controls_pairing() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        fs::write(dir.path().join("alpha-a.txt"), "").expect("fixture");
        fs::write(dir.path().join("alpha-b.txt"), "").expect("fixture");

        let gt = vec![PathBuf::from("alpha-gt.png")];
        let err = pair_predictions(&gt, dir.path(), &PrefixParser)
            .expect_err("two candidates should be ambiguous");
        match err {
            EngineError::AmbiguousPrediction { candidates, .. } => assert_eq!(candidates.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn box_evaluation_deserializes_engine_response() {
        let raw = r#"{
            "stats": [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0, 0.0, -1.0],
            "images": [{"image_id": 3, "gt_count": 2, "dt_count": 1, "ious": [0.7, 0.1]}]
        }"#;
        let evaluation: BoxEvaluation = serde_json::from_str(raw).expect("response should parse");
        assert_eq!(evaluation.stats[8], 0.9);
        assert_eq!(evaluation.images[0].gt_count, 2);
    }

    #[test]
    fn instance_config_uses_fixed_defaults() {
        let config = InstanceEvalConfig::new(Path::new("/scratch"), Path::new("/labels"));
        assert_eq!(config.gt_instances_file, PathBuf::from("/labels/gtinstances.json"));
        assert_eq!(config.min_region_sizes, [10.0; 3]);
        assert!(config.quiet && !config.colorized && !config.json_output);
    }

    #[cfg(unix)]
    #[test]
    fn command_engine_reports_non_zero_exit() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let engine = CommandEngine::new("false", Vec::new(), dir.path());
        let config = BoxEvalConfig::default();
        let err = BoxEvaluator::evaluate(&engine, &config, Path::new("gt.json"), Path::new("dt.json"))
            .expect_err("failing engine should error");
        assert!(matches!(err, EngineError::Failed { .. }), "unexpected error: {err}");
    }
}
