use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "anomaly-scoring",
    version,
    about = "Submission validation and scoring for the anomaly segmentation and detection benchmark"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a submission zip before uploading it.
    Verify(VerifyArgs),
    /// Score an instance segmentation submission.
    Evaluate(EvaluateArgs),
    /// Score a bounding box detection submission.
    EvaluateDetection(EvaluateDetectionArgs),
    /// Print a previously written score report.
    Show(ShowArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Task {
    Segmentation,
    Detection,
}

impl Task {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Segmentation => "segmentation",
            Self::Detection => "detection",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Zip file that should be validated.
    pub zipfile: PathBuf,

    #[arg(long, value_enum, default_value_t = Task::Segmentation)]
    pub task: Task,

    /// List of expected txt files for a prediction.
    #[arg(long, alias = "expected_files", default_value = "assets/expected_files.txt")]
    pub expected_files: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Metric engine executable, called as `<engine> [engine-args] <mode> <request.json>`.
    #[arg(long)]
    pub engine: String,

    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    pub engine_args: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    pub submit_path: PathBuf,

    pub labels_path: PathBuf,

    pub output_path: PathBuf,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Score the named dataset directory below the submission instead of its root.
    #[arg(long)]
    pub dataset: Option<String>,

    #[arg(long, default_value_t = 26)]
    pub label_class: u32,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateDetectionArgs {
    pub submit_path: PathBuf,

    pub labels_path: PathBuf,

    pub output_path: PathBuf,

    #[command(flatten)]
    pub engine: EngineArgs,

    #[arg(long = "dataset", default_value = "fishyscapes")]
    pub datasets: Vec<String>,

    /// Per-dataset coefficient as `name=weight`; unlisted datasets weigh 1.
    #[arg(long = "dataset-weight", value_parser = parse_dataset_weight)]
    pub dataset_weights: Vec<(String, f64)>,

    #[arg(long, default_value_t = 0.5)]
    pub threshold: f64,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    pub report_path: PathBuf,
}

fn parse_dataset_weight(raw: &str) -> Result<(String, f64), String> {
    let (name, weight) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=weight, got {raw}"))?;
    let weight = weight
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("invalid weight for {name}: {err}"))?;
    Ok((name.trim().to_string(), weight))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_defaults_match_submission_kit() {
        let cli = Cli::try_parse_from(["anomaly-scoring", "verify", "submission.zip"])
            .expect("verify args should parse");
        let Commands::Verify(args) = cli.command else {
            panic!("expected verify command");
        };
        assert_eq!(args.task, Task::Segmentation);
        assert_eq!(args.expected_files, PathBuf::from("assets/expected_files.txt"));
    }

    #[test]
    fn detection_args_collect_weights() {
        let cli = Cli::try_parse_from([
            "anomaly-scoring",
            "evaluate-detection",
            "submit",
            "labels",
            "out",
            "--engine",
            "coco-engine",
            "--dataset-weight",
            "fishyscapes=0.5",
        ])
        .expect("detection args should parse");
        let Commands::EvaluateDetection(args) = cli.command else {
            panic!("expected evaluate-detection command");
        };
        assert_eq!(args.datasets, vec!["fishyscapes".to_string()]);
        assert_eq!(args.dataset_weights, vec![("fishyscapes".to_string(), 0.5)]);
        assert_eq!(args.threshold, 0.5);
    }

    #[test]
    fn dataset_weight_rejects_missing_separator() {
        assert!(parse_dataset_weight("fishyscapes").is_err());
        assert!(parse_dataset_weight("fishyscapes=abc").is_err());
    }
}
