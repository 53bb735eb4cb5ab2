use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::model::MetricSet;
use crate::util::ensure_directory;

pub const REPORT_FILE_NAME: &str = "scores.txt";

pub fn render_report(metrics: &MetricSet) -> String {
    metrics
        .iter()
        .map(|(key, value)| format!("{key}: {value:?}\n"))
        .collect()
}

pub fn write_report(path: &Path, metrics: &MetricSet) -> Result<()> {
    if metrics.is_empty() {
        bail!("refusing to write an empty score report to {}", path.display());
    }
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    fs::write(path, render_report(metrics))
        .with_context(|| format!("failed to write score report: {}", path.display()))
}

pub fn parse_report(content: &str) -> Result<MetricSet> {
    let mut metrics = MetricSet::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            bail!("line {} is not `KEY: value`: {line}", index + 1);
        };
        let value = value
            .trim()
            .parse::<f64>()
            .with_context(|| format!("invalid value on line {}: {line}", index + 1))?;
        metrics.insert(key.trim(), value);
    }
    Ok(metrics)
}

pub fn read_report(path: &Path) -> Result<MetricSet> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read score report: {}", path.display()))?;
    parse_report(&content).with_context(|| format!("failed to parse {}", path.display()))
}
