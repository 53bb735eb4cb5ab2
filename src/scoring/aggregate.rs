use std::collections::BTreeMap;

use crate::error::AggregateError;
use crate::model::MetricSet;

pub const DETECTION_METRIC_KEYS: [&str; 12] = [
    "ap", "ap50", "ap75", "aps", "apm", "apl", "ar1", "ar10", "ar100", "ars", "arm", "arl",
];
pub const CONFUSION_METRIC_KEYS: [&str; 4] = ["tp50", "fp50", "fn50", "ppf"];
pub const UNIFIED: &str = "unified";

/// Linear coefficient per dataset; datasets without an entry weigh 1.0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetWeights {
    weights: BTreeMap<String, f64>,
}

impl DatasetWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, dataset: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(dataset.into(), weight);
        self
    }

    pub fn weight(&self, dataset: &str) -> f64 {
        self.weights.get(dataset).copied().unwrap_or(1.0)
    }
}

impl FromIterator<(String, f64)> for DatasetWeights {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self {
            weights: iter.into_iter().collect(),
        }
    }
}

pub fn aggregate(
    per_dataset: &BTreeMap<String, MetricSet>,
    weights: &DatasetWeights,
    keys: &[&str],
) -> Result<MetricSet, AggregateError> {
    if per_dataset.is_empty() {
        return Err(AggregateError::Empty);
    }

    let mut unified = MetricSet::new();
    for key in keys {
        let mut total = 0.0;
        for (dataset, metrics) in per_dataset {
            let value = metrics
                .get(key)
                .ok_or_else(|| AggregateError::MissingMetric {
                    dataset: dataset.clone(),
                    key: (*key).to_string(),
                })?;
            total += value * weights.weight(dataset);
        }
        unified.insert(*key, total);
    }

    Ok(unified)
}

pub fn segmentation_report(unified: &MetricSet) -> Result<MetricSet, AggregateError> {
    narrow(unified, &[("AP", "ap"), ("AP50", "ap50")])
}

pub fn detection_report(unified: &MetricSet) -> Result<MetricSet, AggregateError> {
    narrow(
        unified,
        &[
            ("AP", "ap"),
            ("AP50", "ap50"),
            ("AR1", "ar1"),
            ("AR10", "ar10"),
            ("AR100", "ar100"),
        ],
    )
}

fn narrow(unified: &MetricSet, mapping: &[(&str, &str)]) -> Result<MetricSet, AggregateError> {
    mapping
        .iter()
        .map(|(report_key, metric_key)| {
            unified
                .get(metric_key)
                .map(|value| (*report_key, value * 100.0))
                .ok_or_else(|| AggregateError::MissingMetric {
                    dataset: UNIFIED.to_string(),
                    key: (*metric_key).to_string(),
                })
        })
        .collect()
}
