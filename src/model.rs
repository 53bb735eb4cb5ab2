use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IndexLineError;

/// One predicted instance from a segmentation index file.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionEntry {
    pub mask: String,
    pub category_id: u32,
    pub confidence: String,
}

impl PredictionEntry {
    pub fn parse(line: &str) -> Result<Self, IndexLineError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let [mask, category, confidence] = tokens.as_slice() else {
            return Err(IndexLineError::TokenCount(tokens.len()));
        };

        let category_id = category
            .parse::<u32>()
            .map_err(|_| IndexLineError::Category((*category).to_string()))?;
        confidence
            .parse::<f64>()
            .map_err(|_| IndexLineError::Confidence((*confidence).to_string()))?;

        Ok(Self {
            mask: (*mask).to_string(),
            category_id,
            confidence: (*confidence).to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageId {
    Number(i64),
    Name(String),
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Name(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub image_id: ImageId,
    pub category_id: u32,
    pub bbox: [f64; 4],
    pub score: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CocoImage {
    pub id: ImageId,
}

/// The part of a COCO label file the scorer reads itself; the rest goes to the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct CocoGroundTruth {
    pub images: Vec<CocoImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubmissionDescription {
    pub name: String,
    pub paper_link: String,
    pub code_link: String,
    pub malformed_lines: Vec<String>,
}

/// Ordered metric name to value mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricSet {
    entries: Vec<(String, f64)>,
}

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `key`, keeping its original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        let key = key.into();
        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| *value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for MetricSet {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        let mut set = Self::new();
        for (key, value) in iter {
            set.insert(key, value);
        }
        set
    }
}
