use std::collections::BTreeSet;
use std::io::{Read, Seek};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::archive::ArchiveInspector;
use crate::cli::Task;
use crate::error::ValidationError;
use crate::model::{DetectionRecord, PredictionEntry, SubmissionDescription};
use crate::naming::{MaskNamePattern, expected_image_id, is_placeholder_index};

pub const DATASETS: [&str; 3] = ["fishyscapes", "roadanomaly", "roadobstacle"];
pub const DESCRIPTION_FILE: &str = "description.txt";
const REPORT_LIMIT: usize = 100;

/// Index file names a complete segmentation submission must contain.
#[derive(Debug, Clone, Default)]
pub struct ExpectedFiles {
    pub index_files: BTreeSet<String>,
}

impl ExpectedFiles {
    pub fn parse(content: &str) -> Self {
        Self {
            index_files: content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(ToOwned::to_owned)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationSummary {
    pub description: Option<SubmissionDescription>,
    pub index_files: usize,
    pub mask_files: usize,
    pub referenced_masks: usize,
    pub categories: BTreeSet<u32>,
    pub unexpected_index_files: Vec<String>,
    pub ignored_files: Vec<String>,
    pub image_ids: usize,
}

pub struct SubmissionValidator {
    mask_pattern: MaskNamePattern,
}

impl SubmissionValidator {
    pub fn new() -> Result<Self> {
        Ok(Self {
            mask_pattern: MaskNamePattern::new().context("failed to compile mask name regex")?,
        })
    }

    pub fn validate<R: Read + Seek>(
        &self,
        archive: &mut ArchiveInspector<R>,
        expected: &ExpectedFiles,
        task: Task,
    ) -> Result<ValidationSummary, ValidationError> {
        let mut summary = ValidationSummary::default();

        info!(task = task.as_str(), "checking directory structure");
        summary.ignored_files = check_shape(archive, task)?;

        info!("checking description file");
        summary.description = probe_description(archive);

        match task {
            Task::Segmentation => {
                info!("checking all txt and png files present");
                self.check_segmentation_references(archive, expected, &mut summary)?;
            }
            Task::Detection => {
                info!("checking detection image ids");
                check_detection_references(archive, expected, &mut summary)?;
            }
        }

        Ok(summary)
    }

    fn check_segmentation_references<R: Read + Seek>(
        &self,
        archive: &mut ArchiveInspector<R>,
        expected: &ExpectedFiles,
        summary: &mut ValidationSummary,
    ) -> Result<(), ValidationError> {
        let mut index_files = archive.files_with_extension("txt");
        index_files.remove(DESCRIPTION_FILE);
        let mask_files = archive.files_with_extension("png");

        let missing: Vec<String> = expected
            .index_files
            .difference(&index_files)
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingIndexFiles(missing));
        }

        let unexpected: Vec<String> = index_files
            .difference(&expected.index_files)
            .cloned()
            .collect();
        if !unexpected.is_empty() {
            warn!(count = unexpected.len(), files = ?unexpected, "unexpected index files");
        }

        let mut referenced = BTreeSet::new();
        for index_file in &index_files {
            let content = archive.read_to_string(index_file)?;
            if is_placeholder_index(&content) {
                return Err(ValidationError::NoPredictions {
                    index_file: index_file.clone(),
                });
            }

            let folder = index_file
                .rsplit_once('/')
                .map(|(folder, _)| folder)
                .unwrap_or("");

            for (line_index, line) in content.trim().lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let entry = PredictionEntry::parse(line).map_err(|err| {
                    ValidationError::MalformedIndexLine {
                        index_file: index_file.clone(),
                        line_number: line_index + 1,
                        reason: err.to_string(),
                    }
                })?;

                if !self.mask_pattern.accepts(&entry.mask) {
                    return Err(ValidationError::InvalidMaskName {
                        index_file: index_file.clone(),
                        mask: entry.mask,
                    });
                }

                summary.categories.insert(entry.category_id);
                referenced.insert(join_archive_path(folder, &entry.mask));
            }
        }

        let unreferenced: Vec<&String> = mask_files.difference(&referenced).collect();
        if !unreferenced.is_empty() {
            return Err(ValidationError::UnreferencedMasks {
                total: unreferenced.len(),
                sample: unreferenced
                    .into_iter()
                    .take(REPORT_LIMIT)
                    .cloned()
                    .collect(),
            });
        }

        let dangling: Vec<String> = referenced
            .difference(&mask_files)
            .take(REPORT_LIMIT)
            .cloned()
            .collect();
        if !dangling.is_empty() {
            return Err(ValidationError::DanglingMaskReferences(dangling));
        }

        summary.index_files = index_files.len();
        summary.mask_files = mask_files.len();
        summary.referenced_masks = referenced.len();
        summary.unexpected_index_files = unexpected;
        Ok(())
    }
}

fn check_shape<R: Read + Seek>(
    archive: &ArchiveInspector<R>,
    task: Task,
) -> Result<Vec<String>, ValidationError> {
    let (found, expected): (BTreeSet<String>, BTreeSet<String>) = match task {
        Task::Segmentation => (
            archive.top_level_directories(),
            DATASETS.iter().map(|name| name.to_string()).collect(),
        ),
        Task::Detection => (archive.file_paths(), detection_files().into_iter().collect()),
    };

    let missing: Vec<String> = expected.difference(&found).cloned().collect();
    let extra: Vec<String> = found.difference(&expected).cloned().collect();

    match task {
        Task::Segmentation if !missing.is_empty() || !extra.is_empty() => {
            Err(ValidationError::ShapeMismatch {
                missing,
                unexpected: extra,
            })
        }
        Task::Detection if !missing.is_empty() => Err(ValidationError::ShapeMismatch {
            missing,
            unexpected: Vec::new(),
        }),
        Task::Detection => {
            if !extra.is_empty() {
                info!(files = ?extra, "ignoring additional files");
            }
            Ok(extra)
        }
        Task::Segmentation => Ok(Vec::new()),
    }
}

fn probe_description<R: Read + Seek>(
    archive: &mut ArchiveInspector<R>,
) -> Option<SubmissionDescription> {
    if !archive.contains(DESCRIPTION_FILE) {
        info!("description.txt is not present");
        return None;
    }

    let content = match archive.read_to_string(DESCRIPTION_FILE) {
        Ok(content) => content,
        Err(err) => {
            warn!(error = %err, "description.txt could not be read");
            return Some(SubmissionDescription::default());
        }
    };

    let description = parse_description(&content);
    for line in &description.malformed_lines {
        warn!(line = %line, "malformed description line");
    }
    info!(
        name = %description.name,
        paper_link = %description.paper_link,
        code_link = %description.code_link,
        "submission description"
    );
    Some(description)
}

pub fn parse_description(content: &str) -> SubmissionDescription {
    let mut description = SubmissionDescription::default();

    for line in content.trim().lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            description.malformed_lines.push(line.to_string());
            continue;
        };

        let value = value.trim().to_string();
        match key.trim() {
            "name" => description.name = value,
            "paper_link" => description.paper_link = value,
            "code_link" => description.code_link = value,
            _ => {}
        }
    }

    description
}

fn check_detection_references<R: Read + Seek>(
    archive: &mut ArchiveInspector<R>,
    expected: &ExpectedFiles,
    summary: &mut ValidationSummary,
) -> Result<(), ValidationError> {
    let mut found = BTreeSet::new();
    for file in detection_files() {
        let bytes = archive.read(&file)?;
        let records: Vec<DetectionRecord> =
            serde_json::from_slice(&bytes).map_err(|err| ValidationError::MalformedDetections {
                file: file.clone(),
                reason: err.to_string(),
            })?;
        found.extend(records.into_iter().map(|record| record.image_id.to_string()));
    }

    let expected_ids = expected
        .index_files
        .iter()
        .map(|name| expected_image_id(name))
        .collect::<Result<BTreeSet<String>, _>>()?;

    let missing: Vec<&String> = expected_ids.difference(&found).collect();
    let unexpected: Vec<&String> = found.difference(&expected_ids).collect();
    if !missing.is_empty() || !unexpected.is_empty() {
        return Err(ValidationError::ImageIdMismatch {
            missing_total: missing.len(),
            missing: missing.into_iter().take(REPORT_LIMIT).cloned().collect(),
            unexpected_total: unexpected.len(),
            unexpected: unexpected.into_iter().take(REPORT_LIMIT).cloned().collect(),
        });
    }

    summary.image_ids = found.len();
    Ok(())
}

pub fn detection_files() -> Vec<String> {
    DATASETS.iter().map(|name| format!("{name}.json")).collect()
}

fn join_archive_path(folder: &str, name: &str) -> String {
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    }
}
