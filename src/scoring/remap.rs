use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::RemapError;
use crate::model::PredictionEntry;
use crate::naming::{IMAGE_SUFFIX, is_placeholder_index, remap_mask_name, scene_name};
use crate::validator::DESCRIPTION_FILE;

/// Category every submitted instance is scored as ("car" in the label vocabulary).
pub const DEFAULT_LABEL_CLASS: u32 = 26;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapSummary {
    pub index_files: usize,
    pub masks_copied: usize,
    pub predictions: usize,
}

pub fn remap(
    submission_dir: &Path,
    scratch_dir: &Path,
    label_class: u32,
) -> Result<RemapSummary, RemapError> {
    fs::create_dir_all(scratch_dir).map_err(|source| io_error(scratch_dir, source))?;

    let file_names = list_file_names(submission_dir)?;
    let index_files: Vec<&String> = file_names
        .iter()
        .filter(|name| name.ends_with(".txt") && name.as_str() != DESCRIPTION_FILE)
        .collect();

    let mut summary = RemapSummary::default();
    for index_name in index_files {
        let scene = scene_name(index_name)?;

        for mask_name in file_names
            .iter()
            .filter(|name| name.starts_with(&scene) && name.ends_with(IMAGE_SUFFIX))
        {
            let source = submission_dir.join(mask_name);
            let target = scratch_dir.join(remap_mask_name(mask_name, label_class)?);
            if same_file(&source, &target) {
                continue;
            }
            fs::copy(&source, &target).map_err(|err| io_error(&source, err))?;
            summary.masks_copied += 1;
        }

        let index_path = submission_dir.join(index_name);
        let content =
            fs::read_to_string(&index_path).map_err(|source| io_error(&index_path, source))?;
        if is_placeholder_index(&content) {
            return Err(RemapError::NoPredictions(index_name.clone()));
        }

        let rewritten = rewrite_index(index_name, &content, label_class)?;
        summary.predictions += rewritten.lines().count();

        let target = scratch_dir.join(index_name);
        fs::write(&target, rewritten).map_err(|source| io_error(&target, source))?;
        summary.index_files += 1;
        debug!(index = %index_name, scene = %scene, "remapped index file");
    }

    info!(
        index_files = summary.index_files,
        masks = summary.masks_copied,
        predictions = summary.predictions,
        scratch = %scratch_dir.display(),
        "remapped submission"
    );
    Ok(summary)
}

fn rewrite_index(file: &str, content: &str, label_class: u32) -> Result<String, RemapError> {
    let mut rewritten = String::with_capacity(content.len());
    for (line_index, line) in content.trim().lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry = PredictionEntry::parse(line).map_err(|source| RemapError::MalformedLine {
            file: file.to_string(),
            line_number: line_index + 1,
            source,
        })?;
        let mask = remap_mask_name(&entry.mask, label_class)?;
        rewritten.push_str(&format!("{mask} {label_class} {}\n", entry.confidence));
    }
    Ok(rewritten)
}

fn list_file_names(dir: &Path) -> Result<Vec<String>, RemapError> {
    let entries = fs::read_dir(dir).map_err(|source| io_error(dir, source))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| io_error(dir, source))?;
        let is_file = entry
            .file_type()
            .map_err(|source| io_error(&entry.path(), source))?
            .is_file();
        if !is_file {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }

    names.sort();
    Ok(names)
}

fn same_file(left: &Path, right: &Path) -> bool {
    match (left.canonicalize(), right.canonicalize()) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

fn io_error(path: &Path, source: std::io::Error) -> RemapError {
    RemapError::Io {
        path: PathBuf::from(path),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).expect("fixture should be written");
    }

    fn submission() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        write(
            dir.path(),
            "fs_0001_000000_pred.txt",
            "fs_0001_instanceIds_0_1.png 3 0.91\nfs_0001_instanceIds_1_1.png 7 0.25\n",
        );
        write(dir.path(), "fs_0001_instanceIds_0_1.png", "mask-0");
        write(dir.path(), "fs_0001_instanceIds_1_1.png", "mask-1");
        write(
            dir.path(),
            "fs_0002_000000_pred.txt",
            "fs_0002_instanceIds_0_1.png 1 0.5\n",
        );
        write(dir.path(), "fs_0002_instanceIds_0_1.png", "mask-2");
        dir
    }

    #[test]
    fn remap_renames_masks_and_rewrites_index() {
        let submission = submission();
        let scratch = tempfile::tempdir().expect("scratch should be created");

        let summary = remap(submission.path(), scratch.path(), DEFAULT_LABEL_CLASS)
            .expect("remap should succeed");
        assert_eq!(
            summary,
            RemapSummary {
                index_files: 2,
                masks_copied: 3,
                predictions: 3,
            }
        );

        let index = fs::read_to_string(scratch.path().join("fs_0001_000000_pred.txt"))
            .expect("rewritten index should exist");
        assert_eq!(
            index,
            "fs_0001_instanceIds_0_26.png 26 0.91\nfs_0001_instanceIds_1_26.png 26 0.25\n"
        );
        let mask = fs::read_to_string(scratch.path().join("fs_0001_instanceIds_1_26.png"))
            .expect("renamed mask should exist");
        assert_eq!(mask, "mask-1");

        assert!(
            submission.path().join("fs_0001_instanceIds_0_1.png").exists(),
            "submission must not be modified"
        );
    }

    #[test]
    fn remap_is_idempotent_on_scratch_directory() {
        let submission = submission();
        let scratch = tempfile::tempdir().expect("scratch should be created");
        remap(submission.path(), scratch.path(), DEFAULT_LABEL_CLASS).expect("first remap");

        let before = list_file_names(scratch.path()).expect("scratch listing");
        let index_before = fs::read_to_string(scratch.path().join("fs_0001_000000_pred.txt"))
            .expect("index should exist");

        remap(scratch.path(), scratch.path(), DEFAULT_LABEL_CLASS).expect("second remap");

        let after = list_file_names(scratch.path()).expect("scratch listing");
        let index_after = fs::read_to_string(scratch.path().join("fs_0001_000000_pred.txt"))
            .expect("index should exist");
        assert_eq!(before, after);
        assert_eq!(index_before, index_after);
        let mask = fs::read_to_string(scratch.path().join("fs_0001_instanceIds_0_26.png"))
            .expect("mask should survive");
        assert_eq!(mask, "mask-0");
    }

    #[test]
    fn description_file_is_not_an_index() {
        let submission = submission();
        write(
            submission.path(),
            DESCRIPTION_FILE,
            "name: team\npaper_link: none\ncode_link: none\n",
        );
        let scratch = tempfile::tempdir().expect("scratch should be created");

        let summary = remap(submission.path(), scratch.path(), DEFAULT_LABEL_CLASS)
            .expect("description file should be skipped");
        assert_eq!(summary.index_files, 2);
        assert!(!scratch.path().join(DESCRIPTION_FILE).exists());
    }

    #[test]
    fn placeholder_index_raises_no_predictions() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        write(dir.path(), "fs_0003_000000_pred.txt", "x\n");
        let scratch = tempfile::tempdir().expect("scratch should be created");

        let err = remap(dir.path(), scratch.path(), DEFAULT_LABEL_CLASS)
            .expect_err("placeholder should fail");
        assert!(
            matches!(err, RemapError::NoPredictions(ref name) if name == "fs_0003_000000_pred.txt"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn short_index_name_is_a_naming_error() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        write(dir.path(), "pred.txt", "a_1.png 1 0.5\n");
        let scratch = tempfile::tempdir().expect("scratch should be created");

        let err = remap(dir.path(), scratch.path(), DEFAULT_LABEL_CLASS)
            .expect_err("short name should fail");
        assert!(matches!(err, RemapError::Naming(_)));
    }
}
