use std::fs;

use anyhow::{Context, Result};
use tracing::info;

use crate::archive::ArchiveInspector;
use crate::cli::VerifyArgs;
use crate::util::sha256_path;
use crate::validator::{ExpectedFiles, SubmissionValidator};

pub fn run(args: VerifyArgs) -> Result<()> {
    info!(
        zipfile = %args.zipfile.display(),
        task = args.task.as_str(),
        "validating zip archive"
    );

    let raw = fs::read_to_string(&args.expected_files)
        .with_context(|| format!("failed to read {}", args.expected_files.display()))?;
    let expected = ExpectedFiles::parse(&raw);
    info!(
        path = %args.expected_files.display(),
        count = expected.index_files.len(),
        "loaded expected files"
    );

    info!(sha256 = %sha256_path(&args.zipfile)?, "submission digest");

    let mut archive = ArchiveInspector::open(&args.zipfile)
        .with_context(|| format!("failed to open {}", args.zipfile.display()))?;
    info!(entries = archive.list_entries().len(), "opened archive");
    let validator = SubmissionValidator::new()?;
    let summary = validator
        .validate(&mut archive, &expected, args.task)
        .context("submission failed validation")?;

    info!(
        index_files = summary.index_files,
        mask_files = summary.mask_files,
        referenced_masks = summary.referenced_masks,
        categories = ?summary.categories,
        has_description = summary.description.is_some(),
        unexpected_index_files = summary.unexpected_index_files.len(),
        ignored_files = summary.ignored_files.len(),
        image_ids = summary.image_ids,
        "validation passed"
    );
    println!("Everything ready for submission!");

    Ok(())
}
