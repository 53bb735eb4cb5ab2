use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to open archive {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("entry not found in archive: {0}")]
    NotFound(String),

    #[error("failed to read archive entry {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("archive entry {path} is larger than {limit} bytes")]
    EntryTooLarge { path: String, limit: u64 },

    #[error("archive entry {0} is not valid UTF-8")]
    InvalidUtf8(String),

    #[error("corrupt archive: {0}")]
    Corrupt(#[from] zip::result::ZipError),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("directory/file mismatch: missing {missing:?}, unexpected {unexpected:?}")]
    ShapeMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("index files missing: {0:?}")]
    MissingIndexFiles(Vec<String>),

    #[error("at least one png expected for each label image, {index_file} has no predictions")]
    NoPredictions { index_file: String },

    #[error("malformed line {line_number} in {index_file}: {reason}")]
    MalformedIndexLine {
        index_file: String,
        line_number: usize,
        reason: String,
    },

    #[error("mask {mask} referenced by {index_file} does not match *_instanceIds_<N>_1.png")]
    InvalidMaskName { index_file: String, mask: String },

    #[error("masks referenced but not present in archive: {0:?}")]
    DanglingMaskReferences(Vec<String>),

    #[error("{total} png files were not referenced in txt files (first 100): {sample:?}")]
    UnreferencedMasks { total: usize, sample: Vec<String> },

    #[error("failed to parse {file}: {reason}")]
    MalformedDetections { file: String, reason: String },

    #[error(
        "image ids do not match expected files: {missing_total} missing {missing:?}, \
         {unexpected_total} unexpected {unexpected:?}"
    )]
    ImageIdMismatch {
        missing_total: usize,
        missing: Vec<String>,
        unexpected_total: usize,
        unexpected: Vec<String>,
    },

    #[error("expected files manifest: {0}")]
    Manifest(#[from] NamingError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

#[derive(Debug, Error)]
pub enum NamingError {
    #[error("file name {name} has {found} underscore tokens, expected at least {expected}")]
    TooFewTokens {
        name: String,
        found: usize,
        expected: usize,
    },

    #[error("file name {0} has no extension")]
    MissingExtension(String),
}

#[derive(Debug, Error)]
pub enum IndexLineError {
    #[error("expected `mask category confidence`, found {0} tokens")]
    TokenCount(usize),

    #[error("invalid category id {0:?}")]
    Category(String),

    #[error("invalid confidence {0:?}")]
    Confidence(String),
}

#[derive(Debug, Error)]
pub enum RemapError {
    #[error("no prediction found in {0}, provide at least one predicted instance")]
    NoPredictions(String),

    #[error("malformed line {line_number} in {file}: {source}")]
    MalformedLine {
        file: String,
        line_number: usize,
        #[source]
        source: IndexLineError,
    },

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("dataset {dataset} has no metric {key}")]
    MissingMetric { dataset: String, key: String },

    #[error("no datasets to aggregate")]
    Empty,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to run engine {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine {program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("engine payload is not valid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no prediction index for ground truth {0}")]
    MissingPrediction(String),

    #[error("multiple prediction indexes for ground truth {gt}: {candidates:?}")]
    AmbiguousPrediction { gt: String, candidates: Vec<String> },

    #[error(transparent)]
    Naming(#[from] NamingError),
}
