use std::path::Path;

use regex::Regex;

use crate::error::NamingError;

pub const MASK_MARKER: &str = "_instanceIds_";
pub const IMAGE_SUFFIX: &str = ".png";

/// Structured view of a `<scene>_<sequence>_<frame>_<kind>_<kind2>.<ext>` file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub scene: String,
    pub sequence: String,
    pub frame: String,
    pub kind: String,
    pub kind2: String,
    pub ext: String,
}

impl FileInfo {
    pub fn frame_key(&self) -> (&str, &str, &str) {
        (&self.scene, &self.sequence, &self.frame)
    }
}

/// Strategy used to pair ground truth images with prediction indexes.
pub trait FileInfoParser {
    fn parse(&self, file_name: &str) -> Result<FileInfo, NamingError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnderscoreFileInfoParser;

impl FileInfoParser for UnderscoreFileInfoParser {
    fn parse(&self, file_name: &str) -> Result<FileInfo, NamingError> {
        parse_file_info(file_name)
    }
}

pub fn parse_file_info(file_name: &str) -> Result<FileInfo, NamingError> {
    let (head, last) = match file_name.rsplit_once('_') {
        Some((head, last)) => (Some(head), last),
        None => (None, file_name),
    };
    let (stem, ext) = last
        .split_once('.')
        .ok_or_else(|| NamingError::MissingExtension(file_name.to_string()))?;

    let mut tokens: Vec<&str> = head.map(|h| h.split('_').collect()).unwrap_or_default();
    tokens.push(stem);
    tokens.push(ext);

    if tokens.len() < 5 {
        return Err(NamingError::TooFewTokens {
            name: file_name.to_string(),
            found: tokens.len(),
            expected: 5,
        });
    }

    let split = tokens.len() - 5;
    let rest = &tokens[split..];
    Ok(FileInfo {
        scene: tokens[..split].join("_"),
        sequence: rest[0].to_string(),
        frame: rest[1].to_string(),
        kind: rest[2].to_string(),
        kind2: rest[3].to_string(),
        ext: rest[4].to_string(),
    })
}

/// All underscore tokens of `file_name` except the trailing two.
pub fn scene_name(file_name: &str) -> Result<String, NamingError> {
    let tokens: Vec<&str> = file_name.split('_').collect();
    if tokens.len() < 3 {
        return Err(NamingError::TooFewTokens {
            name: file_name.to_string(),
            found: tokens.len(),
            expected: 3,
        });
    }
    Ok(tokens[..tokens.len() - 2].join("_"))
}

/// Replaces the trailing category token, `a_b_3_1.png` becomes `a_b_3_<label>.png`.
pub fn remap_mask_name(mask_name: &str, label_class: u32) -> Result<String, NamingError> {
    let (head, _) = mask_name
        .rsplit_once('_')
        .ok_or_else(|| NamingError::TooFewTokens {
            name: mask_name.to_string(),
            found: 1,
            expected: 2,
        })?;
    Ok(format!("{head}_{label_class}{IMAGE_SUFFIX}"))
}

/// Derives the detection image id an expected index file stands for.
pub fn expected_image_id(index_path: &str) -> Result<String, NamingError> {
    let file_name = Path::new(index_path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(index_path);
    Ok(format!("{}{IMAGE_SUFFIX}", scene_name(file_name)?))
}

/// An index with no real content: empty, or one line holding a single character.
pub fn is_placeholder_index(content: &str) -> bool {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return true;
    }
    let mut lines = trimmed.lines();
    match (lines.next(), lines.next()) {
        (Some(line), None) => line.trim().chars().count() == 1,
        _ => false,
    }
}

pub struct MaskNamePattern {
    pattern: Regex,
}

impl MaskNamePattern {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(r"^.+_instanceIds_\d+_1\.png$")?,
        })
    }

    /// Names following the instance-mask convention must match it exactly, others pass.
    pub fn accepts(&self, mask_name: &str) -> bool {
        let file_name = mask_name.rsplit('/').next().unwrap_or(mask_name);
        !file_name.contains(MASK_MARKER) || self.pattern.is_match(file_name)
    }
}
