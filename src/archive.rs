use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::ArchiveError;

/// Largest single entry read into memory. Submission index and detection files are far smaller.
pub const MAX_ENTRY_BYTES: u64 = 512 * 1024 * 1024;

// Headers carry sizes chosen by the uploader, so they only hint the first allocation.
const INITIAL_READ_CAPACITY: u64 = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub is_dir: bool,
}

impl ArchiveEntry {
    pub fn top_level(&self) -> &str {
        self.path.split('/').next().unwrap_or(&self.path)
    }

    pub fn extension(&self) -> Option<&str> {
        let file_name = self.path.rsplit('/').next()?;
        file_name.rsplit_once('.').map(|(_, ext)| ext)
    }
}

/// Read-only view over a zip submission. Nothing is extracted to disk.
pub struct ArchiveInspector<R> {
    archive: ZipArchive<R>,
    entries: Vec<ArchiveEntry>,
}

impl ArchiveInspector<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path).map_err(|source| ArchiveError::Open {
            path: path.to_path_buf(),
            source: ZipError::Io(source),
        })?;
        Self::new(BufReader::new(file)).map_err(|err| match err {
            ArchiveError::Corrupt(source) => ArchiveError::Open {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }
}

impl<R: Read + Seek> ArchiveInspector<R> {
    pub fn new(reader: R) -> Result<Self, ArchiveError> {
        let mut archive = ZipArchive::new(reader)?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive.by_index_raw(index)?;
            entries.push(ArchiveEntry {
                path: file.name().to_string(),
                is_dir: file.is_dir(),
            });
        }

        Ok(Self { archive, entries })
    }

    pub fn list_entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| !entry.is_dir && entry.path == path)
    }

    /// Explicit directory entries plus the first component of every nested file path.
    pub fn top_level_directories(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .filter(|entry| entry.is_dir || entry.path.contains('/'))
            .map(|entry| entry.top_level().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }

    pub fn file_paths(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .filter(|entry| !entry.is_dir)
            .map(|entry| entry.path.clone())
            .collect()
    }

    pub fn files_with_extension(&self, extension: &str) -> BTreeSet<String> {
        self.entries
            .iter()
            .filter(|entry| !entry.is_dir && entry.extension() == Some(extension))
            .map(|entry| entry.path.clone())
            .collect()
    }

    pub fn read(&mut self, path: &str) -> Result<Vec<u8>, ArchiveError> {
        self.read_limited(path, MAX_ENTRY_BYTES)
    }

    fn read_limited(&mut self, path: &str, limit: u64) -> Result<Vec<u8>, ArchiveError> {
        let file = match self.archive.by_name(path) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Err(ArchiveError::NotFound(path.to_string())),
            Err(err) => return Err(ArchiveError::Corrupt(err)),
        };

        let capacity = file.size().min(limit).min(INITIAL_READ_CAPACITY) as usize;
        let mut buffer = Vec::with_capacity(capacity);
        let read = file
            .take(limit.saturating_add(1))
            .read_to_end(&mut buffer)
            .map_err(|source| ArchiveError::Read {
                path: path.to_string(),
                source,
            })?;
        if read as u64 > limit {
            return Err(ArchiveError::EntryTooLarge {
                path: path.to_string(),
                limit,
            });
        }
        Ok(buffer)
    }

    pub fn read_to_string(&mut self, path: &str) -> Result<String, ArchiveError> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|_| ArchiveError::InvalidUtf8(path.to_string()))
    }
}


#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::test_support::{self, build_archive};
    use super::*;

    #[test]
    fn lists_entries_and_classifies_directories() {
        let archive = build_archive(&[
            ("fishyscapes/", ""),
            ("fishyscapes/a_pred.txt", "m.png 1 0.5"),
            ("roadanomaly/b_instanceIds_0_1.png", "png"),
            ("description.txt", "name: x"),
        ]);

        let dirs: Vec<String> = archive.top_level_directories().into_iter().collect();
        assert_eq!(dirs, vec!["fishyscapes", "roadanomaly"]);
        assert_eq!(archive.list_entries().len(), 4);
        assert!(archive.list_entries()[0].is_dir);
        assert_eq!(
            archive.files_with_extension("png").into_iter().collect::<Vec<_>>(),
            vec!["roadanomaly/b_instanceIds_0_1.png"]
        );
        assert!(archive.contains("description.txt"));
        assert!(!archive.contains("fishyscapes/"));
    }

    #[test]
    fn read_returns_bytes_or_not_found() {
        let mut archive = build_archive(&[("fishyscapes.json", "[]")]);
        assert_eq!(archive.read("fishyscapes.json").expect("entry exists"), b"[]");

        let err = archive
            .read("roadanomaly.json")
            .expect_err("missing entry should fail");
        assert!(
            matches!(err, ArchiveError::NotFound(ref path) if path == "roadanomaly.json"),
            "unexpected error: {err}"
        );
    }

    /// Rewrites the uncompressed size in every local and central header.
    fn claim_uncompressed_size(bytes: &mut [u8], size: u32) {
        let headers = [(*b"PK\x03\x04", 22), (*b"PK\x01\x02", 24)];
        for (signature, offset) in headers {
            let starts: Vec<usize> = bytes
                .windows(4)
                .enumerate()
                .filter(|(_, window)| *window == signature)
                .map(|(start, _)| start)
                .collect();
            assert!(!starts.is_empty(), "header {signature:?} should be present");
            for start in starts {
                bytes[start + offset..start + offset + 4].copy_from_slice(&size.to_le_bytes());
            }
        }
    }

    #[test]
    fn oversized_header_claim_does_not_drive_allocation() {
        let mut bytes = test_support::archive_bytes(&[("fishyscapes.json", "[]")]);
        claim_uncompressed_size(&mut bytes, 0xFFFF_FFF0);

        let mut archive =
            ArchiveInspector::new(Cursor::new(bytes)).expect("tampered archive should open");
        match archive.read("fishyscapes.json") {
            Ok(content) => assert_eq!(content, b"[]"),
            Err(err) => assert!(
                matches!(err, ArchiveError::Read { .. } | ArchiveError::Corrupt(_)),
                "unexpected error: {err}"
            ),
        }
    }

    #[test]
    fn entries_above_the_limit_are_rejected() {
        let mut archive = build_archive(&[("fishyscapes.json", "[1, 2, 3, 4]")]);

        let err = archive
            .read_limited("fishyscapes.json", 4)
            .expect_err("entry above the limit should fail");
        assert!(
            matches!(err, ArchiveError::EntryTooLarge { ref path, limit: 4 } if path == "fishyscapes.json"),
            "unexpected error: {err}"
        );
        assert_eq!(
            archive.read_limited("fishyscapes.json", 12).expect("entry fits"),
            b"[1, 2, 3, 4]"
        );
    }

    #[test]
    fn open_reports_missing_file() {
        let err = ArchiveInspector::open(Path::new("/nonexistent/submission.zip"))
            .err()
            .expect("opening a missing archive should fail");
        assert!(matches!(err, ArchiveError::Open { .. }));
    }
}
