// Zip archive construction
// Runs on the blocking pool; the awaited join handle is the finalize boundary

use std::io::{Cursor, Write};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Fixed moderate Deflate level for every archive
const COMPRESSION_LEVEL: i64 = 6;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("archive build failed: {0}")]
    Build(String),

    #[error("archive task aborted before finalize")]
    Aborted,
}

/// One archive entry, named by its original source key
#[derive(Debug)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Build a zip archive containing one entry per artifact.
///
/// Entry appends and the trailing central directory are written on the
/// blocking pool; the returned bytes are complete only once this future
/// resolves.
pub async fn build(entries: Vec<ArchiveEntry>) -> Result<Vec<u8>, ArchiveError> {
    tokio::task::spawn_blocking(move || build_sync(entries))
        .await
        .map_err(|_| ArchiveError::Aborted)?
}

fn build_sync(entries: Vec<ArchiveEntry>) -> Result<Vec<u8>, ArchiveError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL));

    for entry in entries {
        writer
            .start_file(entry.name.as_str(), options)
            .map_err(|e| ArchiveError::Build(e.to_string()))?;
        writer
            .write_all(&entry.bytes)
            .map_err(|e| ArchiveError::Build(e.to_string()))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| ArchiveError::Build(e.to_string()))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn entry(name: &str, bytes: &[u8]) -> ArchiveEntry {
        ArchiveEntry {
            name: name.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[tokio::test]
    async fn entries_round_trip_byte_identical() {
        let bytes = build(vec![
            entry("reports/january.csv", b"a,b,c\n1,2,3\n"),
            entry("logo.png", &[0x89, 0x50, 0x4e, 0x47]),
        ])
        .await
        .unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut first = Vec::new();
        archive
            .by_name("reports/january.csv")
            .unwrap()
            .read_to_end(&mut first)
            .unwrap();
        assert_eq!(first, b"a,b,c\n1,2,3\n");

        let mut second = Vec::new();
        archive
            .by_name("logo.png")
            .unwrap()
            .read_to_end(&mut second)
            .unwrap();
        assert_eq!(second, vec![0x89, 0x50, 0x4e, 0x47]);
    }

    #[tokio::test]
    async fn entry_names_keep_original_keys() {
        let bytes = build(vec![entry("nested/dir/key.bin", b"x")]).await.unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(names, vec!["nested/dir/key.bin"]);
    }
}
