//! Atomic file persistence and compressed binary encoding

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::Result;

/// A fully written temporary file waiting to replace its target.
///
/// Dropping a staged file without committing removes the temporary file and
/// leaves the target untouched.
#[derive(Debug)]
pub struct StagedFile {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    /// Path that [`StagedFile::commit`] will replace
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Atomically rename the staged file over its target
    pub fn commit(self) -> Result<()> {
        self.temp
            .persist(&self.target)
            .map_err(|e| e.error)?;
        tracing::debug!(path = %self.target.display(), "Committed staged file");
        Ok(())
    }
}

/// Write `bytes` to a temporary file next to `path` and flush it to disk
pub fn stage(path: &Path, bytes: &[u8]) -> Result<StagedFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut temp = NamedTempFile::new_in(&dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;

    Ok(StagedFile {
        temp,
        target: path.to_path_buf(),
    })
}

/// Replace `path` with `bytes` atomically
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    stage(path, bytes)?.commit()
}

/// Serialize with bincode and gzip the result
pub fn encode_compressed<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let data = bincode::serialize(value)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&data)?;
    Ok(encoder.finish()?)
}

/// Inverse of [`encode_compressed`]
pub fn decode_compressed<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut decoder = GzDecoder::new(bytes);
    let mut data = Vec::new();
    decoder.read_to_end(&mut data)?;
    Ok(bincode::deserialize(&data)?)
}
