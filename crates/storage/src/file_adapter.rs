// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reference file-based [`PersistenceAdapter`]: one zstd-compressed JSON
//! file per conversation id under a base directory, written with the same
//! tmp-write + fsync + atomic-rename + directory-fsync sequence the
//! teacher's checkpoint writer uses for crash-safe snapshots.

use crate::error::PersistenceError;
use crate::persistence::{ConversationData, PersistenceAdapter};
use async_trait::async_trait;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// zstd level 3: a reasonable default balance of speed and ratio.
const COMPRESSION_LEVEL: i32 = 3;

/// Trait abstracting the adapter's filesystem calls, so tests can inject
/// failures without touching a real disk.
pub trait FileOps: Send + Sync + 'static {
    fn write_all(&self, path: &Path, data: &[u8]) -> Result<(), PersistenceError>;
    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, PersistenceError>;
    fn rename(&self, from: &Path, to: &Path) -> Result<(), PersistenceError>;
    fn remove(&self, path: &Path) -> Result<(), PersistenceError>;
    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, PersistenceError>;
    fn fsync_dir(&self, path: &Path) -> Result<(), PersistenceError>;
}

/// Production filesystem operations.
#[derive(Clone, Copy, Debug, Default)]
pub struct RealFileOps;

impl FileOps for RealFileOps {
    fn write_all(&self, path: &Path, data: &[u8]) -> Result<(), PersistenceError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, PersistenceError> {
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read(path)?))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), PersistenceError> {
        std::fs::rename(from, to)?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<(), PersistenceError> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, PersistenceError> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            paths.push(entry?.path());
        }
        Ok(paths)
    }

    fn fsync_dir(&self, path: &Path) -> Result<(), PersistenceError> {
        if let Ok(dir) = File::open(path) {
            let _ = dir.sync_all();
        }
        Ok(())
    }
}

/// File-based `PersistenceAdapter`: one `<conversation_id>.jsonz` per
/// conversation under `base_dir`.
pub struct FileSystemAdapter<F: FileOps = RealFileOps> {
    base_dir: PathBuf,
    ops: F,
    compression_level: i32,
}

impl FileSystemAdapter<RealFileOps> {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self::with_ops(base_dir, RealFileOps)
    }
}

impl<F: FileOps> FileSystemAdapter<F> {
    pub fn with_ops(base_dir: impl Into<PathBuf>, ops: F) -> Self {
        Self {
            base_dir: base_dir.into(),
            ops,
            compression_level: COMPRESSION_LEVEL,
        }
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    fn path_for(&self, conversation_id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.jsonz", sanitize(conversation_id)))
    }
}

/// Conversation ids come from the host application, not untrusted input,
/// but a stray `/` shouldn't escape `base_dir`.
fn sanitize(conversation_id: &str) -> String {
    conversation_id
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

#[async_trait]
impl<F: FileOps> PersistenceAdapter for FileSystemAdapter<F> {
    async fn init(&self) -> Result<(), PersistenceError> {
        std::fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }

    async fn save_conversation(&self, conversation_id: &str, data: &ConversationData) -> Result<(), PersistenceError> {
        let final_path = self.path_for(conversation_id);
        let tmp_path = final_path.with_extension("jsonz.tmp");

        let json_bytes = serde_json::to_vec(data)?;
        let compressed =
            zstd::encode_all(json_bytes.as_slice(), self.compression_level).map_err(|e| PersistenceError::Compress(e.to_string()))?;

        self.ops.write_all(&tmp_path, &compressed)?;
        self.ops.rename(&tmp_path, &final_path)?;
        self.ops.fsync_dir(&self.base_dir)?;
        Ok(())
    }

    async fn load_conversation(&self, conversation_id: &str) -> Result<Option<ConversationData>, PersistenceError> {
        let path = self.path_for(conversation_id);
        let Some(compressed) = self.ops.read(&path)? else {
            return Ok(None);
        };
        let decoder = zstd::stream::read::Decoder::new(compressed.as_slice()).map_err(|e| PersistenceError::Compress(e.to_string()))?;
        match serde_json::from_reader(decoder) {
            Ok(data) => Ok(Some(data)),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "corrupt conversation file");
                Err(PersistenceError::Serialize(e))
            }
        }
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), PersistenceError> {
        self.ops.remove(&self.path_for(conversation_id))
    }

    async fn list_conversations(&self) -> Result<Vec<String>, PersistenceError> {
        let entries = self.ops.list(&self.base_dir)?;
        Ok(entries
            .into_iter()
            .filter_map(|p| {
                let name = p.file_name()?.to_str()?.to_string();
                name.strip_suffix(".jsonz").map(|s| s.to_string())
            })
            .collect())
    }
}

#[cfg(test)]
#[path = "file_adapter_tests.rs"]
mod tests;
