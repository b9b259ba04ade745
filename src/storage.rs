// Copyright 2026 Omnio Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! File-system abstraction: directory/file handles over the
//! `buckets/<bucket>/entities/<EntityId>/` layout, with atomic writable
//! streams realized as write-to-`.crswap`-then-rename.

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::error::OmnioError;
use crate::error::Result;
use crate::types::EntityId;

/// Directory handle rooted at `buckets/<bucket>/entities/`.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn open_entity(&self, id: EntityId, create: bool) -> Result<Box<dyn EntityHandle>>;

    /// Removes `buckets/<bucket>/entities/<id>` recursively. Missing
    /// directories are not an error; entity cleanup is best-effort.
    async fn remove_entity(&self, id: EntityId) -> Result<()>;

    async fn entity_exists(&self, id: EntityId) -> Result<bool>;
}

#[async_trait]
pub trait EntityHandle: Send + Sync {
    async fn open_part(&self, part: u32, create: bool) -> Result<Box<dyn FileHandle>>;

    /// Number of finalized (non-`.crswap`) part files currently present.
    async fn count_parts(&self) -> Result<u32>;
}

#[async_trait]
pub trait FileHandle: Send + Sync {
    async fn read_all(&self) -> Result<Vec<u8>>;

    async fn len(&self) -> Result<u64>;

    /// Opens a writable stream. When `keep_existing_data` is set the
    /// underlying `.crswap` is seeded from the current file contents
    /// (used by append mode to pre-copy an under-filled final part).
    async fn create_writable(&self, keep_existing_data: bool) -> Result<WritableStream>;
}

/// A single part's write-in-progress file. Writes land in
/// `<n>.crswap`; `close` renames it to the final `<n>`, making the
/// write atomic from any outside observer's perspective. `abort`
/// deletes the temp file instead.
pub struct WritableStream {
    temp_path: PathBuf,
    final_path: PathBuf,
    file: Option<fs::File>,
}

impl WritableStream {
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or(OmnioError::SqlStatementClosed)?;
        file.write_all(data).await?;
        Ok(())
    }

    pub async fn close(mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        fs::rename(&self.temp_path, &self.final_path).await?;
        Ok(())
    }

    pub async fn abort(mut self) -> Result<()> {
        self.file.take();
        match fs::remove_file(&self.temp_path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// `Storage` backed by the real file system.
pub struct NativeStorage {
    entities_root: PathBuf,
}

impl NativeStorage {
    pub async fn open(entities_root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&entities_root).await?;
        Ok(Self { entities_root })
    }

    fn entity_path(&self, id: EntityId) -> PathBuf {
        self.entities_root.join(id.to_string())
    }
}

#[async_trait]
impl Storage for NativeStorage {
    async fn open_entity(&self, id: EntityId, create: bool) -> Result<Box<dyn EntityHandle>> {
        let path = self.entity_path(id);
        if create {
            fs::create_dir_all(&path).await?;
        } else if fs::metadata(&path).await.is_err() {
            return Err(OmnioError::EntryPathNotFound {
                path: path.display().to_string(),
            });
        }
        Ok(Box::new(NativeEntityHandle { path }))
    }

    async fn remove_entity(&self, id: EntityId) -> Result<()> {
        let path = self.entity_path(id);
        match fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                warn!(entity = %id, error = %err, "failed to remove entity directory");
                Err(err.into())
            }
        }
    }

    async fn entity_exists(&self, id: EntityId) -> Result<bool> {
        Ok(fs::metadata(self.entity_path(id)).await.is_ok())
    }
}

struct NativeEntityHandle {
    path: PathBuf,
}

#[async_trait]
impl EntityHandle for NativeEntityHandle {
    async fn open_part(&self, part: u32, create: bool) -> Result<Box<dyn FileHandle>> {
        let path = self.path.join(part.to_string());
        if !create && fs::metadata(&path).await.is_err() {
            return Err(OmnioError::EntryPathNotFound {
                path: path.display().to_string(),
            });
        }
        Ok(Box::new(NativeFileHandle { path }))
    }

    async fn count_parts(&self) -> Result<u32> {
        let mut count = 0u32;
        let mut entries = fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.ends_with(".crswap") && name.parse::<u32>().is_ok() {
                count += 1;
            }
        }
        Ok(count)
    }
}

struct NativeFileHandle {
    path: PathBuf,
}

impl NativeFileHandle {
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push_str(".crswap");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl FileHandle for NativeFileHandle {
    async fn read_all(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.path).await?)
    }

    async fn len(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path).await?.len())
    }

    async fn create_writable(&self, keep_existing_data: bool) -> Result<WritableStream> {
        let temp_path = self.temp_path();
        if keep_existing_data {
            match fs::copy(&self.path, &temp_path).await {
                Ok(_) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    fs::File::create(&temp_path).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&temp_path)
            .await?;
        Ok(WritableStream {
            temp_path,
            final_path: self.path.clone(),
            file: Some(file),
        })
    }
}

/// A crash-detection sweep: any leftover `.crswap` files in an entity
/// directory mean a prior write never completed. Safe to delete.
pub async fn sweep_crash_leftovers(dir: &Path) -> Result<usize> {
    let mut removed = 0usize;
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let mut entries = match fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("crswap") {
                if fs::remove_file(&path).await.is_ok() {
                    removed += 1;
                }
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_then_close_is_visible_as_final_name() {
        let dir = tempdir().unwrap();
        let storage = NativeStorage::open(dir.path().to_path_buf()).await.unwrap();
        let id = EntityId::new();
        let entity = storage.open_entity(id, true).await.unwrap();
        let part = entity.open_part(1, true).await.unwrap();
        let mut w = part.create_writable(false).await.unwrap();
        w.write(b"hello").await.unwrap();
        w.close().await.unwrap();

        let part = entity.open_part(1, false).await.unwrap();
        assert_eq!(part.read_all().await.unwrap(), b"hello");
        assert_eq!(entity.count_parts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn abort_leaves_no_crswap_and_no_final_file() {
        let dir = tempdir().unwrap();
        let storage = NativeStorage::open(dir.path().to_path_buf()).await.unwrap();
        let id = EntityId::new();
        let entity = storage.open_entity(id, true).await.unwrap();
        let part = entity.open_part(1, true).await.unwrap();
        let mut w = part.create_writable(false).await.unwrap();
        w.write(b"partial").await.unwrap();
        w.abort().await.unwrap();

        assert_eq!(entity.count_parts().await.unwrap(), 0);
        let removed = sweep_crash_leftovers(dir.path()).await.unwrap();
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn remove_entity_is_idempotent() {
        let dir = tempdir().unwrap();
        let storage = NativeStorage::open(dir.path().to_path_buf()).await.unwrap();
        let id = EntityId::new();
        storage.remove_entity(id).await.unwrap();
        storage.remove_entity(id).await.unwrap();
    }
}
