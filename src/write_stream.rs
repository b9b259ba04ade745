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

//! `ObjectFileWriteStream`: the part-splitting writer behind
//! `Omnio::create_write_stream`. Open and Closed are modelled the
//! Rust way rather than as a runtime-checked enum: `write` takes
//! `&mut self` and can be retried or followed by `abort`; `close` and
//! `abort` each consume `self`, so a second call simply does not
//! typecheck and the held path lock is released by `WriteGuard`'s
//! `Drop` when the stream (or its error path) goes out of scope.

use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;
use tracing::error;

use crate::catalog::CreateInput;
use crate::catalog::Metadata;
use crate::catalog::ObjectDetail;
use crate::catalog::UpdateExclusiveInput;
use crate::error::OmnioError;
use crate::error::Result;
use crate::hash::HashState;
use crate::hash::Md5Hasher;
use crate::lock::WriteGuard;
use crate::storage::EntityHandle;
use crate::storage::Storage;
use crate::storage::WritableStream;
use crate::types::Checksum;
use crate::types::EntityId;
use crate::types::ObjectId;
use crate::types::ObjectPath;
use crate::types::WriteFlag;
use crate::types::num_parts_for;
use crate::types::validate_object_size;

/// Target metadata carried alongside the byte stream, set once at
/// construction and written out at `close()`.
#[derive(Debug, Clone)]
pub struct WriteParams {
    pub path: ObjectPath,
    pub flag: WriteFlag,
    pub part_size: u64,
    pub mime_type: Option<String>,
    pub object_tags: Vec<String>,
    pub description: Option<String>,
    pub user_metadata: Option<Value>,
    pub timestamp: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub object_id: ObjectId,
    pub entity_id: EntityId,
    pub size: u64,
    pub checksum: Checksum,
    pub num_parts: u32,
}

/// Open state of a part-splitting write. Holds the fresh entity the
/// bytes land in, the path's write lock, and (for append) the
/// snapshot of the object being appended to.
pub struct ObjectFileWriteStream<'a> {
    storage: Arc<dyn Storage>,
    metadata: Arc<Metadata>,
    path: ObjectPath,
    flag: WriteFlag,
    entity_id: EntityId,
    entity: Box<dyn EntityHandle>,
    prior: Option<ObjectDetail>,
    part_size: u64,
    current_part: u32,
    current_part_bytes: u64,
    total_bytes: u64,
    hasher: Md5Hasher,
    current_writable: Option<WritableStream>,
    mime_type: Option<String>,
    object_tags: Vec<String>,
    description: Option<String>,
    user_metadata: Option<Value>,
    timestamp: Option<OffsetDateTime>,
    _lock: WriteGuard<'a>,
}

impl<'a> ObjectFileWriteStream<'a> {
    /// Opens the stream: allocates a fresh entity, and for append mode
    /// re-materialises the prior entity's content into it (full parts
    /// copied verbatim, the under-filled final part pre-copied so
    /// subsequent `write` calls continue it). Entities are never
    /// shared between catalog rows, so append always produces a
    /// brand-new, self-contained entity directory.
    pub async fn open(
        storage: Arc<dyn Storage>,
        metadata: Arc<Metadata>,
        params: WriteParams,
        lock: WriteGuard<'a>,
    ) -> Result<Self> {
        let prior = match metadata.read_detail(params.path.clone()).await {
            Ok(detail) => Some(detail),
            Err(OmnioError::ObjectNotFound { .. }) => None,
            Err(err) => return Err(err),
        };

        let entity_id = EntityId::new();
        let entity = storage.open_entity(entity_id, true).await?;

        let (hasher, current_part, current_part_bytes, total_bytes, part_size, current_writable) =
            if params.flag.is_append() {
                match &prior {
                    Some(detail) => {
                        let seeded = seed_append(storage.as_ref(), detail, entity.as_ref()).await?;
                        (
                            Md5Hasher::from_state(detail.hash_state.clone()),
                            seeded.0,
                            seeded.1,
                            detail.size,
                            detail.part_size,
                            seeded.2,
                        )
                    }
                    None => (Md5Hasher::new(), 1, 0, 0, params.part_size, None),
                }
            } else {
                (Md5Hasher::new(), 1, 0, 0, params.part_size, None)
            };

        Ok(Self {
            storage,
            metadata,
            path: params.path,
            flag: params.flag,
            entity_id,
            entity,
            prior,
            part_size,
            current_part,
            current_part_bytes,
            total_bytes,
            hasher,
            current_writable,
            mime_type: params.mime_type,
            object_tags: params.object_tags,
            description: params.description,
            user_metadata: params.user_metadata,
            timestamp: params.timestamp,
            _lock: lock,
        })
    }

    /// Splits `data` across parts of `part_size` bytes, finalizing
    /// (`.crswap` -> `<n>`) each part as it fills. Leaves the stream
    /// open on error so the caller can retry or `abort`.
    pub async fn write(&mut self, mut data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if self.part_size == 0 {
            return Err(OmnioError::InvalidInput {
                field: "partSize".into(),
                reason: "cannot write bytes to a stream with partSize=0".into(),
            });
        }

        while !data.is_empty() {
            if self.current_writable.is_none() {
                let part = self.entity.open_part(self.current_part, true).await?;
                self.current_writable = Some(part.create_writable(false).await?);
            }

            let remaining = self.part_size - self.current_part_bytes;
            let take = (data.len() as u64).min(remaining) as usize;
            let (head, tail) = data.split_at(take);

            self.current_writable
                .as_mut()
                .expect("writable opened above")
                .write(head)
                .await?;
            self.hasher.update(head);
            self.current_part_bytes += head.len() as u64;
            self.total_bytes += head.len() as u64;
            data = tail;

            if self.current_part_bytes == self.part_size {
                let writable = self.current_writable.take().expect("writable opened above");
                writable.close().await?;
                self.current_part += 1;
                self.current_part_bytes = 0;
            }
        }
        Ok(())
    }

    /// Finalizes any in-flight part, commits the catalog row per the
    /// open flag, and releases the superseded entity (if any) on
    /// success or the freshly written one on failure.
    pub async fn close(mut self) -> Result<WriteOutcome> {
        if let Some(writable) = self.current_writable.take() {
            writable.close().await?;
        }

        let checksum = self.hasher.digest();
        let hash_state = self.hasher.export_state();
        let size = self.total_bytes;
        let num_parts = num_parts_for(size, self.part_size.max(1));
        validate_object_size(size, num_parts, self.part_size)?;

        let result = self.commit(size, num_parts, &checksum, &hash_state).await;

        match result {
            Ok(object_id) => {
                if let Some(prior) = &self.prior
                    && let Err(err) = self.storage.remove_entity(prior.entity_id).await
                {
                    error!(
                        entity = %prior.entity_id,
                        error = %err,
                        "failed to remove superseded entity after write commit",
                    );
                }
                Ok(WriteOutcome {
                    object_id,
                    entity_id: self.entity_id,
                    size,
                    checksum,
                    num_parts,
                })
            }
            Err(err) => {
                if let Err(cleanup_err) = self.storage.remove_entity(self.entity_id).await {
                    error!(
                        entity = %self.entity_id,
                        error = %cleanup_err,
                        "failed to remove entity after catalog commit failure",
                    );
                }
                Err(err)
            }
        }
    }

    async fn commit(
        &self,
        size: u64,
        num_parts: u32,
        checksum: &Checksum,
        hash_state: &HashState,
    ) -> Result<ObjectId> {
        let create_input = || CreateInput {
            path: self.path.clone(),
            entity_id: self.entity_id,
            size,
            num_parts,
            part_size: self.part_size,
            checksum: Some(checksum.clone()),
            hash_state: Some(hash_state.clone()),
            mime_type: self.mime_type.clone(),
            object_tags: self.object_tags.clone(),
            description: self.description.clone(),
            user_metadata: self.user_metadata.clone(),
            timestamp: self.timestamp,
        };

        match self.flag {
            WriteFlag::Create => self.metadata.create(create_input()).await,
            WriteFlag::CreateExclusive | WriteFlag::AppendExclusive => {
                self.metadata.create_exclusive(create_input()).await
            }
            WriteFlag::Append => match &self.prior {
                Some(prior) => {
                    self.metadata
                        .update_exclusive(UpdateExclusiveInput {
                            path: self.path.clone(),
                            expect_checksum: prior.checksum.clone(),
                            checksum: checksum.clone(),
                            hash_state: hash_state.clone(),
                            entity_id: Some(self.entity_id),
                            mime_type: self.mime_type.clone(),
                            num_parts,
                            part_size: self.part_size,
                            object_size: size,
                            object_tags: if self.object_tags.is_empty() {
                                None
                            } else {
                                Some(self.object_tags.clone())
                            },
                            description: self.description.clone(),
                            user_metadata: self.user_metadata.clone(),
                            timestamp: self.timestamp,
                        })
                        .await?;
                    Ok(self.metadata.read(self.path.clone()).await?.object_id)
                }
                None => self.metadata.create(create_input()).await,
            },
        }
    }

    /// Deletes the new entity directory (best-effort) and drops the
    /// lock, leaving any prior object at this path untouched.
    pub async fn abort(self) -> Result<()> {
        if let Some(writable) = self.current_writable {
            let _ = writable.abort().await;
        }
        if let Err(err) = self.storage.remove_entity(self.entity_id).await {
            error!(entity = %self.entity_id, error = %err, "failed to remove entity during abort");
        }
        Ok(())
    }
}

/// Copies every full prior part verbatim into the new entity, then
/// pre-copies the prior final part (if under-filled) so the caller
/// can keep appending to it. Returns `(next_part, part_fill_bytes,
/// open_writable_for_that_part)`.
async fn seed_append(
    storage: &dyn Storage,
    detail: &ObjectDetail,
    new_entity: &dyn EntityHandle,
) -> Result<(u32, u64, Option<WritableStream>)> {
    if detail.num_parts == 0 {
        return Ok((1, 0, None));
    }

    let prior_entity = storage.open_entity(detail.entity_id, false).await?;
    let fill = if detail.part_size == 0 {
        0
    } else {
        detail.size % detail.part_size
    };
    let full_parts = if fill == 0 {
        detail.num_parts
    } else {
        detail.num_parts - 1
    };

    for part in 1..=full_parts {
        let bytes = prior_entity.open_part(part, false).await?.read_all().await?;
        let dst = new_entity.open_part(part, true).await?;
        let mut writable = dst.create_writable(false).await?;
        writable.write(&bytes).await?;
        writable.close().await?;
    }

    if fill == 0 {
        Ok((full_parts + 1, 0, None))
    } else {
        let part = detail.num_parts;
        let bytes = prior_entity.open_part(part, false).await?.read_all().await?;
        let dst = new_entity.open_part(part, true).await?;
        let mut writable = dst.create_writable(false).await?;
        writable.write(&bytes).await?;
        Ok((part, fill, Some(writable)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteGateway;
    use crate::lock::LockManager;
    use crate::storage::NativeStorage;
    use tokio_util::sync::CancellationToken;

    async fn harness() -> (
        Arc<dyn Storage>,
        Arc<Metadata>,
        LockManager,
        crate::db::GatewayHandle,
        tempfile::TempDir,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let handle = SqliteGateway::open(dir.path().join("catalog.db")).unwrap();
        let metadata = Metadata::open(handle.gateway.clone()).await.unwrap();
        let storage = NativeStorage::open(dir.path().join("entities")).await.unwrap();
        (
            Arc::new(storage),
            Arc::new(metadata),
            LockManager::new(),
            handle,
            dir,
        )
    }

    fn params(path: &str, flag: WriteFlag, part_size: u64) -> WriteParams {
        WriteParams {
            path: ObjectPath::parse(path).unwrap(),
            flag,
            part_size,
            mime_type: Some("text/plain".to_string()),
            object_tags: Vec::new(),
            description: None,
            user_metadata: None,
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn create_then_read_round_trips() {
        let (storage, metadata, locks, _handle, _dir) = harness().await;
        let cancel = CancellationToken::new();
        let guard = locks.lock("file.txt", &cancel).await.unwrap();

        let mut stream = ObjectFileWriteStream::open(
            storage.clone(),
            metadata.clone(),
            params("file.txt", WriteFlag::Create, 1024),
            guard,
        )
        .await
        .unwrap();
        stream.write(b"foo").await.unwrap();
        let outcome = stream.close().await.unwrap();

        assert_eq!(outcome.size, 3);
        assert_eq!(outcome.num_parts, 1);
        assert_eq!(outcome.checksum.as_str(), "acbd18db4cc2f85cedef654fccc4a4d8");

        let summary = metadata.read(ObjectPath::parse("file.txt").unwrap()).await.unwrap();
        assert_eq!(summary.checksum.unwrap().as_str(), "acbd18db4cc2f85cedef654fccc4a4d8");
        assert_eq!(summary.size, 3);
    }

    #[tokio::test]
    async fn append_across_parts_splits_correctly() {
        let (storage, metadata, locks, _handle, _dir) = harness().await;
        let cancel = CancellationToken::new();

        let guard = locks.lock("f", &cancel).await.unwrap();
        let mut stream = ObjectFileWriteStream::open(
            storage.clone(),
            metadata.clone(),
            params("f", WriteFlag::Create, 7),
            guard,
        )
        .await
        .unwrap();
        stream.write(b"foo").await.unwrap();
        stream.close().await.unwrap();

        let guard = locks.lock("f", &cancel).await.unwrap();
        let mut stream = ObjectFileWriteStream::open(
            storage.clone(),
            metadata.clone(),
            params("f", WriteFlag::Append, 7),
            guard,
        )
        .await
        .unwrap();
        stream.write(b"bar").await.unwrap();
        stream.write(b"baz").await.unwrap();
        let outcome = stream.close().await.unwrap();

        assert_eq!(outcome.size, 9);
        assert_eq!(outcome.num_parts, 2);
        assert_eq!(outcome.checksum.as_str(), md5_of(b"foobarbaz"));

        let entity = storage.open_entity(outcome.entity_id, false).await.unwrap();
        let part1 = entity.open_part(1, false).await.unwrap().read_all().await.unwrap();
        let part2 = entity.open_part(2, false).await.unwrap().read_all().await.unwrap();
        assert_eq!(part1, b"foobarb");
        assert_eq!(part2, b"az");
    }

    #[tokio::test]
    async fn append_resume_matches_one_shot_checksum() {
        let (storage, metadata, locks, _handle, _dir) = harness().await;
        let cancel = CancellationToken::new();

        let guard = locks.lock("one", &cancel).await.unwrap();
        let mut one_shot = ObjectFileWriteStream::open(
            storage.clone(),
            metadata.clone(),
            params("one", WriteFlag::Create, 1024),
            guard,
        )
        .await
        .unwrap();
        one_shot.write(b"foobarbaz").await.unwrap();
        let one_shot_outcome = one_shot.close().await.unwrap();

        let guard = locks.lock("two", &cancel).await.unwrap();
        let mut first = ObjectFileWriteStream::open(
            storage.clone(),
            metadata.clone(),
            params("two", WriteFlag::Create, 1024),
            guard,
        )
        .await
        .unwrap();
        first.write(b"foo").await.unwrap();
        first.close().await.unwrap();

        let guard = locks.lock("two", &cancel).await.unwrap();
        let mut second = ObjectFileWriteStream::open(
            storage.clone(),
            metadata.clone(),
            params("two", WriteFlag::Append, 1024),
            guard,
        )
        .await
        .unwrap();
        second.write(b"barbaz").await.unwrap();
        let appended_outcome = second.close().await.unwrap();

        assert_eq!(one_shot_outcome.checksum.as_str(), appended_outcome.checksum.as_str());
    }

    #[tokio::test]
    async fn exclusive_rejection_leaves_prior_object_untouched() {
        let (storage, metadata, locks, _handle, _dir) = harness().await;
        let cancel = CancellationToken::new();

        let guard = locks.lock("file.txt", &cancel).await.unwrap();
        let mut stream = ObjectFileWriteStream::open(
            storage.clone(),
            metadata.clone(),
            params("file.txt", WriteFlag::Create, 1024),
            guard,
        )
        .await
        .unwrap();
        stream.write(b"foo").await.unwrap();
        stream.close().await.unwrap();

        let guard = locks.lock("file.txt", &cancel).await.unwrap();
        let mut stream = ObjectFileWriteStream::open(
            storage.clone(),
            metadata.clone(),
            params("file.txt", WriteFlag::CreateExclusive, 1024),
            guard,
        )
        .await
        .unwrap();
        stream.write(b"x").await.unwrap();
        let err = stream.close().await.unwrap_err();
        assert!(matches!(err, OmnioError::ObjectExists { .. }));

        let summary = metadata.read(ObjectPath::parse("file.txt").unwrap()).await.unwrap();
        assert_eq!(summary.size, 3);
    }

    #[tokio::test]
    async fn abort_removes_new_entity_and_leaves_no_catalog_row() {
        let (storage, metadata, locks, _handle, _dir) = harness().await;
        let cancel = CancellationToken::new();
        let guard = locks.lock("aborted.txt", &cancel).await.unwrap();

        let mut stream = ObjectFileWriteStream::open(
            storage.clone(),
            metadata.clone(),
            params("aborted.txt", WriteFlag::Create, 1024),
            guard,
        )
        .await
        .unwrap();
        stream.write(b"partial").await.unwrap();
        let entity_id = stream_entity_id(&stream);
        stream.abort().await.unwrap();

        assert!(!storage.entity_exists(entity_id).await.unwrap());
        assert!(metadata.read(ObjectPath::parse("aborted.txt").unwrap()).await.is_err());
    }

    fn stream_entity_id(stream: &ObjectFileWriteStream<'_>) -> EntityId {
        stream.entity_id
    }

    fn md5_of(data: &[u8]) -> String {
        let mut hasher = Md5Hasher::new();
        hasher.update(data);
        hasher.digest().as_str().to_string()
    }
}
