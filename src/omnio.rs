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

//! The `Omnio` coordinator: owns the lock manager, the catalog, the
//! entity storage root, and the logger, and orchestrates every public
//! operation over them, acquiring the right per-path lock from
//! `lock.rs` before touching the catalog or storage.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use crate::catalog::ListEntry;
use crate::catalog::ListOptions;
use crate::catalog::ListOrder;
use crate::catalog::Metadata;
use crate::catalog::SearchHit;
use crate::catalog::SearchOptions;
use crate::catalog::Stat;
use crate::catalog::UpdateInput;
use crate::db::GatewayHandle;
use crate::db::SqliteGateway;
use crate::db::database_path;
use crate::error::OmnioError;
use crate::error::Result;
use crate::lock::LockManager;
use crate::lock::ReadGuard;
use crate::lock::WriteGuard;
use crate::logger::LogLevel;
use crate::logger::Logger;
use crate::logger::TracingLogger;
use crate::read_stream::ObjectFileReadStream;
use crate::storage::NativeStorage;
use crate::storage::Storage;
use crate::storage::sweep_crash_leftovers;
use crate::textsearch::IdentityTextSearch;
use crate::textsearch::TextSearch;
use crate::types::DirPath;
use crate::types::EntityId;
use crate::types::MAX_DESCRIPTION_BYTES;
use crate::types::MAX_TAG_BYTES;
use crate::types::ObjectId;
use crate::types::ObjectPath;
use crate::types::WriteFlag;
use crate::write_stream::ObjectFileWriteStream;
use crate::write_stream::WriteOutcome;
use crate::write_stream::WriteParams;

/// Everything needed to write an object in one call; `create_write_stream`
/// exposes the chunked variant for callers that want to feed bytes
/// incrementally instead.
#[derive(Debug, Clone)]
pub struct PutObjectInput {
    pub path: ObjectPath,
    pub flag: WriteFlag,
    pub data: Vec<u8>,
    pub part_size: Option<u64>,
    pub mime_type: Option<String>,
    pub object_tags: Vec<String>,
    pub description: Option<String>,
    pub user_metadata: Option<Value>,
    pub timestamp: Option<OffsetDateTime>,
}

struct OmnioInner {
    storage: Arc<dyn Storage>,
    metadata: Arc<Metadata>,
    locks: LockManager,
    logger: Arc<dyn Logger>,
    text_search: Arc<dyn TextSearch>,
    gateway: SqliteGateway,
    gateway_handle: GatewayHandle,
    default_part_size: u64,
}

enum OmnioState {
    Open(OmnioInner),
    Closed,
}

/// Single-bucket coordinator. `open`/`close` bracket the instance's
/// lifetime; every other public method fails fast with `OmnioClosed`
/// once closed.
pub struct Omnio {
    state: OmnioState,
}

impl Omnio {
    pub async fn open(bucket_root: PathBuf, default_part_size: u64) -> Result<Self> {
        let db_path = database_path(&bucket_root);
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let entities_root = bucket_root.join("entities");
        tokio::fs::create_dir_all(&entities_root).await?;

        let swept = sweep_crash_leftovers(&entities_root).await?;
        let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
        if swept > 0 {
            logger.log(
                LogLevel::Warn,
                &format!("removed {swept} leftover .crswap file(s) from a prior crash"),
                None,
            );
        }

        let gateway_handle = SqliteGateway::open(db_path)?;
        let gateway = gateway_handle.gateway.clone();
        let metadata = Metadata::open(gateway.clone()).await?;
        let storage = NativeStorage::open(entities_root).await?;

        Ok(Self {
            state: OmnioState::Open(OmnioInner {
                storage: Arc::new(storage),
                metadata: Arc::new(metadata),
                locks: LockManager::new(),
                logger,
                text_search: Arc::new(IdentityTextSearch),
                gateway,
                gateway_handle,
                default_part_size,
            }),
        })
    }

    /// Checkpoints the database and shuts down its owning thread.
    /// Idempotent: closing an already-closed instance is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        let inner = match std::mem::replace(&mut self.state, OmnioState::Closed) {
            OmnioState::Open(inner) => inner,
            OmnioState::Closed => return Ok(()),
        };
        inner.gateway.checkpoint().await?;
        inner.gateway_handle.shutdown().await;
        Ok(())
    }

    fn inner(&self) -> Result<&OmnioInner> {
        match &self.state {
            OmnioState::Open(inner) => Ok(inner),
            OmnioState::Closed => Err(OmnioError::OmnioClosed),
        }
    }

    // ---- write ---------------------------------------------------------

    /// Opens a chunked write stream under the path's write lock. The
    /// returned stream borrows `Omnio` for the lifetime of the lock
    /// guard it carries.
    pub async fn create_write_stream<'a>(
        &'a self,
        path: ObjectPath,
        flag: WriteFlag,
        part_size: Option<u64>,
        mime_type: Option<String>,
        object_tags: Vec<String>,
        description: Option<String>,
        user_metadata: Option<Value>,
        timestamp: Option<OffsetDateTime>,
        cancel: &CancellationToken,
    ) -> Result<ObjectFileWriteStream<'a>> {
        validate_tags(&object_tags)?;
        validate_description(&description)?;
        let inner = self.inner()?;
        let guard = inner.locks.lock(path.path_key(), cancel).await?;
        let description = description.map(|d| inner.text_search.to_query_string(&d));
        ObjectFileWriteStream::open(
            inner.storage.clone(),
            inner.metadata.clone(),
            WriteParams {
                path,
                flag,
                part_size: part_size.unwrap_or(inner.default_part_size),
                mime_type,
                object_tags,
                description,
                user_metadata,
                timestamp,
            },
            guard,
        )
        .await
    }

    /// Writes `input.data` in one call: opens a stream, writes the
    /// whole buffer, and closes it, aborting on any write failure so
    /// the new entity never lingers.
    pub async fn put_object(
        &self,
        input: PutObjectInput,
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        let mut stream = self
            .create_write_stream(
                input.path,
                input.flag,
                input.part_size,
                input.mime_type,
                input.object_tags,
                input.description,
                input.user_metadata,
                input.timestamp,
                cancel,
            )
            .await?;
        match stream.write(&input.data).await {
            Ok(()) => stream.close().await,
            Err(err) => {
                let _ = stream.abort().await;
                Err(err)
            }
        }
    }

    // ---- read ------------------------------------------------------------

    /// Opens a sequential read stream under the path's read lock. A
    /// dangling catalog row (entity directory missing on disk) is
    /// cleaned up best-effort and surfaced as `ObjectNotFound`.
    pub async fn create_read_stream<'a>(
        &'a self,
        path: ObjectPath,
        cancel: &CancellationToken,
    ) -> Result<ObjectFileReadStream<'a>> {
        let inner = self.inner()?;
        let guard = inner.locks.rlock(path.path_key(), cancel).await?;
        let detail = inner.metadata.read_detail(path.clone()).await?;
        let entity = match inner.storage.open_entity(detail.entity_id, false).await {
            Ok(entity) => entity,
            Err(OmnioError::EntryPathNotFound { .. }) => {
                if let Ok(summary) = inner.metadata.read(path.clone()).await {
                    let _ = inner.metadata.delete(summary.object_id).await;
                }
                return Err(OmnioError::ObjectNotFound {
                    path: path.as_str().to_string(),
                });
            }
            Err(err) => return Err(err),
        };
        Ok(ObjectFileReadStream::open(
            entity,
            detail.num_parts,
            detail.size,
            guard,
        ))
    }

    pub async fn get_object(&self, path: ObjectPath, cancel: &CancellationToken) -> Result<Vec<u8>> {
        self.create_read_stream(path, cancel).await?.read_all().await
    }

    // ---- read-only catalog queries --------------------------------------

    pub async fn exists_object(&self, path: ObjectPath, cancel: &CancellationToken) -> Result<bool> {
        let inner = self.inner()?;
        let _guard = inner.locks.rlock(path.path_key(), cancel).await?;
        inner.metadata.exists_object(path).await
    }

    pub async fn exists_dir(&self, dir: DirPath, cancel: &CancellationToken) -> Result<bool> {
        let inner = self.inner()?;
        let _guard = inner.locks.rlock(&dir_lock_key(&dir), cancel).await?;
        inner.metadata.exists_dir(dir).await
    }

    pub async fn stat(&self, path: ObjectPath, cancel: &CancellationToken) -> Result<Stat> {
        let inner = self.inner()?;
        let _guard = inner.locks.rlock(path.path_key(), cancel).await?;
        inner.metadata.stat(path).await
    }

    pub async fn list(&self, opts: ListOptions, cancel: &CancellationToken) -> Result<Vec<ListEntry>> {
        let inner = self.inner()?;
        let _guard = inner.locks.rlock(&dir_lock_key(&opts.dir), cancel).await?;
        inner.metadata.list(opts).await
    }

    pub async fn list_in_trash(
        &self,
        opts: ListOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<ListEntry>> {
        let inner = self.inner()?;
        let _guard = inner.locks.rlock(&dir_lock_key(&opts.dir), cancel).await?;
        inner.metadata.list_in_trash(opts).await
    }

    pub async fn search(
        &self,
        mut opts: SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchHit>> {
        let inner = self.inner()?;
        let _guard = inner.locks.rlock(&dir_lock_key(&opts.dir), cancel).await?;
        opts.query = inner.text_search.to_query_string(&opts.query);
        inner.metadata.search(opts).await
    }

    // ---- move / copy -----------------------------------------------------

    /// `move_object(p, p)` is a no-op, per the coordinator's path-equal
    /// short-circuit; otherwise both paths are locked exclusively, in
    /// key order, so two moves in opposite directions cannot deadlock.
    pub async fn move_object(
        &self,
        src: ObjectPath,
        dst: ObjectPath,
        exclusive: bool,
        timestamp: Option<OffsetDateTime>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if src == dst {
            return Ok(());
        }
        let inner = self.inner()?;
        let (_g1, _g2) = lock_pair_exclusive(&inner.locks, src.path_key(), dst.path_key(), cancel).await?;
        if exclusive {
            inner.metadata.move_exclusive(src, dst).await
        } else {
            inner.metadata.move_object(src, dst).await
        }
    }

    /// `copy_object(p, p)` is a no-op returning `p`'s existing object
    /// id. Otherwise `src` is read-locked and `dst` write-locked (in
    /// key order relative to each other, not role, for the same
    /// deadlock-avoidance reason as `move_object`); every source part
    /// is re-materialized into a fresh entity before the catalog row
    /// commits, and a displaced destination entity is removed
    /// best-effort on success.
    pub async fn copy_object(
        &self,
        src: ObjectPath,
        dst: ObjectPath,
        exclusive: bool,
        timestamp: Option<OffsetDateTime>,
        cancel: &CancellationToken,
    ) -> Result<ObjectId> {
        let inner = self.inner()?;
        if src == dst {
            return inner.metadata.read(src).await.map(|s| s.object_id);
        }

        let (_rg, _wg) =
            lock_src_read_dst_write(&inner.locks, src.path_key(), dst.path_key(), cancel).await?;

        let src_detail = inner.metadata.read_detail(src.clone()).await?;
        let dst_prior = match inner.metadata.read_detail(dst.clone()).await {
            Ok(detail) => Some(detail),
            Err(OmnioError::ObjectNotFound { .. }) => None,
            Err(err) => return Err(err),
        };

        let new_entity_id = EntityId::new();
        if let Err(err) = copy_entity_parts(
            inner.storage.as_ref(),
            src_detail.entity_id,
            new_entity_id,
            src_detail.num_parts,
        )
        .await
        {
            let _ = inner.storage.remove_entity(new_entity_id).await;
            return Err(err);
        }

        let result = if exclusive {
            inner.metadata.copy_exclusive(src, dst, new_entity_id, timestamp).await
        } else {
            inner.metadata.copy(src, dst, new_entity_id, timestamp).await
        };

        match result {
            Ok(object_id) => {
                if let Some(prior) = dst_prior
                    && let Err(err) = inner.storage.remove_entity(prior.entity_id).await
                {
                    inner.logger.log(
                        LogLevel::Error,
                        &format!("failed to remove entity displaced by copy: {err}"),
                        Some(&prior.entity_id.to_string()),
                    );
                }
                Ok(object_id)
            }
            Err(err) => {
                let _ = inner.storage.remove_entity(new_entity_id).await;
                Err(err)
            }
        }
    }

    // ---- metadata mutation / lifecycle ------------------------------------

    pub async fn update_object(&self, input: UpdateInput, cancel: &CancellationToken) -> Result<()> {
        if let Some(tags) = &input.object_tags {
            validate_tags(tags)?;
        }
        if let Some(description) = &input.description {
            validate_description(description)?;
        }
        let inner = self.inner()?;
        let _guard = inner.locks.lock(input.path.path_key(), cancel).await?;
        inner.metadata.update(input).await
    }

    pub async fn trash_object(
        &self,
        path: ObjectPath,
        timestamp: Option<OffsetDateTime>,
        cancel: &CancellationToken,
    ) -> Result<(ObjectId, EntityId)> {
        let inner = self.inner()?;
        let _guard = inner.locks.lock(path.path_key(), cancel).await?;
        inner.metadata.trash(path, timestamp).await
    }

    /// Hard-deletes a trashed object's catalog row and its on-disk
    /// entity directory (best-effort; a missing entity is not an
    /// error, matching `Metadata::delete`'s zero-rows-is-ok contract).
    pub async fn delete_object(&self, object_id: ObjectId, cancel: &CancellationToken) -> Result<()> {
        let inner = self.inner()?;
        let key = format!("objectid:{object_id}");
        let _guard = inner.locks.lock(&key, cancel).await?;
        let entity_id = inner.metadata.read_in_trash(object_id).await.ok();
        inner.metadata.delete(object_id).await?;
        if let Some(entity_id) = entity_id
            && let Err(err) = inner.storage.remove_entity(entity_id).await
        {
            inner.logger.log(
                LogLevel::Error,
                &format!("failed to remove entity after delete: {err}"),
                Some(&entity_id.to_string()),
            );
        }
        Ok(())
    }

    // ---- diagnostics -------------------------------------------------------

    /// Walks every object reachable from the root directory and checks
    /// that its entity directory still exists on disk, surfacing any
    /// catalog rows left dangling by a crash between a commit and its
    /// entity cleanup.
    pub async fn doctor(&self, cancel: &CancellationToken) -> Result<DoctorReport> {
        let inner = self.inner()?;
        let mut objects_checked = 0usize;
        let mut missing_entities = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(DirPath::root());

        while let Some(dir) = queue.pop_front() {
            let entries = self
                .list(
                    ListOptions {
                        dir: dir.clone(),
                        is_object: None,
                        skip: 0,
                        take: usize::MAX,
                        order: ListOrder {
                            collation: "BINARY".to_string(),
                            prefer_object: true,
                        },
                    },
                    cancel,
                )
                .await?;
            for entry in entries {
                match entry {
                    ListEntry::Object(summary) => {
                        objects_checked += 1;
                        if !inner.storage.entity_exists(summary.entity_id).await? {
                            missing_entities.push(summary.full_path);
                        }
                    }
                    ListEntry::Directory { name } => {
                        let mut child = dir.0.clone();
                        child.push(name);
                        queue.push_back(DirPath(child));
                    }
                }
            }
        }

        Ok(DoctorReport {
            objects_checked,
            missing_entities,
        })
    }
}

/// Result of `Omnio::doctor`: a count of every object visited, and the
/// paths whose catalog row survives but whose entity directory does not.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorReport {
    pub objects_checked: usize,
    pub missing_entities: Vec<String>,
}

fn dir_lock_key(dir: &DirPath) -> String {
    dir.0.join("/")
}

fn validate_tags(tags: &[String]) -> Result<()> {
    for tag in tags {
        if tag.len() > MAX_TAG_BYTES {
            return Err(OmnioError::InvalidInput {
                field: "object_tags".to_string(),
                reason: format!("tag exceeds {MAX_TAG_BYTES} bytes"),
            });
        }
    }
    Ok(())
}

fn validate_description(description: &Option<String>) -> Result<()> {
    if let Some(description) = description
        && description.len() > MAX_DESCRIPTION_BYTES
    {
        return Err(OmnioError::InvalidInput {
            field: "description".to_string(),
            reason: format!("description exceeds {MAX_DESCRIPTION_BYTES} bytes"),
        });
    }
    Ok(())
}

async fn lock_pair_exclusive<'a>(
    locks: &'a LockManager,
    a: &str,
    b: &str,
    cancel: &CancellationToken,
) -> Result<(WriteGuard<'a>, WriteGuard<'a>)> {
    if a <= b {
        let ga = locks.lock(a, cancel).await?;
        let gb = locks.lock(b, cancel).await?;
        Ok((ga, gb))
    } else {
        let gb = locks.lock(b, cancel).await?;
        let ga = locks.lock(a, cancel).await?;
        Ok((ga, gb))
    }
}

async fn lock_src_read_dst_write<'a>(
    locks: &'a LockManager,
    src: &str,
    dst: &str,
    cancel: &CancellationToken,
) -> Result<(ReadGuard<'a>, WriteGuard<'a>)> {
    if src < dst {
        let rg = locks.rlock(src, cancel).await?;
        let wg = locks.lock(dst, cancel).await?;
        Ok((rg, wg))
    } else {
        let wg = locks.lock(dst, cancel).await?;
        let rg = locks.rlock(src, cancel).await?;
        Ok((rg, wg))
    }
}

async fn copy_entity_parts(
    storage: &dyn Storage,
    src_id: EntityId,
    dst_id: EntityId,
    num_parts: u32,
) -> Result<()> {
    let src_entity = storage.open_entity(src_id, false).await?;
    let dst_entity = storage.open_entity(dst_id, true).await?;
    for part in 1..=num_parts {
        let bytes = src_entity.open_part(part, false).await?.read_all().await?;
        let dst_part = dst_entity.open_part(part, true).await?;
        let mut writable = dst_part.create_writable(false).await?;
        writable.write(&bytes).await?;
        writable.close().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_dir(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        dir.path().join(name)
    }

    fn list_options(dir: DirPath) -> ListOptions {
        ListOptions {
            dir,
            is_object: None,
            skip: 0,
            take: 100,
            order: crate::catalog::ListOrder {
                collation: "BINARY".to_string(),
                prefer_object: true,
            },
        }
    }

    fn put(path: &str, data: &[u8], flag: WriteFlag) -> PutObjectInput {
        PutObjectInput {
            path: ObjectPath::parse(path).unwrap(),
            flag,
            data: data.to_vec(),
            part_size: Some(1024),
            mime_type: None,
            object_tags: Vec::new(),
            description: None,
            user_metadata: None,
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn create_then_read_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let root = cfg_dir(&dir, "bucket");
        let mut omnio = Omnio::open(root, 8 * 1024 * 1024).await.unwrap();
        let cancel = CancellationToken::new();

        omnio
            .put_object(put("file.txt", b"foo", WriteFlag::Create), &cancel)
            .await
            .unwrap();
        let data = omnio
            .get_object(ObjectPath::parse("file.txt").unwrap(), &cancel)
            .await
            .unwrap();
        assert_eq!(data, b"foo");

        omnio.close().await.unwrap();
    }

    #[tokio::test]
    async fn exclusive_rejection_leaves_prior_contents() {
        let dir = tempfile::tempdir().unwrap();
        let root = cfg_dir(&dir, "bucket");
        let omnio = Omnio::open(root, 1024).await.unwrap();
        let cancel = CancellationToken::new();

        omnio
            .put_object(put("file.txt", b"foo", WriteFlag::Create), &cancel)
            .await
            .unwrap();
        let err = omnio
            .put_object(put("file.txt", b"x", WriteFlag::CreateExclusive), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, OmnioError::ObjectExists { .. }));

        let data = omnio
            .get_object(ObjectPath::parse("file.txt").unwrap(), &cancel)
            .await
            .unwrap();
        assert_eq!(data, b"foo");
    }

    #[tokio::test]
    async fn trash_then_delete_removes_row_and_entity() {
        let dir = tempfile::tempdir().unwrap();
        let root = cfg_dir(&dir, "bucket");
        let omnio = Omnio::open(root, 1024).await.unwrap();
        let cancel = CancellationToken::new();

        omnio
            .put_object(put("a.txt", b"hi", WriteFlag::Create), &cancel)
            .await
            .unwrap();
        let (object_id, entity_id) = omnio
            .trash_object(ObjectPath::parse("a.txt").unwrap(), None, &cancel)
            .await
            .unwrap();

        assert!(
            omnio
                .get_object(ObjectPath::parse("a.txt").unwrap(), &cancel)
                .await
                .is_err()
        );

        omnio.delete_object(object_id, &cancel).await.unwrap();
        assert!(!omnio.inner().unwrap().storage.entity_exists(entity_id).await.unwrap());
    }

    #[tokio::test]
    async fn move_then_list_reflects_destination() {
        let dir = tempfile::tempdir().unwrap();
        let root = cfg_dir(&dir, "bucket");
        let omnio = Omnio::open(root, 1024).await.unwrap();
        let cancel = CancellationToken::new();

        omnio
            .put_object(put("a.txt", b"hi", WriteFlag::Create), &cancel)
            .await
            .unwrap();
        omnio
            .move_object(
                ObjectPath::parse("a.txt").unwrap(),
                ObjectPath::parse("b.txt").unwrap(),
                false,
                None,
                &cancel,
            )
            .await
            .unwrap();

        assert!(
            omnio
                .get_object(ObjectPath::parse("a.txt").unwrap(), &cancel)
                .await
                .is_err()
        );
        let data = omnio
            .get_object(ObjectPath::parse("b.txt").unwrap(), &cancel)
            .await
            .unwrap();
        assert_eq!(data, b"hi");

        let entries = omnio.list(list_options(DirPath::root()), &cancel).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn copy_object_duplicates_bytes_under_new_entity() {
        let dir = tempfile::tempdir().unwrap();
        let root = cfg_dir(&dir, "bucket");
        let omnio = Omnio::open(root, 1024).await.unwrap();
        let cancel = CancellationToken::new();

        omnio
            .put_object(put("a.txt", b"hi", WriteFlag::Create), &cancel)
            .await
            .unwrap();
        omnio
            .copy_object(
                ObjectPath::parse("a.txt").unwrap(),
                ObjectPath::parse("b.txt").unwrap(),
                false,
                None,
                &cancel,
            )
            .await
            .unwrap();

        let a = omnio
            .get_object(ObjectPath::parse("a.txt").unwrap(), &cancel)
            .await
            .unwrap();
        let b = omnio
            .get_object(ObjectPath::parse("b.txt").unwrap(), &cancel)
            .await
            .unwrap();
        assert_eq!(a, b"hi");
        assert_eq!(b, b"hi");
    }

    #[tokio::test]
    async fn copy_object_to_same_path_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let root = cfg_dir(&dir, "bucket");
        let omnio = Omnio::open(root, 1024).await.unwrap();
        let cancel = CancellationToken::new();

        omnio
            .put_object(put("a.txt", b"hi", WriteFlag::Create), &cancel)
            .await
            .unwrap();
        let before = omnio.stat(ObjectPath::parse("a.txt").unwrap(), &cancel).await.unwrap();
        omnio
            .copy_object(
                ObjectPath::parse("a.txt").unwrap(),
                ObjectPath::parse("a.txt").unwrap(),
                false,
                None,
                &cancel,
            )
            .await
            .unwrap();
        let after = omnio.stat(ObjectPath::parse("a.txt").unwrap(), &cancel).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn doctor_reports_entity_removed_out_from_under_the_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let root = cfg_dir(&dir, "bucket");
        let omnio = Omnio::open(root, 1024).await.unwrap();
        let cancel = CancellationToken::new();

        omnio
            .put_object(put("a/b.txt", b"hi", WriteFlag::Create), &cancel)
            .await
            .unwrap();
        let entity_id = omnio
            .inner()
            .unwrap()
            .metadata
            .read_detail(ObjectPath::parse("a/b.txt").unwrap())
            .await
            .unwrap()
            .entity_id;
        omnio.inner().unwrap().storage.remove_entity(entity_id).await.unwrap();

        let report = omnio.doctor(&cancel).await.unwrap();
        assert_eq!(report.objects_checked, 1);
        assert_eq!(report.missing_entities, vec!["a/b.txt".to_string()]);
    }

    #[tokio::test]
    async fn closed_instance_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let root = cfg_dir(&dir, "bucket");
        let mut omnio = Omnio::open(root, 1024).await.unwrap();
        omnio.close().await.unwrap();

        let cancel = CancellationToken::new();
        let err = omnio
            .put_object(put("a.txt", b"hi", WriteFlag::Create), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, OmnioError::OmnioClosed));
    }

    #[tokio::test]
    async fn description_at_byte_limit_succeeds_one_over_fails() {
        let dir = tempfile::tempdir().unwrap();
        let root = cfg_dir(&dir, "bucket");
        let omnio = Omnio::open(root, 1024).await.unwrap();
        let cancel = CancellationToken::new();

        let mut at_limit = put("a.txt", b"hi", WriteFlag::Create);
        at_limit.description = Some("x".repeat(MAX_DESCRIPTION_BYTES));
        omnio.put_object(at_limit, &cancel).await.unwrap();

        let mut over_limit = put("b.txt", b"hi", WriteFlag::Create);
        over_limit.description = Some("x".repeat(MAX_DESCRIPTION_BYTES + 1));
        let err = omnio.put_object(over_limit, &cancel).await.unwrap_err();
        assert!(matches!(err, OmnioError::InvalidInput { field, .. } if field == "description"));
    }

    #[tokio::test]
    async fn tag_over_byte_limit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let root = cfg_dir(&dir, "bucket");
        let omnio = Omnio::open(root, 1024).await.unwrap();
        let cancel = CancellationToken::new();

        let mut input = put("a.txt", b"hi", WriteFlag::Create);
        input.object_tags = vec!["x".repeat(MAX_TAG_BYTES + 1)];
        let err = omnio.put_object(input, &cancel).await.unwrap_err();
        assert!(matches!(err, OmnioError::InvalidInput { field, .. } if field == "object_tags"));
    }
}
