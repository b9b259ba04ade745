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

//! `ObjectFileReadStream`: a sequential part reader over an already
//! resolved entity, holding the path's read lock for its lifetime.
//! Modelled as an explicit position counter rather than a coroutine,
//! the same way `write_stream` models Open/Closed with plain fields
//! instead of a generator.

use crate::error::Result;
use crate::lock::ReadGuard;
use crate::storage::EntityHandle;

pub struct ObjectFileReadStream<'a> {
    entity: Box<dyn EntityHandle>,
    num_parts: u32,
    size: u64,
    next_part: u32,
    _lock: ReadGuard<'a>,
}

impl<'a> ObjectFileReadStream<'a> {
    pub fn open(
        entity: Box<dyn EntityHandle>,
        num_parts: u32,
        size: u64,
        lock: ReadGuard<'a>,
    ) -> Self {
        Self {
            entity,
            num_parts,
            size,
            next_part: 1,
            _lock: lock,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn num_parts(&self) -> u32 {
        self.num_parts
    }

    /// Yields part `1`, then `2`, ... up to `num_parts`, then `None`
    /// forever after (dispose is idempotent: once exhausted, further
    /// calls are a no-op rather than an error).
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.next_part > self.num_parts {
            return Ok(None);
        }
        let part = self.entity.open_part(self.next_part, false).await?;
        let bytes = part.read_all().await?;
        self.next_part += 1;
        Ok(Some(bytes))
    }

    /// Drains every remaining chunk into one buffer. Consumes `self`
    /// so the read lock is released as soon as the last part lands.
    pub async fn read_all(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.size as usize);
        while let Some(chunk) = self.next_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    /// Releases the read lock without reading further. Idempotent by
    /// construction: `self` is consumed, so a second call cannot
    /// typecheck.
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::LockManager;
    use crate::storage::NativeStorage;
    use crate::storage::Storage;
    use crate::types::EntityId;
    use tokio_util::sync::CancellationToken;

    async fn write_part(entity: &dyn EntityHandle, part: u32, data: &[u8]) {
        let handle = entity.open_part(part, true).await.unwrap();
        let mut w = handle.create_writable(false).await.unwrap();
        w.write(data).await.unwrap();
        w.close().await.unwrap();
    }

    #[tokio::test]
    async fn yields_parts_in_order_then_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = NativeStorage::open(dir.path().to_path_buf()).await.unwrap();
        let id = EntityId::new();
        let entity = storage.open_entity(id, true).await.unwrap();
        write_part(entity.as_ref(), 1, b"foobarb").await;
        write_part(entity.as_ref(), 2, b"az").await;

        let locks = LockManager::new();
        let cancel = CancellationToken::new();
        let guard = locks.rlock("f", &cancel).await.unwrap();

        let mut stream = ObjectFileReadStream::open(entity, 2, 9, guard);
        assert_eq!(stream.next_chunk().await.unwrap().unwrap(), b"foobarb");
        assert_eq!(stream.next_chunk().await.unwrap().unwrap(), b"az");
        assert!(stream.next_chunk().await.unwrap().is_none());
        assert!(stream.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_all_concatenates_every_part() {
        let dir = tempfile::tempdir().unwrap();
        let storage = NativeStorage::open(dir.path().to_path_buf()).await.unwrap();
        let id = EntityId::new();
        let entity = storage.open_entity(id, true).await.unwrap();
        write_part(entity.as_ref(), 1, b"foobarb").await;
        write_part(entity.as_ref(), 2, b"az").await;

        let locks = LockManager::new();
        let cancel = CancellationToken::new();
        let guard = locks.rlock("f", &cancel).await.unwrap();

        let stream = ObjectFileReadStream::open(entity, 2, 9, guard);
        assert_eq!(stream.read_all().await.unwrap(), b"foobarbaz");
    }

    #[tokio::test]
    async fn empty_object_yields_no_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let storage = NativeStorage::open(dir.path().to_path_buf()).await.unwrap();
        let id = EntityId::new();
        let entity = storage.open_entity(id, true).await.unwrap();

        let locks = LockManager::new();
        let cancel = CancellationToken::new();
        let guard = locks.rlock("empty", &cancel).await.unwrap();

        let stream = ObjectFileReadStream::open(entity, 0, 0, guard);
        assert_eq!(stream.read_all().await.unwrap(), Vec::<u8>::new());
    }
}
