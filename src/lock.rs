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

//! A keyed async multi-reader/single-writer lock, keyed by
//! `ObjectPath::path_key()`. Distinct keys never contend; acquisition on
//! the same key is cancellable via a `CancellationToken`. Backed by a
//! per-key table of `tokio::sync::RwLock`s so many concurrent async
//! callers in one process can make independent progress on distinct
//! paths.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use tokio::sync::OwnedRwLockReadGuard;
use tokio::sync::OwnedRwLockWriteGuard;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::OmnioError;
use crate::error::Result;

#[derive(Default)]
pub struct LockManager {
    table: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &str) -> Arc<RwLock<()>> {
        let mut table = self.table.lock().expect("lock table poisoned");
        table
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    fn maybe_prune(&self, key: &str, entry: &Arc<RwLock<()>>) {
        let mut table = self.table.lock().expect("lock table poisoned");
        if let Some(current) = table.get(key)
            && Arc::ptr_eq(current, entry)
            && Arc::strong_count(current) == 1
        {
            table.remove(key);
        }
    }

    /// Acquires a shared (reader) lock on `key`. Concurrent readers are
    /// admitted; blocks while a writer holds or is waiting for the lock.
    pub async fn rlock(&self, key: &str, cancel: &CancellationToken) -> Result<ReadGuard> {
        let entry = self.entry(key);
        tokio::select! {
            guard = entry.clone().read_owned() => {
                Ok(ReadGuard {
                    key: key.to_string(),
                    entry: Some(entry),
                    guard: Some(guard),
                    manager: self,
                })
            }
            () = cancel.cancelled() => Err(OmnioError::Aborted),
        }
    }

    /// Acquires an exclusive (writer) lock on `key`, waiting for all
    /// readers and writers already holding it.
    pub async fn lock(&self, key: &str, cancel: &CancellationToken) -> Result<WriteGuard> {
        let entry = self.entry(key);
        tokio::select! {
            guard = entry.clone().write_owned() => {
                Ok(WriteGuard {
                    key: key.to_string(),
                    entry: Some(entry),
                    guard: Some(guard),
                    manager: self,
                })
            }
            () = cancel.cancelled() => Err(OmnioError::Aborted),
        }
    }
}

pub struct ReadGuard<'a> {
    key: String,
    entry: Option<Arc<RwLock<()>>>,
    guard: Option<OwnedRwLockReadGuard<()>>,
    manager: &'a LockManager,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        if let Some(entry) = self.entry.take() {
            self.manager.maybe_prune(&self.key, &entry);
        }
    }
}

pub struct WriteGuard<'a> {
    key: String,
    entry: Option<Arc<RwLock<()>>>,
    guard: Option<OwnedRwLockWriteGuard<()>>,
    manager: &'a LockManager,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        if let Some(entry) = self.entry.take() {
            self.manager.maybe_prune(&self.key, &entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_readers_on_same_key_proceed() {
        let mgr = LockManager::new();
        let cancel = CancellationToken::new();
        let r1 = mgr.rlock("a", &cancel).await.unwrap();
        let r2 = mgr.rlock("a", &cancel).await.unwrap();
        drop(r1);
        drop(r2);
    }

    #[tokio::test]
    async fn writer_excludes_other_writers_on_same_key() {
        let mgr = Arc::new(LockManager::new());
        let cancel = CancellationToken::new();
        let w1 = mgr.lock("a", &cancel).await.unwrap();

        let mgr2 = mgr.clone();
        let handle = tokio::spawn(async move {
            let cancel = CancellationToken::new();
            let _w2 = mgr2.lock("a", &cancel).await.unwrap();
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        drop(w1);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn distinct_keys_never_contend() {
        let mgr = LockManager::new();
        let cancel = CancellationToken::new();
        let _a = mgr.lock("a", &cancel).await.unwrap();
        let _b = mgr.lock("b", &cancel).await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_aborts_pending_acquire() {
        let mgr = Arc::new(LockManager::new());
        let outer_cancel = CancellationToken::new();
        let _w1 = mgr.lock("a", &outer_cancel).await.unwrap();

        let mgr2 = mgr.clone();
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();
        let handle = tokio::spawn(async move { mgr2.lock("a", &cancel2).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(OmnioError::Aborted)));
    }
}
