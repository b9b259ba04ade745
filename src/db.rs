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

//! The SQLite gateway: a single owned `rusqlite::Connection` running on
//! a dedicated thread. Async callers submit closures over `&Connection`
//! rather than a re-abstracted `exec`/`query`/`prepare` surface, so
//! catalog code keeps using rusqlite's own typed API (`params!`,
//! `query_map`, transactions) directly.

use std::path::Path;
use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

use crate::error::OmnioError;
use crate::error::Result;

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// Gateway to the catalog's SQLite connection. Cloning shares the same
/// background thread and connection, matching the single-owner,
/// serialize-writes model of §5.
#[derive(Clone)]
pub struct SqliteGateway {
    tx: mpsc::UnboundedSender<Job>,
}

pub struct GatewayHandle {
    pub gateway: SqliteGateway,
    thread: Option<JoinHandle<()>>,
}

impl GatewayHandle {
    pub async fn shutdown(mut self) {
        drop(self.gateway.tx.clone());
        if let Some(thread) = self.thread.take() {
            let _ = tokio::task::spawn_blocking(move || thread.join()).await;
        }
    }
}

impl SqliteGateway {
    /// Opens `path` on a dedicated thread and returns a handle plus the
    /// clonable gateway. The connection is never touched from any other
    /// thread.
    pub fn open(path: PathBuf) -> Result<GatewayHandle> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<rusqlite::Result<()>>();

        let thread = std::thread::Builder::new()
            .name("omnio-sqlite".into())
            .spawn(move || {
                let conn = match Connection::open(&path) {
                    Ok(conn) => conn,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if let Err(err) = conn.busy_timeout(Duration::from_millis(5000)) {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                let mut conn = conn;
                while let Some(job) = rx.blocking_recv() {
                    job(&mut conn);
                }
            })
            .map_err(std::io::Error::from)?;

        ready_rx
            .recv()
            .map_err(|_| OmnioError::DatabaseNotOpen)?
            .map_err(OmnioError::Sql)?;

        Ok(GatewayHandle {
            gateway: SqliteGateway { tx },
            thread: Some(thread),
        })
    }

    /// Runs `f` against the owned connection on its dedicated thread and
    /// returns its result. This is the gateway's entire surface: every
    /// query, exec, and prepared statement is just a closure here.
    pub async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            let result = f(conn);
            let _ = reply_tx.send(result);
        });
        self.tx
            .send(job)
            .map_err(|_| OmnioError::DatabaseNotOpen)?;
        reply_rx.await.map_err(|_| OmnioError::DatabaseNotOpen)?
    }

    /// Forces a WAL/journal checkpoint, so `close()` (and, per §5, every
    /// write-stream `close()`) returns only after the commit is flushed
    /// to disk.
    pub async fn checkpoint(&self) -> Result<()> {
        self.call(|conn| {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
            Ok(())
        })
        .await
    }
}

pub fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;\nPRAGMA synchronous=NORMAL;\nPRAGMA foreign_keys=ON;",
    )
}

pub fn database_path(bucket_root: &Path) -> PathBuf {
    bucket_root.join("metadata").join("duckdb")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn call_runs_against_owned_connection() {
        let dir = tempdir().unwrap();
        let handle = SqliteGateway::open(dir.path().join("test.db")).unwrap();
        let gateway = handle.gateway.clone();

        gateway
            .call(|conn| {
                apply_pragmas(conn)?;
                conn.execute_batch("CREATE TABLE t (id INTEGER)")?;
                Ok(())
            })
            .await
            .unwrap();

        gateway
            .call(|conn| {
                conn.execute("INSERT INTO t (id) VALUES (1)", [])?;
                Ok(())
            })
            .await
            .unwrap();

        let count: i64 = gateway
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 1);

        handle.shutdown().await;
    }
}
