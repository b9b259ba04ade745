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

//! The metadata catalog: schema migrations and every CRUD/listing/search
//! operation over `metadata_v1`.
//!
//! `path_seg`/`obj_tags`/`md5state` are logically `TEXT[]`; physically
//! they are JSON-array TEXT columns, queried with `json_extract`/
//! `json_array_length`. SQLite has no `DISTINCT ON`, so a directory
//! listing is two SQL queries (objects at an exact depth; distinct
//! directory names at a greater depth) merged and sorted in Rust.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::db::SqliteGateway;
use crate::db::apply_pragmas;
use crate::error::OmnioError;
use crate::error::Result;
use crate::hash::HashState;
use crate::types::Checksum;
use crate::types::DirPath;
use crate::types::EntityId;
use crate::types::ObjectId;
use crate::types::ObjectPath;
use crate::types::RecType;

const SCHEMA_VERSION: i64 = 1;

const MIGRATIONS: &str = "
CREATE TABLE IF NOT EXISTS meta (
  key TEXT PRIMARY KEY,
  value TEXT
);

CREATE TABLE IF NOT EXISTS metadata_v1 (
  objectid TEXT PRIMARY KEY,
  fullpath TEXT NOT NULL,
  path_key TEXT UNIQUE,
  path_seg TEXT NOT NULL,
  rec_type TEXT NOT NULL,
  rec_time TEXT NOT NULL,
  obj_size INTEGER NOT NULL,
  numparts INTEGER NOT NULL,
  partsize INTEGER NOT NULL,
  mime_typ TEXT,
  new_time TEXT NOT NULL,
  mod_time TEXT NOT NULL,
  hash_md5 TEXT,
  md5state TEXT,
  obj_tags TEXT,
  desc_fts TEXT,
  usermeta TEXT,
  entityid TEXT UNIQUE NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_metadata_rec_type ON metadata_v1(rec_type);

CREATE VIRTUAL TABLE IF NOT EXISTS metadata_fts USING fts5(
  objectid UNINDEXED,
  fullpath,
  desc_fts,
  tokenize = 'unicode61 remove_diacritics 0'
);
";

fn ms_expr(column: &str) -> String {
    format!("CAST((julianday({column}) - 2440587.5) * 86400000 AS INTEGER)")
}

/// A row as projected through the `metadata` view: non-DELETE rows with
/// timestamps materialized in milliseconds.
#[derive(Debug, Clone)]
pub struct ObjectSummary {
    pub object_id: ObjectId,
    pub full_path: String,
    pub rec_type: RecType,
    pub rec_time_ms: i64,
    pub size: u64,
    pub num_parts: u32,
    pub part_size: u64,
    pub mime_type: Option<String>,
    pub new_time_ms: i64,
    pub mod_time_ms: i64,
    pub checksum: Option<Checksum>,
    pub object_tags: Vec<String>,
    pub description: Option<String>,
    pub user_metadata: Option<Value>,
    pub entity_id: EntityId,
}

#[derive(Debug, Clone)]
pub struct CreateInput {
    pub path: ObjectPath,
    pub entity_id: EntityId,
    pub size: u64,
    pub num_parts: u32,
    pub part_size: u64,
    pub checksum: Option<Checksum>,
    pub hash_state: Option<HashState>,
    pub mime_type: Option<String>,
    pub object_tags: Vec<String>,
    pub description: Option<String>,
    pub user_metadata: Option<Value>,
    pub timestamp: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct UpdateInput {
    pub path: ObjectPath,
    pub mime_type: Option<Option<String>>,
    pub object_tags: Option<Vec<String>>,
    pub description: Option<Option<String>>,
    pub user_metadata: Option<Option<Value>>,
    pub timestamp: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct UpdateExclusiveInput {
    pub path: ObjectPath,
    pub expect_checksum: Checksum,
    pub checksum: Checksum,
    pub hash_state: HashState,
    pub entity_id: Option<EntityId>,
    pub mime_type: Option<String>,
    pub num_parts: u32,
    pub part_size: u64,
    pub object_size: u64,
    pub object_tags: Option<Vec<String>>,
    pub description: Option<String>,
    pub user_metadata: Option<Value>,
    pub timestamp: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct ObjectDetail {
    pub size: u64,
    pub checksum: Checksum,
    pub hash_state: HashState,
    pub entity_id: EntityId,
    pub num_parts: u32,
    pub part_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub is_object: bool,
    pub is_directory: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collation {
    Binary,
    NoCase,
    RTrim,
}

impl Collation {
    fn sql_name(self) -> &'static str {
        match self {
            Collation::Binary => "BINARY",
            Collation::NoCase => "NOCASE",
            Collation::RTrim => "RTRIM",
        }
    }

    fn parse(raw: &str) -> Result<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "BINARY" => Ok(Collation::Binary),
            "NOCASE" => Ok(Collation::NoCase),
            "RTRIM" => Ok(Collation::RTrim),
            other => Err(OmnioError::InvalidCollation {
                collation: other.to_string(),
            }),
        }
    }

    fn cmp(self, a: &str, b: &str) -> std::cmp::Ordering {
        match self {
            Collation::Binary => a.cmp(b),
            Collation::NoCase => a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase()),
            Collation::RTrim => a.trim_end().cmp(b.trim_end()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListOrder {
    pub collation: String,
    pub prefer_object: bool,
}

#[derive(Debug, Clone)]
pub enum ListEntry {
    Object(ObjectSummary),
    Directory { name: String },
}

impl ListEntry {
    fn name(&self) -> String {
        match self {
            ListEntry::Object(o) => ObjectPath::parse(o.full_path.clone())
                .map(|p| p.basename())
                .unwrap_or_default(),
            ListEntry::Directory { name } => name.clone(),
        }
    }

    fn is_object(&self) -> bool {
        matches!(self, ListEntry::Object(_))
    }
}

#[derive(Debug, Clone)]
pub struct ListOptions {
    pub dir: DirPath,
    pub is_object: Option<bool>,
    pub skip: usize,
    pub take: usize,
    pub order: ListOrder,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub dir: DirPath,
    pub query: String,
    pub skip: usize,
    pub take: usize,
    pub recursive: bool,
    pub score_threshold: f64,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub object: ObjectSummary,
    pub score: f64,
}

pub struct Metadata {
    gateway: SqliteGateway,
    fts_dirty: Arc<AtomicBool>,
    collations: Vec<String>,
}

impl Metadata {
    pub async fn open(gateway: SqliteGateway) -> Result<Self> {
        gateway
            .call(|conn| {
                apply_pragmas(conn)?;
                conn.execute_batch(MIGRATIONS)?;
                set_meta(conn, "schema_version", &SCHEMA_VERSION.to_string())?;
                Ok(())
            })
            .await?;

        let collations = gateway
            .call(|conn| {
                let mut stmt = conn.prepare("PRAGMA collation_list")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
                let mut names = Vec::new();
                for row in rows {
                    names.push(row?);
                }
                Ok(names)
            })
            .await?;

        Ok(Self {
            gateway,
            fts_dirty: Arc::new(AtomicBool::new(false)),
            collations,
        })
    }

    fn mark_fts_dirty(&self) {
        self.fts_dirty.store(true, AtomicOrdering::SeqCst);
    }

    // ---- create / createExclusive -----------------------------------

    pub async fn create(&self, inp: CreateInput) -> Result<ObjectId> {
        crate::types::validate_object_size(inp.size, inp.num_parts, inp.part_size)?;
        let object_id = ObjectId::new();
        let dirty = !inp.description.is_none();
        let row = PreparedRow::from_create(&inp, object_id)?;

        self.gateway
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO metadata_v1
                        (objectid, fullpath, path_key, path_seg, rec_type, rec_time,
                         obj_size, numparts, partsize, mime_typ, new_time, mod_time,
                         hash_md5, md5state, obj_tags, desc_fts, usermeta, entityid)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)
                     ON CONFLICT(path_key) DO UPDATE SET
                        objectid=excluded.objectid,
                        fullpath=excluded.fullpath,
                        path_seg=excluded.path_seg,
                        rec_type=excluded.rec_type,
                        rec_time=excluded.rec_time,
                        obj_size=excluded.obj_size,
                        numparts=excluded.numparts,
                        partsize=excluded.partsize,
                        mime_typ=excluded.mime_typ,
                        mod_time=excluded.mod_time,
                        hash_md5=excluded.hash_md5,
                        md5state=excluded.md5state,
                        obj_tags=excluded.obj_tags,
                        desc_fts=excluded.desc_fts,
                        usermeta=excluded.usermeta,
                        entityid=excluded.entityid",
                    row.params(),
                )?;
                Ok(())
            })
            .await?;

        if dirty {
            self.mark_fts_dirty();
        }
        Ok(object_id)
    }

    pub async fn create_exclusive(&self, inp: CreateInput) -> Result<ObjectId> {
        crate::types::validate_object_size(inp.size, inp.num_parts, inp.part_size)?;
        let object_id = ObjectId::new();
        let dirty = !inp.description.is_none();
        let row = PreparedRow::from_create(&inp, object_id)?;
        let path_str = inp.path.as_str().to_string();

        self.gateway
            .call(move |conn| {
                let result = conn.execute(
                    "INSERT INTO metadata_v1
                        (objectid, fullpath, path_key, path_seg, rec_type, rec_time,
                         obj_size, numparts, partsize, mime_typ, new_time, mod_time,
                         hash_md5, md5state, obj_tags, desc_fts, usermeta, entityid)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)",
                    row.params(),
                );
                match result {
                    Ok(_) => Ok(()),
                    Err(err) => Err(classify_unique_violation(err, &path_str)),
                }
            })
            .await?;

        if dirty {
            self.mark_fts_dirty();
        }
        Ok(object_id)
    }

    // ---- read --------------------------------------------------------

    pub async fn read(&self, path: ObjectPath) -> Result<ObjectSummary> {
        let path_str = path.as_str().to_string();
        self.gateway
            .call(move |conn| {
                let row = conn
                    .query_row(
                        &select_summary_sql("WHERE rec_type != 'DELETE' AND path_key = ?1"),
                        params![path_str],
                        row_to_summary,
                    )
                    .optional()?;
                row.ok_or_else(|| OmnioError::ObjectNotFound {
                    path: path_str.clone(),
                })
            })
            .await
    }

    pub async fn read_detail(&self, path: ObjectPath) -> Result<ObjectDetail> {
        let path_str = path.as_str().to_string();
        self.gateway
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT obj_size, hash_md5, md5state, entityid, numparts, partsize
                         FROM metadata_v1 WHERE path_key = ?1",
                        params![path_str],
                        |row| {
                            let size: i64 = row.get(0)?;
                            let hash_md5: String = row.get(1)?;
                            let md5state: String = row.get(2)?;
                            let entityid: String = row.get(3)?;
                            let numparts: i64 = row.get(4)?;
                            let partsize: i64 = row.get(5)?;
                            Ok((size, hash_md5, md5state, entityid, numparts, partsize))
                        },
                    )
                    .optional()?;
                let (size, hash_md5, md5state, entityid, numparts, partsize) =
                    row.ok_or_else(|| OmnioError::ObjectNotFound {
                        path: path_str.clone(),
                    })?;
                let words: Vec<i64> = serde_json::from_str(&md5state)?;
                let hash_state = HashState::from_words(&words).ok_or(OmnioError::InvalidInput {
                    field: "md5state".into(),
                    reason: "malformed hash state".into(),
                })?;
                Ok(ObjectDetail {
                    size: size as u64,
                    checksum: Checksum::from_hex(hash_md5)?,
                    hash_state,
                    entity_id: EntityId::parse(&entityid)?,
                    num_parts: numparts as u32,
                    part_size: partsize as u64,
                })
            })
            .await
    }

    pub async fn read_in_trash(&self, object_id: ObjectId) -> Result<EntityId> {
        self.gateway
            .call(move |conn| {
                let entityid: Option<String> = conn
                    .query_row(
                        "SELECT entityid FROM metadata_v1 WHERE objectid = ?1 AND rec_type = 'DELETE'",
                        params![object_id.to_string()],
                        |row| row.get(0),
                    )
                    .optional()?;
                let entityid = entityid.ok_or_else(|| OmnioError::ObjectNotFound {
                    path: object_id.to_string(),
                })?;
                EntityId::parse(&entityid)
            })
            .await
    }

    // ---- exists / stat -------------------------------------------------

    pub async fn exists_object(&self, path: ObjectPath) -> Result<bool> {
        let path_str = path.as_str().to_string();
        self.gateway
            .call(move |conn| {
                let found: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM metadata_v1 WHERE rec_type != 'DELETE' AND path_key = ?1",
                        params![path_str],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(found.is_some())
            })
            .await
    }

    pub async fn exists_dir(&self, dir: DirPath) -> Result<bool> {
        if dir.is_root() {
            return Ok(true);
        }
        let depth = dir.depth() as i64;
        let prefix = like_prefix(&dir);
        self.gateway
            .call(move |conn| {
                let found: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM metadata_v1
                         WHERE rec_type != 'DELETE'
                           AND json_array_length(path_seg) > ?1
                           AND fullpath LIKE ?2 ESCAPE '\\'
                         LIMIT 1",
                        params![depth, prefix],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(found.is_some())
            })
            .await
    }

    pub async fn stat(&self, path: ObjectPath) -> Result<Stat> {
        let path_str = path.as_str().to_string();
        let prefix = format!("{}{}", escape_like(&path_str), "/%");
        self.gateway
            .call(move |conn| {
                let is_object: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM metadata_v1 WHERE rec_type != 'DELETE' AND path_key = ?1)",
                    params![path_str],
                    |row| row.get(0),
                )?;
                let is_directory: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM metadata_v1 WHERE rec_type != 'DELETE' AND fullpath LIKE ?1 ESCAPE '\\')",
                    params![prefix],
                    |row| row.get(0),
                )?;
                Ok(Stat {
                    is_object,
                    is_directory,
                })
            })
            .await
    }

    // ---- list ----------------------------------------------------------

    pub async fn list(&self, opts: ListOptions) -> Result<Vec<ListEntry>> {
        let collation = Collation::parse(&opts.order.collation)?;
        if !self
            .collations
            .iter()
            .any(|c| c.eq_ignore_ascii_case(collation.sql_name()))
        {
            return Err(OmnioError::InvalidCollation {
                collation: opts.order.collation.clone(),
            });
        }

        let depth = (opts.dir.depth() + 1) as i64;
        let prefix = like_prefix(&opts.dir);
        let is_root = opts.dir.is_root();

        let want_objects = opts.is_object != Some(false);
        let want_dirs = opts.is_object != Some(true);
        let dir_depth = opts.dir.depth() as i64;

        let mut entries = self
            .gateway
            .call(move |conn| {
                let mut out = Vec::new();
                if want_objects {
                    let sql = if is_root {
                        select_summary_sql("WHERE rec_type != 'DELETE' AND json_array_length(path_seg) = ?1")
                    } else {
                        select_summary_sql(
                            "WHERE rec_type != 'DELETE' AND json_array_length(path_seg) = ?1 AND fullpath LIKE ?2 ESCAPE '\\'",
                        )
                    };
                    let mut stmt = conn.prepare(&sql)?;
                    let rows: Vec<ObjectSummary> = if is_root {
                        stmt.query_map(params![depth], row_to_summary)?
                            .collect::<rusqlite::Result<_>>()?
                    } else {
                        stmt.query_map(params![depth, prefix], row_to_summary)?
                            .collect::<rusqlite::Result<_>>()?
                    };
                    out.extend(rows.into_iter().map(ListEntry::Object));
                }
                if want_dirs {
                    let idx = dir_depth;
                    let sql = if is_root {
                        format!(
                            "SELECT DISTINCT json_extract(path_seg, '$[' || ?1 || ']') AS name
                             FROM metadata_v1
                             WHERE rec_type != 'DELETE' AND json_array_length(path_seg) > ?2"
                        )
                    } else {
                        format!(
                            "SELECT DISTINCT json_extract(path_seg, '$[' || ?1 || ']') AS name
                             FROM metadata_v1
                             WHERE rec_type != 'DELETE' AND json_array_length(path_seg) > ?2
                               AND fullpath LIKE ?3 ESCAPE '\\'"
                        )
                    };
                    let mut stmt = conn.prepare(&sql)?;
                    let names: Vec<String> = if is_root {
                        stmt.query_map(params![idx, depth], |row| row.get::<_, String>(0))?
                            .collect::<rusqlite::Result<_>>()?
                    } else {
                        stmt.query_map(params![idx, depth, prefix], |row| row.get::<_, String>(0))?
                            .collect::<rusqlite::Result<_>>()?
                    };
                    out.extend(names.into_iter().map(|name| ListEntry::Directory { name }));
                }
                Ok(out)
            })
            .await?;

        entries.sort_by(|a, b| {
            let a_is_obj = a.is_object();
            let b_is_obj = b.is_object();
            let by_kind = if opts.order.prefer_object {
                b_is_obj.cmp(&a_is_obj)
            } else {
                a_is_obj.cmp(&b_is_obj)
            };
            by_kind.then_with(|| collation.cmp(&a.name(), &b.name()))
        });

        Ok(entries
            .into_iter()
            .skip(opts.skip)
            .take(opts.take)
            .collect())
    }

    pub async fn list_in_trash(&self, opts: ListOptions) -> Result<Vec<ListEntry>> {
        // Trashed rows keep `fullpath`/`path_seg`; only `path_key` is
        // nulled, so the same depth/prefix/union shape as `list` applies,
        // restricted to DELETE rows.
        let depth = (opts.dir.depth() + 1) as i64;
        let prefix = like_prefix(&opts.dir);
        let is_root = opts.dir.is_root();
        let dir_depth = opts.dir.depth() as i64;

        let want_objects = opts.is_object != Some(false);
        let want_dirs = opts.is_object != Some(true);

        let mut entries = self
            .gateway
            .call(move |conn| {
                let mut out = Vec::new();
                if want_objects {
                    let sql = if is_root {
                        select_summary_sql("WHERE rec_type = 'DELETE' AND json_array_length(path_seg) = ?1")
                    } else {
                        select_summary_sql(
                            "WHERE rec_type = 'DELETE' AND json_array_length(path_seg) = ?1 AND fullpath LIKE ?2 ESCAPE '\\'",
                        )
                    };
                    let mut stmt = conn.prepare(&sql)?;
                    let rows: Vec<ObjectSummary> = if is_root {
                        stmt.query_map(params![depth], row_to_summary)?
                            .collect::<rusqlite::Result<_>>()?
                    } else {
                        stmt.query_map(params![depth, prefix], row_to_summary)?
                            .collect::<rusqlite::Result<_>>()?
                    };
                    out.extend(rows.into_iter().map(ListEntry::Object));
                }
                if want_dirs {
                    let idx = dir_depth;
                    let sql = if is_root {
                        format!(
                            "SELECT DISTINCT json_extract(path_seg, '$[' || ?1 || ']') AS name
                             FROM metadata_v1
                             WHERE rec_type = 'DELETE' AND json_array_length(path_seg) > ?2"
                        )
                    } else {
                        format!(
                            "SELECT DISTINCT json_extract(path_seg, '$[' || ?1 || ']') AS name
                             FROM metadata_v1
                             WHERE rec_type = 'DELETE' AND json_array_length(path_seg) > ?2
                               AND fullpath LIKE ?3 ESCAPE '\\'"
                        )
                    };
                    let mut stmt = conn.prepare(&sql)?;
                    let names: Vec<String> = if is_root {
                        stmt.query_map(params![idx, depth], |row| row.get::<_, String>(0))?
                            .collect::<rusqlite::Result<_>>()?
                    } else {
                        stmt.query_map(params![idx, depth, prefix], |row| row.get::<_, String>(0))?
                            .collect::<rusqlite::Result<_>>()?
                    };
                    out.extend(names.into_iter().map(|name| ListEntry::Directory { name }));
                }
                Ok(out)
            })
            .await?;

        let collation = Collation::parse(&opts.order.collation).unwrap_or(Collation::Binary);
        entries.sort_by(|a, b| {
            let a_is_obj = a.is_object();
            let b_is_obj = b.is_object();
            let by_kind = if opts.order.prefer_object {
                b_is_obj.cmp(&a_is_obj)
            } else {
                a_is_obj.cmp(&b_is_obj)
            };
            by_kind.then_with(|| collation.cmp(&a.name(), &b.name()))
        });
        Ok(entries.into_iter().skip(opts.skip).take(opts.take).collect())
    }

    // ---- search ----------------------------------------------------------

    pub async fn search(&self, opts: SearchOptions) -> Result<Vec<SearchHit>> {
        if self.fts_dirty.swap(false, AtomicOrdering::SeqCst) {
            self.rebuild_fts_index().await?;
        }

        let depth_op = if opts.recursive { ">=" } else { "=" };
        let depth = (opts.dir.depth() + 1) as i64;
        let prefix = like_prefix(&opts.dir);
        let is_root = opts.dir.is_root();
        let query = opts.query.clone();

        self.gateway
            .call(move |conn| {
                let sql = format!(
                    "SELECT {cols}, bm25(metadata_fts) AS score
                     FROM metadata_v1
                     JOIN metadata_fts ON metadata_fts.objectid = metadata_v1.objectid
                     WHERE metadata_v1.rec_type != 'DELETE'
                       AND json_array_length(metadata_v1.path_seg) {depth_op} ?1
                       {prefix_clause}
                       AND metadata_fts MATCH ?{query_idx}
                     ORDER BY score ASC",
                    cols = summary_columns_qualified("metadata_v1"),
                    depth_op = depth_op,
                    prefix_clause = if is_root {
                        ""
                    } else {
                        "AND metadata_v1.fullpath LIKE ?2 ESCAPE '\\'"
                    },
                    query_idx = if is_root { 2 } else { 3 },
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut hits = Vec::new();
                let mut rows = if is_root {
                    stmt.query(params![depth, query])?
                } else {
                    stmt.query(params![depth, prefix, query])?
                };
                while let Some(row) = rows.next()? {
                    let summary = row_to_summary(row)?;
                    // bm25() returns a negative score, more negative is
                    // a better match; invert so higher-is-better sorting
                    // works the normal way.
                    let raw_score: f64 = row.get(SUMMARY_COLUMN_COUNT)?;
                    let score = -raw_score;
                    if score >= opts.score_threshold {
                        hits.push(SearchHit { object: summary, score });
                    }
                }
                hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
                Ok(hits.into_iter().skip(opts.skip).take(opts.take).collect())
            })
            .await
    }

    async fn rebuild_fts_index(&self) -> Result<()> {
        self.gateway
            .call(|conn| {
                conn.execute("DELETE FROM metadata_fts", [])?;
                conn.execute(
                    "INSERT INTO metadata_fts (objectid, fullpath, desc_fts)
                     SELECT objectid, fullpath, desc_fts FROM metadata_v1
                     WHERE rec_type != 'DELETE' AND desc_fts IS NOT NULL",
                    [],
                )?;
                Ok(())
            })
            .await
    }

    // ---- move / copy -------------------------------------------------

    pub async fn move_object(&self, src: ObjectPath, dst: ObjectPath) -> Result<()> {
        let src_str = src.as_str().to_string();
        let dst_str = dst.as_str().to_string();
        let dst_seg = json_array(dst.segments());
        self.gateway
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM metadata_v1 WHERE path_key = ?1 AND rec_type != 'DELETE'",
                    params![dst_str],
                )?;
                let updated = tx.execute(
                    "UPDATE metadata_v1 SET fullpath = ?1, path_key = ?1, path_seg = ?2
                     WHERE path_key = ?3 AND rec_type != 'DELETE'",
                    params![dst_str, dst_seg, src_str],
                )?;
                if updated == 0 {
                    return Err(OmnioError::ObjectNotFound {
                        path: src_str.clone(),
                    });
                }
                tx.commit()?;
                Ok(())
            })
            .await
    }

    pub async fn move_exclusive(&self, src: ObjectPath, dst: ObjectPath) -> Result<()> {
        let src_str = src.as_str().to_string();
        let dst_str = dst.as_str().to_string();
        let dst_seg = json_array(dst.segments());
        self.gateway
            .call(move |conn| {
                let result = conn.execute(
                    "UPDATE metadata_v1 SET fullpath = ?1, path_key = ?1, path_seg = ?2
                     WHERE path_key = ?3 AND rec_type != 'DELETE'",
                    params![dst_str, dst_seg, src_str],
                );
                match result {
                    Ok(0) => Err(OmnioError::ObjectNotFound {
                        path: src_str.clone(),
                    }),
                    Ok(_) => Ok(()),
                    Err(err) => Err(classify_unique_violation(err, &dst_str)),
                }
            })
            .await
    }

    pub async fn copy(
        &self,
        src: ObjectPath,
        dst: ObjectPath,
        dst_entity_id: EntityId,
        timestamp: Option<OffsetDateTime>,
    ) -> Result<ObjectId> {
        let object_id = ObjectId::new();
        let now = format_time(timestamp);
        let src_str = src.as_str().to_string();
        let dst_str = dst.as_str().to_string();
        let dst_seg = json_array(dst.segments());
        let entity_str = dst_entity_id.to_string();

        self.gateway
            .call(move |conn| {
                let updated = conn.execute(
                    "INSERT INTO metadata_v1
                        (objectid, fullpath, path_key, path_seg, rec_type, rec_time,
                         obj_size, numparts, partsize, mime_typ, new_time, mod_time,
                         hash_md5, md5state, obj_tags, desc_fts, usermeta, entityid)
                     SELECT ?1, ?2, ?2, ?3, rec_type, ?4,
                            obj_size, numparts, partsize, mime_typ, ?4, ?4,
                            hash_md5, md5state, obj_tags, desc_fts, usermeta, ?5
                     FROM metadata_v1 WHERE path_key = ?6 AND rec_type != 'DELETE'
                     ON CONFLICT(path_key) DO UPDATE SET
                        objectid=excluded.objectid,
                        fullpath=excluded.fullpath,
                        path_seg=excluded.path_seg,
                        rec_type=excluded.rec_type,
                        rec_time=excluded.rec_time,
                        obj_size=excluded.obj_size,
                        numparts=excluded.numparts,
                        partsize=excluded.partsize,
                        mime_typ=excluded.mime_typ,
                        mod_time=excluded.mod_time,
                        hash_md5=excluded.hash_md5,
                        md5state=excluded.md5state,
                        obj_tags=excluded.obj_tags,
                        desc_fts=excluded.desc_fts,
                        usermeta=excluded.usermeta,
                        entityid=excluded.entityid",
                    params![object_id.to_string(), dst_str, dst_seg, now, entity_str, src_str],
                )?;
                if updated == 0 {
                    return Err(OmnioError::ObjectNotFound {
                        path: src_str.clone(),
                    });
                }
                Ok(())
            })
            .await?;
        self.mark_fts_dirty();
        Ok(object_id)
    }

    pub async fn copy_exclusive(
        &self,
        src: ObjectPath,
        dst: ObjectPath,
        dst_entity_id: EntityId,
        timestamp: Option<OffsetDateTime>,
    ) -> Result<ObjectId> {
        let object_id = ObjectId::new();
        let now = format_time(timestamp);
        let src_str = src.as_str().to_string();
        let dst_str = dst.as_str().to_string();
        let dst_seg = json_array(dst.segments());
        let entity_str = dst_entity_id.to_string();

        self.gateway
            .call(move |conn| {
                let result = conn.execute(
                    "INSERT INTO metadata_v1
                        (objectid, fullpath, path_key, path_seg, rec_type, rec_time,
                         obj_size, numparts, partsize, mime_typ, new_time, mod_time,
                         hash_md5, md5state, obj_tags, desc_fts, usermeta, entityid)
                     SELECT ?1, ?2, ?2, ?3, rec_type, ?4,
                            obj_size, numparts, partsize, mime_typ, ?4, ?4,
                            hash_md5, md5state, obj_tags, desc_fts, usermeta, ?5
                     FROM metadata_v1 WHERE path_key = ?6 AND rec_type != 'DELETE'",
                    params![object_id.to_string(), dst_str, dst_seg, now, entity_str, src_str],
                );
                match result {
                    Ok(0) => Err(OmnioError::ObjectNotFound {
                        path: src_str.clone(),
                    }),
                    Ok(_) => Ok(()),
                    Err(err) => Err(classify_unique_violation(err, &dst_str)),
                }
            })
            .await?;
        self.mark_fts_dirty();
        Ok(object_id)
    }

    // ---- update --------------------------------------------------------

    pub async fn update(&self, inp: UpdateInput) -> Result<()> {
        let path_str = inp.path.as_str().to_string();
        let touches_description = inp.description.is_some();

        if inp.mime_type.is_none()
            && inp.object_tags.is_none()
            && inp.description.is_none()
            && inp.user_metadata.is_none()
        {
            let found = self.exists_object(inp.path.clone()).await?;
            if !found {
                return Err(OmnioError::ObjectNotFound { path: path_str });
            }
            return Ok(());
        }

        let now = format_time(inp.timestamp);
        let mime_type = inp.mime_type;
        let object_tags = inp.object_tags.map(|tags| json_array(&tags));
        let description = inp.description;
        let user_metadata = match inp.user_metadata {
            Some(Some(value)) => Some(Some(serde_json::to_string(&value)?)),
            Some(None) => Some(None),
            None => None,
        };

        self.gateway
            .call(move |conn| {
                let mut sets = vec!["rec_type = 'UPDATE_METADATA'".to_string(), "rec_time = ?1".to_string(), "mod_time = ?1".to_string()];
                let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(now.clone())];
                let mut idx = 2;
                if let Some(v) = mime_type {
                    sets.push(format!("mime_typ = ?{idx}"));
                    args.push(Box::new(v));
                    idx += 1;
                }
                if let Some(v) = object_tags {
                    sets.push(format!("obj_tags = ?{idx}"));
                    args.push(Box::new(v));
                    idx += 1;
                }
                if let Some(v) = description {
                    sets.push(format!("desc_fts = ?{idx}"));
                    args.push(Box::new(v));
                    idx += 1;
                }
                if let Some(v) = user_metadata {
                    sets.push(format!("usermeta = ?{idx}"));
                    args.push(Box::new(v));
                    idx += 1;
                }
                let where_idx = idx;
                args.push(Box::new(path_str.clone()));
                let sql = format!(
                    "UPDATE metadata_v1 SET {} WHERE path_key = ?{where_idx} AND rec_type != 'DELETE'",
                    sets.join(", ")
                );
                let params: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
                let updated = conn.execute(&sql, params.as_slice())?;
                if updated == 0 {
                    return Err(OmnioError::ObjectNotFound { path: path_str.clone() });
                }
                Ok(())
            })
            .await?;

        if touches_description {
            self.mark_fts_dirty();
        }
        Ok(())
    }

    pub async fn update_exclusive(&self, inp: UpdateExclusiveInput) -> Result<()> {
        let path_str = inp.path.as_str().to_string();
        let now = format_time(inp.timestamp);
        let expect_checksum = inp.expect_checksum.as_str().to_string();
        let checksum = inp.checksum.as_str().to_string();
        let md5state = serde_json::to_string(&inp.hash_state.to_words())?;
        let entity_id = inp.entity_id.map(|e| e.to_string());
        let mime_type = inp.mime_type.clone();
        let num_parts = inp.num_parts as i64;
        let part_size = inp.part_size as i64;
        let object_size = inp.object_size as i64;
        let object_tags = inp.object_tags.as_ref().map(|t| json_array(t));
        let description = inp.description.clone();
        let touches_description = description.is_some();
        let user_metadata = match &inp.user_metadata {
            Some(v) => Some(serde_json::to_string(v)?),
            None => None,
        };

        self.gateway
            .call(move |conn| {
                let tx = conn.transaction()?;
                let result: Result<()> = (|| {
                    let mut sets = vec![
                        "rec_type = 'UPDATE_METADATA'".to_string(),
                        "rec_time = ?1".to_string(),
                        "mod_time = ?1".to_string(),
                        "hash_md5 = ?2".to_string(),
                        "md5state = ?3".to_string(),
                        "numparts = ?4".to_string(),
                        "partsize = ?5".to_string(),
                        "obj_size = ?6".to_string(),
                    ];
                    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![
                        Box::new(now.clone()),
                        Box::new(checksum.clone()),
                        Box::new(md5state.clone()),
                        Box::new(num_parts),
                        Box::new(part_size),
                        Box::new(object_size),
                    ];
                    let mut idx = 7;
                    if let Some(v) = &entity_id {
                        sets.push(format!("entityid = ?{idx}"));
                        args.push(Box::new(v.clone()));
                        idx += 1;
                    }
                    if let Some(v) = &mime_type {
                        sets.push(format!("mime_typ = ?{idx}"));
                        args.push(Box::new(v.clone()));
                        idx += 1;
                    }
                    if let Some(v) = &object_tags {
                        sets.push(format!("obj_tags = ?{idx}"));
                        args.push(Box::new(v.clone()));
                        idx += 1;
                    }
                    if let Some(v) = &description {
                        sets.push(format!("desc_fts = ?{idx}"));
                        args.push(Box::new(v.clone()));
                        idx += 1;
                    }
                    if let Some(v) = &user_metadata {
                        sets.push(format!("usermeta = ?{idx}"));
                        args.push(Box::new(v.clone()));
                        idx += 1;
                    }
                    let checksum_guard_idx = idx;
                    args.push(Box::new(expect_checksum.clone()));
                    idx += 1;
                    let path_idx = idx;
                    args.push(Box::new(path_str.clone()));

                    let sql = format!(
                        "UPDATE metadata_v1 SET {} WHERE path_key = ?{path_idx} AND rec_type != 'DELETE' AND hash_md5 = ?{checksum_guard_idx}",
                        sets.join(", ")
                    );
                    let params: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
                    let updated = tx.execute(&sql, params.as_slice())?;
                    if updated == 0 {
                        let exists: bool = tx.query_row(
                            "SELECT EXISTS(SELECT 1 FROM metadata_v1 WHERE path_key = ?1 AND rec_type != 'DELETE')",
                            params![path_str],
                            |row| row.get(0),
                        )?;
                        if exists {
                            return Err(OmnioError::ChecksumMismatch {
                                path: path_str.clone(),
                                expected: expect_checksum.clone(),
                                actual: checksum.clone(),
                            });
                        }
                        return Err(OmnioError::ObjectNotFound { path: path_str.clone() });
                    }
                    Ok(())
                })();

                match result {
                    Ok(()) => {
                        tx.commit()?;
                        Ok(())
                    }
                    Err(err) => {
                        tx.rollback()?;
                        Err(err)
                    }
                }
            })
            .await?;

        if touches_description {
            self.mark_fts_dirty();
        }
        Ok(())
    }

    // ---- trash / delete --------------------------------------------------

    pub async fn trash(
        &self,
        path: ObjectPath,
        timestamp: Option<OffsetDateTime>,
    ) -> Result<(ObjectId, EntityId)> {
        let path_str = path.as_str().to_string();
        let now = format_time(timestamp);
        self.gateway
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "UPDATE metadata_v1 SET
                            rec_type = 'DELETE',
                            path_key = NULL,
                            md5state = NULL,
                            obj_tags = NULL,
                            desc_fts = NULL,
                            usermeta = NULL,
                            obj_size = 0,
                            numparts = 0,
                            partsize = 0,
                            rec_time = ?1
                         WHERE path_key = ?2 AND rec_type != 'DELETE'
                         RETURNING objectid, entityid",
                        params![now, path_str],
                        |row| {
                            let objectid: String = row.get(0)?;
                            let entityid: String = row.get(1)?;
                            Ok((objectid, entityid))
                        },
                    )
                    .optional()?;
                let (objectid, entityid) = row.ok_or_else(|| OmnioError::ObjectNotFound {
                    path: path_str.clone(),
                })?;
                Ok((ObjectId::parse(&objectid)?, EntityId::parse(&entityid)?))
            })
            .await
    }

    pub async fn delete(&self, object_id: ObjectId) -> Result<()> {
        self.gateway
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM metadata_v1 WHERE objectid = ?1",
                    params![object_id.to_string()],
                )?;
                Ok(())
            })
            .await
    }
}

fn set_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

// Column count produced by `summary_columns_qualified`; any column
// appended after it (e.g. a bm25 score) lands at this index.
const SUMMARY_COLUMN_COUNT: usize = 15;

/// The 15 columns `row_to_summary` expects, at the indices it expects
/// them, qualified against `table` so the same list works whether the
/// query is a plain scan or a join against `metadata_fts`.
fn summary_columns_qualified(table: &str) -> String {
    format!(
        "{t}.objectid, {t}.fullpath, {t}.rec_type, {t}.obj_size, {t}.numparts, {t}.partsize,
         {t}.mime_typ, {t}.hash_md5, {t}.obj_tags, {t}.desc_fts, {t}.usermeta, {t}.entityid,
         {rec_ms} AS rec_time_ms, {new_ms} AS new_time_ms, {mod_ms} AS mod_time_ms",
        t = table,
        rec_ms = ms_expr(&format!("{table}.rec_time")),
        new_ms = ms_expr(&format!("{table}.new_time")),
        mod_ms = ms_expr(&format!("{table}.mod_time")),
    )
}

fn select_summary_sql(extra_where: &str) -> String {
    format!(
        "SELECT {cols}
         FROM metadata_v1
         {extra_where}",
        cols = summary_columns_qualified("metadata_v1"),
        extra_where = extra_where,
    )
}

fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<ObjectSummary> {
    let objectid: String = row.get(0)?;
    let fullpath: String = row.get(1)?;
    let rec_type: String = row.get(2)?;
    let obj_size: i64 = row.get(3)?;
    let numparts: i64 = row.get(4)?;
    let partsize: i64 = row.get(5)?;
    let mime_typ: Option<String> = row.get(6)?;
    let hash_md5: Option<String> = row.get(7)?;
    let obj_tags: Option<String> = row.get(8)?;
    let desc_fts: Option<String> = row.get(9)?;
    let usermeta: Option<String> = row.get(10)?;
    let entityid: String = row.get(11)?;
    let rec_time_ms: i64 = row.get(12)?;
    let new_time_ms: i64 = row.get(13)?;
    let mod_time_ms: i64 = row.get(14)?;

    let tags: Vec<String> = obj_tags
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e)))?
        .unwrap_or_default();
    let user_metadata: Option<Value> = usermeta
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e)))?;

    Ok(ObjectSummary {
        object_id: ObjectId::parse(&objectid)
            .map_err(|_| rusqlite::Error::InvalidColumnType(0, "objectid".into(), rusqlite::types::Type::Text))?,
        full_path: fullpath,
        rec_type: RecType::from_sql(&rec_type).unwrap_or(RecType::Create),
        rec_time_ms,
        size: obj_size as u64,
        num_parts: numparts as u32,
        part_size: partsize as u64,
        mime_type: mime_typ,
        new_time_ms,
        mod_time_ms,
        checksum: hash_md5.and_then(|h| Checksum::from_hex(h).ok()),
        object_tags: tags,
        description: desc_fts,
        user_metadata,
        entity_id: EntityId::parse(&entityid)
            .map_err(|_| rusqlite::Error::InvalidColumnType(11, "entityid".into(), rusqlite::types::Type::Text))?,
    })
}

struct PreparedRow {
    objectid: String,
    fullpath: String,
    path_key: String,
    path_seg: String,
    rec_type: &'static str,
    rec_time: String,
    obj_size: i64,
    numparts: i64,
    partsize: i64,
    mime_typ: Option<String>,
    new_time: String,
    mod_time: String,
    hash_md5: Option<String>,
    md5state: Option<String>,
    obj_tags: Option<String>,
    desc_fts: Option<String>,
    usermeta: Option<String>,
    entityid: String,
}

impl PreparedRow {
    fn from_create(inp: &CreateInput, object_id: ObjectId) -> Result<Self> {
        let now = format_time(inp.timestamp);
        let path_str = inp.path.as_str().to_string();
        let segments: Vec<String> = inp.path.segments().into_iter().map(String::from).collect();
        Ok(Self {
            objectid: object_id.to_string(),
            fullpath: path_str.clone(),
            path_key: path_str,
            path_seg: json_array(&segments),
            rec_type: RecType::Create.as_sql(),
            rec_time: now.clone(),
            obj_size: inp.size as i64,
            numparts: inp.num_parts as i64,
            partsize: inp.part_size as i64,
            mime_typ: inp.mime_type.clone(),
            new_time: now.clone(),
            mod_time: now,
            hash_md5: inp.checksum.as_ref().map(|c| c.as_str().to_string()),
            md5state: inp
                .hash_state
                .as_ref()
                .map(|s| serde_json::to_string(&s.to_words()))
                .transpose()?,
            obj_tags: Some(json_array(&inp.object_tags)),
            desc_fts: inp.description.clone(),
            usermeta: inp
                .user_metadata
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            entityid: inp.entity_id.to_string(),
        })
    }

    fn params(&self) -> [&dyn rusqlite::ToSql; 18] {
        [
            &self.objectid,
            &self.fullpath,
            &self.path_key,
            &self.path_seg,
            &self.rec_type,
            &self.rec_time,
            &self.obj_size,
            &self.numparts,
            &self.partsize,
            &self.mime_typ,
            &self.new_time,
            &self.mod_time,
            &self.hash_md5,
            &self.md5state,
            &self.obj_tags,
            &self.desc_fts,
            &self.usermeta,
            &self.entityid,
        ]
    }
}

fn json_array<S: AsRef<str>>(items: impl IntoIterator<Item = S>) -> String {
    let values: Vec<String> = items.into_iter().map(|s| s.as_ref().to_string()).collect();
    serde_json::to_string(&values).unwrap_or_else(|_| "[]".to_string())
}

fn like_prefix(dir: &DirPath) -> String {
    format!("{}/%", escape_like(&dir.0.join("/")))
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn format_time(ts: Option<OffsetDateTime>) -> String {
    ts.unwrap_or_else(OffsetDateTime::now_utc)
        .format(&Rfc3339)
        .unwrap_or_default()
}

fn classify_unique_violation(err: rusqlite::Error, path: &str) -> OmnioError {
    if let rusqlite::Error::SqliteFailure(ffi_err, Some(msg)) = &err {
        if ffi_err.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains("path_key") {
            return OmnioError::ObjectExists {
                path: path.to_string(),
            };
        }
    }
    OmnioError::Sql(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Md5Hasher;
    use tempfile::tempdir;

    async fn open_metadata() -> (Metadata, crate::db::GatewayHandle, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let handle = SqliteGateway::open(dir.path().join("meta.db")).unwrap();
        let metadata = Metadata::open(handle.gateway.clone()).await.unwrap();
        (metadata, handle, dir)
    }

    fn checksum_of(data: &[u8]) -> (Checksum, HashState) {
        let mut h = Md5Hasher::new();
        h.update(data);
        (h.digest(), h.export_state())
    }

    #[tokio::test]
    async fn create_then_read_round_trips() {
        let (meta, _handle, _dir) = open_metadata().await;
        let (checksum, state) = checksum_of(b"foo");
        let inp = CreateInput {
            path: ObjectPath::parse("file.txt").unwrap(),
            entity_id: EntityId::new(),
            size: 3,
            num_parts: 1,
            part_size: 7,
            checksum: Some(checksum.clone()),
            hash_state: Some(state),
            mime_type: Some("text/plain".to_string()),
            object_tags: vec![],
            description: None,
            user_metadata: None,
            timestamp: None,
        };
        meta.create(inp).await.unwrap();

        let summary = meta.read(ObjectPath::parse("file.txt").unwrap()).await.unwrap();
        assert_eq!(summary.checksum, Some(checksum));
        assert_eq!(summary.size, 3);
        assert_eq!(summary.mime_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn create_exclusive_rejects_duplicate_path() {
        let (meta, _handle, _dir) = open_metadata().await;
        let (checksum, state) = checksum_of(b"x");
        let inp = CreateInput {
            path: ObjectPath::parse("file.txt").unwrap(),
            entity_id: EntityId::new(),
            size: 1,
            num_parts: 1,
            part_size: 7,
            checksum: Some(checksum),
            hash_state: Some(state),
            mime_type: None,
            object_tags: vec![],
            description: None,
            user_metadata: None,
            timestamp: None,
        };
        meta.create(inp.clone()).await.unwrap();
        let result = meta.create_exclusive(inp).await;
        assert!(matches!(result, Err(OmnioError::ObjectExists { .. })));
    }

    #[tokio::test]
    async fn trash_then_delete_removes_row() {
        let (meta, _handle, _dir) = open_metadata().await;
        let (checksum, state) = checksum_of(b"a");
        let inp = CreateInput {
            path: ObjectPath::parse("a.txt").unwrap(),
            entity_id: EntityId::new(),
            size: 1,
            num_parts: 1,
            part_size: 7,
            checksum: Some(checksum),
            hash_state: Some(state),
            mime_type: None,
            object_tags: vec![],
            description: None,
            user_metadata: None,
            timestamp: None,
        };
        meta.create(inp).await.unwrap();

        let (object_id, _entity_id) = meta.trash(ObjectPath::parse("a.txt").unwrap(), None).await.unwrap();
        let read_err = meta.read(ObjectPath::parse("a.txt").unwrap()).await;
        assert!(matches!(read_err, Err(OmnioError::ObjectNotFound { .. })));

        meta.delete(object_id).await.unwrap();
        let in_trash = meta.read_in_trash(object_id).await;
        assert!(in_trash.is_err());
    }

    #[tokio::test]
    async fn list_objects_at_depth_matches_prefix() {
        let (meta, _handle, _dir) = open_metadata().await;
        for name in ["i/j/x1.txt", "i/j/x2.txt", "i/other.txt"] {
            let (checksum, state) = checksum_of(b"x");
            meta.create(CreateInput {
                path: ObjectPath::parse(name).unwrap(),
                entity_id: EntityId::new(),
                size: 1,
                num_parts: 1,
                part_size: 7,
                checksum: Some(checksum),
                hash_state: Some(state),
                mime_type: None,
                object_tags: vec![],
                description: None,
                user_metadata: None,
                timestamp: None,
            })
            .await
            .unwrap();
        }

        let entries = meta
            .list(ListOptions {
                dir: DirPath(vec!["i".to_string(), "j".to_string()]),
                is_object: Some(true),
                skip: 0,
                take: 100,
                order: ListOrder {
                    collation: "BINARY".to_string(),
                    prefer_object: true,
                },
            })
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn search_ranks_by_bm25_descending() {
        let (meta, _handle, _dir) = open_metadata().await;
        let docs = [
            ("i/j/x1.txt", "foo foo foo bar baz"),
            ("i/j/x2.txt", "foo foo bar bar"),
            ("i/j/x3.txt", "foo"),
        ];
        for (path, desc) in docs {
            let (checksum, state) = checksum_of(b"x");
            meta.create(CreateInput {
                path: ObjectPath::parse(path).unwrap(),
                entity_id: EntityId::new(),
                size: 1,
                num_parts: 1,
                part_size: 7,
                checksum: Some(checksum),
                hash_state: Some(state),
                mime_type: None,
                object_tags: vec![],
                description: Some(desc.to_string()),
                user_metadata: None,
                timestamp: None,
            })
            .await
            .unwrap();
        }

        let hits = meta
            .search(SearchOptions {
                dir: DirPath(vec!["i".to_string(), "j".to_string()]),
                query: "foo".to_string(),
                skip: 0,
                take: 10,
                recursive: false,
                score_threshold: f64::MIN,
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].object.full_path, "i/j/x1.txt");

        let non_recursive = meta
            .search(SearchOptions {
                dir: DirPath(vec!["i".to_string()]),
                query: "foo".to_string(),
                skip: 0,
                take: 10,
                recursive: false,
                score_threshold: f64::MIN,
            })
            .await
            .unwrap();
        assert!(non_recursive.is_empty());
    }
}
