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

//! The observable error taxonomy, with machine-readable fields attached
//! to each variant.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OmnioError {
    #[error("invalid input for '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("object size too small: expected at least {expected}, got {actual}")]
    ObjectSizeTooSmall { expected: u64, actual: u64 },

    #[error("object size too large: expected at most {expected}, got {actual}")]
    ObjectSizeTooLarge { expected: u64, actual: u64 },

    #[error("unknown collation '{collation}'")]
    InvalidCollation { collation: String },

    #[error("object already exists at '{path}'")]
    ObjectExists { path: String },

    #[error("object not found at '{path}'")]
    ObjectNotFound { path: String },

    #[error("checksum mismatch for '{path}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("entry path not found: '{path}'")]
    EntryPathNotFound { path: String },

    #[error("file system is not open")]
    FileSystemNotOpen,

    #[error("database is not open")]
    DatabaseNotOpen,

    #[error("sql statement is closed")]
    SqlStatementClosed,

    #[error("omnio instance is closed")]
    OmnioClosed,

    #[error("operation aborted")]
    Aborted,

    #[error("sql error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OmnioError>;
