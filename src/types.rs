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

//! Validated value types shared across the catalog, streams, and coordinator.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::error::OmnioError;

pub const MAX_PATH_BYTES: usize = 1024;
pub const MAX_TAG_BYTES: usize = 256;
pub const MAX_DESCRIPTION_BYTES: usize = 65536;

/// Name of the single bucket served by an `Omnio` instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketName(String);

impl BucketName {
    pub fn parse(raw: impl Into<String>) -> Result<Self, OmnioError> {
        let raw = raw.into();
        if raw.is_empty() || raw.len() > 255 {
            return Err(OmnioError::InvalidInput {
                field: "bucket".into(),
                reason: "bucket name must be 1-255 bytes".into(),
            });
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(OmnioError::InvalidInput {
                field: "bucket".into(),
                reason: "bucket name must be alphanumeric, '-', '_' or '.'".into(),
            });
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable UTF-8 object path, 1-1024 bytes, canonicalised at parse time.
///
/// The canonical form is "stored as-received": no normalisation beyond
/// rejecting the empty path and the over-length path, so two distinct
/// byte sequences are never collapsed into the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectPath(String);

impl ObjectPath {
    pub fn parse(raw: impl Into<String>) -> Result<Self, OmnioError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(OmnioError::InvalidInput {
                field: "path".into(),
                reason: "object path must not be empty".into(),
            });
        }
        if raw.len() > MAX_PATH_BYTES {
            return Err(OmnioError::InvalidInput {
                field: "path".into(),
                reason: format!("object path exceeds {MAX_PATH_BYTES} bytes"),
            });
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments split on `/`, empty for the implicit root.
    pub fn segments(&self) -> Vec<&str> {
        self.0.split('/').filter(|s| !s.is_empty()).collect()
    }

    pub fn dirname(&self) -> String {
        let segs = self.segments();
        if segs.len() <= 1 {
            String::new()
        } else {
            segs[..segs.len() - 1].join("/")
        }
    }

    pub fn basename(&self) -> String {
        self.segments().last().map(|s| s.to_string()).unwrap_or_default()
    }

    /// Alias for `basename`, kept as a distinct derived field; the two
    /// coincide because Omnio has no separate "filename without
    /// trailing slash" concept.
    pub fn filename(&self) -> String {
        self.basename()
    }

    pub fn extname(&self) -> String {
        let base = self.basename();
        match base.rfind('.') {
            Some(idx) if idx > 0 => base[idx..].to_string(),
            _ => String::new(),
        }
    }

    /// Canonical key used for uniqueness and for the lock manager.
    pub fn path_key(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A directory path expressed as an array of segments (possibly empty
/// for the root). Distinct from `ObjectPath` because directories are
/// synthesized, not stored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirPath(pub Vec<String>);

impl DirPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

/// UUIDv7 identifying a metadata row. Monotonic by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub Uuid);

impl ObjectId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn parse(raw: &str) -> Result<Self, OmnioError> {
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| OmnioError::InvalidInput {
                field: "objectId".into(),
                reason: "not a valid UUID".into(),
            })
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// UUIDv7 identifying a physical content directory under
/// `buckets/<bucket>/entities/<EntityId>/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn parse(raw: &str) -> Result<Self, OmnioError> {
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| OmnioError::InvalidInput {
                field: "entityId".into(),
                reason: "not a valid UUID".into(),
            })
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 32-hex-char MD5 digest of the full object byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    pub fn from_hex(hex: String) -> Result<Self, OmnioError> {
        if hex.len() != 32 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(OmnioError::InvalidInput {
                field: "checksum".into(),
                reason: "checksum must be 32 hex characters".into(),
            });
        }
        Ok(Self(hex.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Record lifecycle tag, `rec_type` in `metadata_v1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecType {
    Create,
    UpdateMetadata,
    Delete,
}

impl RecType {
    pub fn as_sql(self) -> &'static str {
        match self {
            RecType::Create => "CREATE",
            RecType::UpdateMetadata => "UPDATE_METADATA",
            RecType::Delete => "DELETE",
        }
    }

    pub fn from_sql(raw: &str) -> Option<Self> {
        match raw {
            "CREATE" => Some(RecType::Create),
            "UPDATE_METADATA" => Some(RecType::UpdateMetadata),
            "DELETE" => Some(RecType::Delete),
            _ => None,
        }
    }
}

/// The open flag for a write stream: create, append, create-exclusive,
/// append-exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFlag {
    Create,
    Append,
    CreateExclusive,
    AppendExclusive,
}

impl WriteFlag {
    pub fn parse(raw: &str) -> Result<Self, OmnioError> {
        match raw {
            "w" => Ok(WriteFlag::Create),
            "a" => Ok(WriteFlag::Append),
            "wx" => Ok(WriteFlag::CreateExclusive),
            "ax" => Ok(WriteFlag::AppendExclusive),
            _ => Err(OmnioError::InvalidInput {
                field: "flag".into(),
                reason: format!("unknown write flag '{raw}'"),
            }),
        }
    }

    pub fn is_append(self) -> bool {
        matches!(self, WriteFlag::Append | WriteFlag::AppendExclusive)
    }

    pub fn is_exclusive(self) -> bool {
        matches!(self, WriteFlag::CreateExclusive | WriteFlag::AppendExclusive)
    }
}

/// Validates the §3.2-(1) size/part-count relationship.
pub fn validate_object_size(
    size: u64,
    num_parts: u32,
    part_size: u64,
) -> Result<(), OmnioError> {
    if size == 0 {
        if num_parts != 0 {
            return Err(OmnioError::ObjectSizeTooLarge {
                expected: 0,
                actual: size,
            });
        }
        return Ok(());
    }
    if part_size == 0 {
        return Err(OmnioError::InvalidInput {
            field: "partSize".into(),
            reason: "partSize must be greater than zero for non-empty objects".into(),
        });
    }
    let lower = part_size.saturating_mul((num_parts as u64).saturating_sub(1));
    let upper = part_size.saturating_mul(num_parts as u64);
    if size <= lower {
        return Err(OmnioError::ObjectSizeTooSmall {
            expected: lower + 1,
            actual: size,
        });
    }
    if size > upper {
        return Err(OmnioError::ObjectSizeTooLarge {
            expected: upper,
            actual: size,
        });
    }
    Ok(())
}

pub fn num_parts_for(size: u64, part_size: u64) -> u32 {
    if size == 0 {
        0
    } else {
        (size.div_ceil(part_size)) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_rejects_empty_and_oversize() {
        assert!(ObjectPath::parse("").is_err());
        let too_long = "a".repeat(MAX_PATH_BYTES + 1);
        assert!(ObjectPath::parse(too_long).is_err());
        let exact = "a".repeat(MAX_PATH_BYTES);
        assert!(ObjectPath::parse(exact).is_ok());
    }

    #[test]
    fn object_path_derives_segments_and_basename() {
        let p = ObjectPath::parse("i/j/x1.txt").unwrap();
        assert_eq!(p.segments(), vec!["i", "j", "x1.txt"]);
        assert_eq!(p.dirname(), "i/j");
        assert_eq!(p.basename(), "x1.txt");
        assert_eq!(p.extname(), ".txt");
    }

    #[test]
    fn num_parts_boundary_cases() {
        assert_eq!(num_parts_for(0, 7), 0);
        assert_eq!(num_parts_for(7, 7), 1);
        assert_eq!(num_parts_for(8, 7), 2);
    }

    #[test]
    fn validate_object_size_enforces_invariant() {
        assert!(validate_object_size(0, 0, 7).is_ok());
        assert!(validate_object_size(7, 1, 7).is_ok());
        assert!(validate_object_size(8, 2, 7).is_ok());
        assert!(validate_object_size(0, 7, 7).is_err());
        assert!(validate_object_size(15, 2, 7).is_err());
    }
}
