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

//! Omnio: an embedded, single-bucket, content-addressed object store
//! that couples a part-chunked file layout with a relational metadata
//! catalog, queryable by path, tag, and full-text description search.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod hash;
pub mod json;
pub mod lock;
pub mod logger;
pub mod omnio;
pub mod read_stream;
pub mod storage;
pub mod textsearch;
pub mod types;
pub mod write_stream;

pub use error::OmnioError;
pub use error::Result;
pub use omnio::DoctorReport;
pub use omnio::Omnio;
pub use omnio::PutObjectInput;
