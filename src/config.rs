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

//! On-disk configuration for an `Omnio` root: an `omnio.toml` found by
//! walking up from the working directory, holding the bucket name and
//! default part size.

use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bucket: String,
    pub default_part_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket: "default".to_string(),
            default_part_size: 8 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigCtx {
    pub root: PathBuf,
    pub config: Config,
}

impl ConfigCtx {
    pub fn load_from_cwd() -> Result<Self> {
        let cwd = std::env::current_dir().context("get current dir")?;
        Self::load_from(&cwd)
    }

    pub fn load_from(start: &Path) -> Result<Self> {
        let mut cur = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
        loop {
            let candidate = cur.join("omnio.toml");
            if candidate.exists() {
                let config = read_config(&candidate)?;
                return Ok(Self { root: cur, config });
            }
            if let Some(parent) = cur.parent() {
                cur = parent.to_path_buf();
            } else {
                anyhow::bail!("omnio.toml not found; run `omnio init` first");
            }
        }
    }

    pub fn bucket_root(&self) -> PathBuf {
        self.root.join("buckets").join(&self.config.bucket)
    }
}

pub fn read_config(path: &Path) -> Result<Config> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let config: Config = toml::from_str(&text).context("parse omnio.toml")?;
    Ok(config)
}

pub fn write_config(path: &Path, config: &Config) -> Result<()> {
    let text = toml::to_string_pretty(config).context("serialize omnio.toml")?;
    std::fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
