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

//! The §6.3 `Logger` capability: a single `log({level, message, reason})`
//! sink, backed by `tracing`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, reason: Option<&str>);
}

/// Default `Logger` writing through the `tracing` dispatcher.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str, reason: Option<&str>) {
        match (level, reason) {
            (LogLevel::Error, Some(r)) => tracing::error!(reason = r, "{message}"),
            (LogLevel::Error, None) => tracing::error!("{message}"),
            (LogLevel::Warn, Some(r)) => tracing::warn!(reason = r, "{message}"),
            (LogLevel::Warn, None) => tracing::warn!("{message}"),
            (LogLevel::Info, Some(r)) => tracing::info!(reason = r, "{message}"),
            (LogLevel::Info, None) => tracing::info!("{message}"),
            (LogLevel::Debug, Some(r)) => tracing::debug!(reason = r, "{message}"),
            (LogLevel::Debug, None) => tracing::debug!("{message}"),
        }
    }
}
