// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Tuning for a [`Reporter`](crate::Reporter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault, bon::Builder)]
#[serde(default)]
pub struct ReporterConfig {
    /// Records per batch. Values below 1 are treated as 1.
    #[default = 20]
    #[builder(default = 20)]
    pub batch_size:       usize,
    /// Total send attempts per item, first try included.
    #[default = 3]
    #[builder(default = 3)]
    pub max_attempts:     u32,
    /// Upper bound on how long the dispatch thread waits for work.
    #[default = 100]
    #[builder(default = 100)]
    pub poll_interval_ms: u64,
    #[default = "rplog-dispatch"]
    #[builder(default = "rplog-dispatch".to_string(), into)]
    pub thread_name:      String,
}

impl ReporterConfig {
    pub fn batch_size(&self) -> usize { self.batch_size.max(1) }

    pub fn max_attempts(&self) -> u32 { self.max_attempts.max(1) }

    pub const fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms) }
}

/// Connection settings for the reporting service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault, bon::Builder)]
#[serde(default)]
pub struct ServiceConfig {
    #[builder(into)]
    pub endpoint:            String,
    #[builder(into)]
    pub project:             String,
    #[builder(into)]
    pub token:               String,
    #[default = "api/v1"]
    #[builder(default = "api/v1".to_string(), into)]
    pub api_base:            String,
    #[default = true]
    #[builder(default = true)]
    pub verify_ssl:          bool,
    #[default = 30]
    #[builder(default = 30)]
    pub timeout_secs:        u64,
    /// When false, skipped items without an issue are marked `NOT_ISSUE`.
    #[default = true]
    #[builder(default = true)]
    pub investigate_skipped: bool,
}

impl ServiceConfig {
    pub const fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}
