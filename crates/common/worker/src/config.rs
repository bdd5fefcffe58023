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

use smart_default::SmartDefault;

#[derive(Debug, Clone, SmartDefault, bon::Builder)]
pub struct ListenerConfig {
    /// Thread name, also used as the metrics label.
    #[builder(into, default = "queue-listener".to_string())]
    #[default = "queue-listener"]
    name: String,

    /// Upper bound on a single blocking pop. Control messages wake the
    /// listener earlier. Default: 100 milliseconds.
    #[builder(default = Duration::from_millis(100))]
    #[default(Duration::from_millis(100))]
    poll_interval: Duration,
}

impl ListenerConfig {
    pub fn name(&self) -> &str { &self.name }

    pub const fn poll_interval(&self) -> Duration { self.poll_interval }
}
