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

use crate::StopMode;

/// View of the listener passed to every handler callback.
#[derive(Debug, Clone)]
pub struct ListenerContext {
    name:      String,
    stop_mode: Option<StopMode>,
}

impl ListenerContext {
    pub(crate) const fn new(name: String) -> Self {
        Self {
            name,
            stop_mode: None,
        }
    }

    pub(crate) const fn begin_stop(&mut self, mode: StopMode) { self.stop_mode = Some(mode); }

    pub fn name(&self) -> &str { &self.name }

    /// `None` while the listener is running normally.
    pub const fn stop_mode(&self) -> Option<StopMode> { self.stop_mode }

    pub const fn is_stopping(&self) -> bool { self.stop_mode.is_some() }

    /// Whether the listener is handling the items left behind a graceful stop.
    pub const fn is_draining(&self) -> bool { matches!(self.stop_mode, Some(StopMode::Drain)) }
}
