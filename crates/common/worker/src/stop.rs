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

use std::fmt::Debug;

/// How a listener winds down once it has been asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum StopMode {
    /// Keep handling queued items until the queue is empty or closed.
    #[display("drain")]
    Drain,

    /// Drop whatever is still queued and exit after the current item.
    #[display("immediate")]
    Immediate,
}

impl StopMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Drain => "drain",
            Self::Immediate => "immediate",
        }
    }
}

/// Message type carried on a listener's control lane.
///
/// The listener only acts on messages that map to a [`StopMode`]; anything
/// else is logged and ignored.
pub trait ControlSignal: From<StopMode> + Debug + Send + 'static {
    fn stop_mode(&self) -> Option<StopMode>;
}

impl ControlSignal for StopMode {
    fn stop_mode(&self) -> Option<StopMode> { Some(*self) }
}
