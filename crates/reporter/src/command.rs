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

use std::sync::atomic::{AtomicU8, Ordering};

use rplog_common_worker::{ControlSignal, StopMode};

/// Message on the control lane of the dispatch queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Command {
    /// Implicit tag of data items. Ignored when seen on the control lane.
    #[display("send")]
    Send,
    #[display("stop")]
    Stop,
    #[display("stop_immediate")]
    StopImmediate,
}

impl From<StopMode> for Command {
    fn from(mode: StopMode) -> Self {
        match mode {
            StopMode::Drain => Self::Stop,
            StopMode::Immediate => Self::StopImmediate,
        }
    }
}

impl ControlSignal for Command {
    fn stop_mode(&self) -> Option<StopMode> {
        match self {
            Self::Send => None,
            Self::Stop => Some(StopMode::Drain),
            Self::StopImmediate => Some(StopMode::Immediate),
        }
    }
}

/// Lifecycle of the dispatch thread. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, derive_more::Display)]
#[repr(u8)]
pub enum WorkerState {
    #[display("not_started")]
    NotStarted = 0,
    #[display("running")]
    Running = 1,
    #[display("stopping")]
    Stopping = 2,
    #[display("stopped")]
    Stopped = 3,
}

impl WorkerState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::NotStarted,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

#[derive(Debug)]
pub(crate) struct AtomicWorkerState(AtomicU8);

impl AtomicWorkerState {
    pub(crate) const fn new() -> Self { Self(AtomicU8::new(WorkerState::NotStarted as u8)) }

    pub(crate) fn load(&self) -> WorkerState { WorkerState::from_u8(self.0.load(Ordering::Acquire)) }

    /// Move to `to` if that is a step forward. Returns the previous state when
    /// the transition happened.
    pub(crate) fn advance(&self, to: WorkerState) -> Option<WorkerState> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < to as u8).then_some(to as u8)
            })
            .ok()
            .map(WorkerState::from_u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_stop_modes() {
        assert_eq!(Command::Send.stop_mode(), None);
        assert_eq!(Command::Stop.stop_mode(), Some(StopMode::Drain));
        assert_eq!(Command::from(StopMode::Immediate), Command::StopImmediate);
        assert_eq!(Command::StopImmediate.to_string(), "stop_immediate");
    }

    #[test]
    fn test_state_never_moves_backwards() {
        let state = AtomicWorkerState::new();
        assert_eq!(state.load(), WorkerState::NotStarted);

        assert_eq!(state.advance(WorkerState::Running), Some(WorkerState::NotStarted));
        assert_eq!(state.advance(WorkerState::Running), None);
        assert_eq!(state.advance(WorkerState::Stopped), Some(WorkerState::Running));
        assert_eq!(state.advance(WorkerState::Stopping), None);
        assert_eq!(state.load(), WorkerState::Stopped);
    }
}
