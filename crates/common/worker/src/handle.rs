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

use std::{fmt::Debug, thread::JoinHandle};

use rplog_common_queue::Appender;
use tracing::debug;

use crate::{
    ControlSignal, ListenerReport, StopMode,
    err::{PanickedSnafu, Result},
};

/// Owner's handle on a running [`QueueListener`](crate::QueueListener).
///
/// Dropping the handle detaches the thread; it keeps running until its queue
/// is closed or a stop signal arrives.
pub struct ListenerHandle<C, T> {
    name:     String,
    appender: Appender<C, T>,
    thread:   JoinHandle<ListenerReport>,
}

impl<C: ControlSignal, T: Debug> ListenerHandle<C, T> {
    pub(crate) const fn new(
        name: String,
        appender: Appender<C, T>,
        thread: JoinHandle<ListenerReport>,
    ) -> Self {
        Self {
            name,
            appender,
            thread,
        }
    }

    pub fn name(&self) -> &str { &self.name }

    /// Ask the listener to stop without waiting for it. Returns `false` if the
    /// listener has already exited.
    pub fn signal(&self, mode: StopMode) -> bool {
        let delivered = self.appender.push_control(C::from(mode)).is_ok();
        debug!(listener = %self.name, mode = %mode, delivered, "Stop signal sent");
        delivered
    }

    /// Close the listener's queue. A listener that observes the close stops
    /// as if [`StopMode::Drain`] had been signalled.
    pub fn close(&self) -> bool { self.appender.close() }

    /// Signal and wait for the thread to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener thread panicked.
    pub fn stop(self, mode: StopMode) -> Result<ListenerReport> {
        self.signal(mode);
        self.join()
    }

    /// Wait for the thread to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener thread panicked.
    pub fn join(self) -> Result<ListenerReport> {
        let name = self.name;
        self.thread
            .join()
            .map_err(|_| PanickedSnafu { name }.build())
    }

    pub fn is_finished(&self) -> bool { self.thread.is_finished() }
}
