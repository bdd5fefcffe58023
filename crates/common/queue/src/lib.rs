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

//! In-memory two-lane queue.
//!
//! A queue is split into a cloneable [`Appender`] and a single-owner
//! [`Tailer`]. Appenders push control messages and data items from any
//! thread; the tailer pops them on one consumer thread.
//!
//! ```text
//! ┌──────────────┐   control lane (C)   ┌──────────────┐
//! │   Appender   │ ───────────────────► │              │
//! │   (clone)    │                      │    Tailer    │
//! │   Appender   │ ───────────────────► │  (consumer)  │
//! └──────────────┘    data lane (T)     └──────────────┘
//! ```
//!
//! Control messages always preempt pending data. Closing the queue is an
//! explicit, idempotent operation; the tailer reports it as
//! [`Popped::Closed`] once every item pushed before the close has been
//! popped.

mod appender;
mod error;
mod tailer;

use std::{
    fmt::Debug,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use crossbeam::channel::unbounded;

pub use appender::Appender;
pub use error::{ClosedSnafu, PushError, PushResult};
pub use tailer::{Popped, Tailer};

/// Entry on the data lane.
pub(crate) enum Slot<T> {
    Item(T),
    /// Written exactly once by [`Appender::close`].
    Close,
}

/// State shared by every handle of one queue.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    /// Guards the closed flag so no push can land behind the close marker.
    closed:        RwLock<bool>,
    /// Set once the tailer has consumed the close marker.
    marker_popped: AtomicBool,
}

impl Shared {
    pub(crate) fn is_closed(&self) -> bool {
        *self.closed.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of close markers still sitting on the data lane (0 or 1).
    pub(crate) fn pending_marker(&self) -> usize {
        usize::from(self.is_closed() && !self.marker_popped.load(Ordering::Acquire))
    }

    pub(crate) fn mark_popped(&self) { self.marker_popped.store(true, Ordering::Release); }
}

/// Create a new unbounded queue and return its producer and consumer halves.
#[must_use]
pub fn unbounded_queue<C: Debug, T: Debug>() -> (Appender<C, T>, Tailer<C, T>) {
    let (control_tx, control_rx) = unbounded();
    let (data_tx, data_rx) = unbounded();
    let shared = Arc::new(Shared::default());
    (
        Appender::new(control_tx, data_tx, shared.clone()),
        Tailer::new(control_rx, data_rx, shared),
    )
}
