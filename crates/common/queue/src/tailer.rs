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

use std::{sync::Arc, time::Duration};

use crossbeam::channel::{Receiver, TryRecvError, select};

use crate::{Shared, Slot};

/// Outcome of a pop.
#[derive(Debug, PartialEq, Eq)]
pub enum Popped<C, T> {
    /// A message from the control lane.
    Control(C),
    /// An item from the data lane.
    Item(T),
    /// Nothing arrived before the timeout.
    Empty,
    /// The queue was closed and every item pushed before the close has been
    /// popped. Control messages can still follow.
    Closed,
}

/// Consumer half of the queue. Single owner.
pub struct Tailer<C, T> {
    control_rx:  Receiver<C>,
    data_rx:     Receiver<Slot<T>>,
    shared:      Arc<Shared>,
    /// Data item received together with a control message; handed out next.
    stashed:     Option<T>,
    closed_seen: bool,
}

impl<C, T> Tailer<C, T> {
    pub(crate) const fn new(
        control_rx: Receiver<C>,
        data_rx: Receiver<Slot<T>>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            control_rx,
            data_rx,
            shared,
            stashed: None,
            closed_seen: false,
        }
    }

    /// Block up to `timeout` for the next message.
    ///
    /// Control messages are returned ahead of any pending data. A control
    /// message that arrives while the tailer is blocked wakes it immediately.
    pub fn pop(&mut self, timeout: Duration) -> Popped<C, T> {
        if let Some(popped) = self.try_control().or_else(|| self.ready_data()) {
            return popped;
        }

        let (control_rx, data_rx) = (self.control_rx.clone(), self.data_rx.clone());
        select! {
            recv(control_rx) -> msg => match msg {
                Ok(message) => Popped::Control(message),
                // Every appender is gone, so the data lane is disconnected too.
                Err(_) => self.try_data().unwrap_or(Popped::Closed),
            },
            recv(data_rx) -> msg => match msg {
                Ok(slot) => {
                    let popped = self.open_slot(slot);
                    self.preempt(popped)
                }
                Err(_) => Popped::Closed,
            },
            default(timeout) => Popped::Empty,
        }
    }

    /// Non-blocking variant of [`pop`](Self::pop).
    pub fn try_pop(&mut self) -> Popped<C, T> {
        self.try_control()
            .or_else(|| self.ready_data())
            .unwrap_or(Popped::Empty)
    }

    /// Drop every pending data item and return how many were dropped.
    /// Control messages are left in place.
    pub fn discard(&mut self) -> usize {
        let mut dropped = usize::from(self.stashed.take().is_some());
        if self.closed_seen {
            return dropped;
        }
        while let Ok(slot) = self.data_rx.try_recv() {
            match slot {
                Slot::Item(_) => dropped += 1,
                Slot::Close => {
                    self.mark_closed();
                    break;
                }
            }
        }
        dropped
    }

    /// Number of data items waiting to be popped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data_rx.len().saturating_sub(self.shared.pending_marker())
            + usize::from(self.stashed.is_some())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Whether the close marker has been popped.
    #[must_use]
    pub const fn is_closed(&self) -> bool { self.closed_seen }

    fn try_control(&self) -> Option<Popped<C, T>> {
        self.control_rx.try_recv().ok().map(Popped::Control)
    }

    /// Pending data, unless a control message landed after the control lane
    /// was last checked.
    fn ready_data(&mut self) -> Option<Popped<C, T>> {
        let popped = self.try_data()?;
        Some(self.preempt(popped))
    }

    fn try_data(&mut self) -> Option<Popped<C, T>> {
        if let Some(item) = self.stashed.take() {
            return Some(Popped::Item(item));
        }
        if self.closed_seen {
            return Some(Popped::Closed);
        }
        match self.data_rx.try_recv() {
            Ok(slot) => Some(self.open_slot(slot)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Popped::Closed),
        }
    }

    /// A control message that raced with the data we just received still
    /// goes first; the item is kept for the next pop.
    fn preempt(&mut self, popped: Popped<C, T>) -> Popped<C, T> {
        let Popped::Item(item) = popped else {
            return popped;
        };
        match self.control_rx.try_recv() {
            Ok(message) => {
                self.stashed = Some(item);
                Popped::Control(message)
            }
            Err(_) => Popped::Item(item),
        }
    }

    fn open_slot(&mut self, slot: Slot<T>) -> Popped<C, T> {
        match slot {
            Slot::Item(item) => Popped::Item(item),
            Slot::Close => {
                self.mark_closed();
                Popped::Closed
            }
        }
    }

    fn mark_closed(&mut self) {
        self.closed_seen = true;
        self.shared.mark_popped();
    }
}
