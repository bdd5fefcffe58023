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

use std::{
    fmt::Debug,
    sync::{Arc, PoisonError},
};

use crossbeam::channel::{SendError, Sender};
use tracing::debug;

use crate::{PushResult, Shared, Slot, error::ClosedSnafu};

/// Producer half of the queue.
///
/// Appenders are cheap to clone and can be used from any thread. Pushes never
/// block: both lanes are unbounded.
pub struct Appender<C, T> {
    /// Control lane sender.
    control_tx: Sender<C>,
    /// Data lane sender.
    data_tx:    Sender<Slot<T>>,
    shared:     Arc<Shared>,
}

impl<C, T> Clone for Appender<C, T> {
    fn clone(&self) -> Self {
        Self {
            control_tx: self.control_tx.clone(),
            data_tx:    self.data_tx.clone(),
            shared:     self.shared.clone(),
        }
    }
}

impl<C: Debug, T: Debug> Appender<C, T> {
    pub(crate) const fn new(
        control_tx: Sender<C>,
        data_tx: Sender<Slot<T>>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            control_tx,
            data_tx,
            shared,
        }
    }

    /// Push a data item.
    ///
    /// # Errors
    ///
    /// Returns the item back if the queue has been closed or the tailer is
    /// gone.
    pub fn push(&self, item: T) -> PushResult<T> {
        // Held across the send so a concurrent close cannot overtake us.
        let closed = self.shared.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return ClosedSnafu { item }.fail();
        }

        match self.data_tx.send(Slot::Item(item)) {
            Err(SendError(Slot::Item(item))) => ClosedSnafu { item }.fail(),
            _ => Ok(()),
        }
    }

    /// Push a control message. Control messages are accepted after
    /// [`close`](Self::close) and preempt pending data.
    ///
    /// # Errors
    ///
    /// Returns the message back if the tailer is gone.
    pub fn push_control(&self, message: C) -> PushResult<C> {
        self.control_tx
            .send(message)
            .map_err(|e| ClosedSnafu { item: e.into_inner() }.build())
    }

    /// Close the data lane. Idempotent; returns `true` only for the call that
    /// actually closed the queue.
    pub fn close(&self) -> bool {
        let mut closed = self.shared.closed.write().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return false;
        }
        *closed = true;
        // A gone tailer has nothing left to observe.
        let _ = self.data_tx.send(Slot::Close);
        debug!(pending = self.data_tx.len().saturating_sub(1), "queue closed");
        true
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.shared.is_closed() }

    /// Number of data items waiting to be popped.
    #[must_use]
    pub fn len(&self) -> usize { self.data_tx.len().saturating_sub(self.shared.pending_marker()) }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Number of control messages waiting to be popped.
    #[must_use]
    pub fn control_len(&self) -> usize { self.control_tx.len() }
}

#[cfg(test)]
mod tests {
    use crate::{Popped, unbounded_queue};

    #[test]
    fn test_push_after_close_returns_item() {
        let (appender, _tailer) = unbounded_queue::<(), String>();
        appender.push("first".to_string()).unwrap();
        assert!(appender.close());

        let err = appender.push("late".to_string()).unwrap_err();
        assert_eq!(err.into_inner(), "late");
        assert_eq!(appender.len(), 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (appender, mut tailer) = unbounded_queue::<(), u32>();
        assert!(appender.close());
        assert!(!appender.close());
        assert!(!appender.clone().close());

        assert!(matches!(tailer.try_pop(), Popped::Closed));
        assert!(matches!(tailer.try_pop(), Popped::Closed));
    }

    #[test]
    fn test_control_accepted_after_close() {
        let (appender, mut tailer) = unbounded_queue::<&'static str, u32>();
        appender.close();
        appender.push_control("stop").unwrap();
        assert_eq!(appender.control_len(), 1);

        assert!(matches!(tailer.try_pop(), Popped::Control("stop")));
    }

    #[test]
    fn test_push_fails_when_tailer_dropped() {
        let (appender, tailer) = unbounded_queue::<u8, u32>();
        drop(tailer);

        assert_eq!(appender.push(7).unwrap_err().into_inner(), 7);
        assert_eq!(appender.push_control(1).unwrap_err().into_inner(), 1);
    }

    #[test]
    fn test_clones_share_lanes() {
        let (a1, tailer) = unbounded_queue::<(), u32>();
        let a2 = a1.clone();
        a1.push(1).unwrap();
        a2.push(2).unwrap();

        assert_eq!(a1.len(), 2);
        assert_eq!(tailer.len(), 2);
    }
}
