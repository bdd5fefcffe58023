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

//! Hooks for watching the pipeline from the outside.
//!
//! A [`PipelineObserver`] is handed to the [`Reporter`](crate::Reporter) at
//! construction and called from both producer threads and the dispatch
//! thread. [`on_shutdown`](PipelineObserver::on_shutdown) is the last call it
//! receives.

use std::{
    fmt::Display,
    sync::{Mutex, PoisonError},
};

use tracing::{Span, debug, error, info, info_span, warn};

use crate::{DeliveryError, SendItem, TransportError, WorkerState};

pub trait PipelineObserver: Send + Sync {
    /// `kind` is `"batch"` or `"single"`.
    fn item_queued(&self, _kind: &'static str, _records: usize) {}

    fn attempt_failed(&self, _item: &SendItem, _attempt: u32, _error: &TransportError) {}

    fn delivered(&self, _item: &SendItem, _acknowledged: usize, _attempts: u32) {}

    fn delivery_failed(&self, _error: &DeliveryError) {}

    /// Records dropped without a send attempt: the buffer on a forced stop,
    /// or an item the dispatch queue no longer accepts.
    fn discarded(&self, _records: usize) {}

    fn state_changed(&self, _from: WorkerState, _to: WorkerState) {}

    fn on_shutdown(&self) {}
}

/// Observer that turns pipeline events into `tracing` events inside a span
/// owned by one reporter.
pub struct TracingObserver {
    span: Mutex<Option<Span>>,
}

impl TracingObserver {
    pub fn new(reporter: impl Display) -> Self {
        Self {
            span: Mutex::new(Some(info_span!("rplog_reporter", reporter = %reporter))),
        }
    }

    fn in_span(&self, f: impl FnOnce()) {
        let span = self
            .span
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(Span::none);
        span.in_scope(f);
    }
}

impl Default for TracingObserver {
    fn default() -> Self { Self::new("default") }
}

impl PipelineObserver for TracingObserver {
    fn item_queued(&self, kind: &'static str, records: usize) {
        self.in_span(|| debug!(kind, records, "Queued for dispatch"));
    }

    fn attempt_failed(&self, item: &SendItem, attempt: u32, error: &TransportError) {
        self.in_span(|| warn!(item = %item, attempt, error = %error, "Send attempt failed"));
    }

    fn delivered(&self, item: &SendItem, acknowledged: usize, attempts: u32) {
        self.in_span(|| debug!(item = %item, acknowledged, attempts, "Delivered"));
    }

    fn delivery_failed(&self, error: &DeliveryError) {
        self.in_span(|| error!(kind = error.kind(), error = %error, "Delivery failed"));
    }

    fn discarded(&self, records: usize) {
        self.in_span(|| warn!(records, "Discarded records"));
    }

    fn state_changed(&self, from: WorkerState, to: WorkerState) {
        self.in_span(|| info!(from = %from, to = %to, "Reporter state changed"));
    }

    fn on_shutdown(&self) {
        self.in_span(|| debug!("Reporter observer released"));
        self.span.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_after_shutdown_are_still_accepted() {
        rplog_common_telemetry::init_default_ut_logging();
        let observer = TracingObserver::new("launch-1");
        observer.state_changed(WorkerState::NotStarted, WorkerState::Running);
        observer.on_shutdown();
        assert!(observer.span.lock().unwrap().is_none());
        observer.discarded(3);
        observer.on_shutdown();
    }
}
