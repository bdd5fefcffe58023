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

//! The dispatch thread's handler: sends each popped item through the
//! transport, retries transient failures and routes terminal ones.

use std::sync::{
    Arc, Mutex, PoisonError, RwLock,
    atomic::{AtomicBool, Ordering},
};

use rplog_common_worker::{Handler, ListenerContext, StopMode, WorkResult};
use tracing::debug;

use crate::{
    DeliveryError, PipelineObserver, SendItem, Transport, TransportError, WorkerState,
    command::AtomicWorkerState,
    err::{PermanentSendFailureSnafu, RetryBudgetExhaustedSnafu},
    metrics::{DELIVERY_FAILURES, ITEMS_DELIVERED, SEND_ATTEMPTS},
};

/// Callback invoked on the dispatch thread for every terminal failure.
pub type ErrorHandler = Arc<dyn Fn(&DeliveryError) + Send + Sync>;

/// State shared between the [`Reporter`](crate::Reporter) and its dispatch
/// thread.
pub(crate) struct Shared {
    state:          AtomicWorkerState,
    stop_requested: AtomicBool,
    error_handler:  RwLock<Option<ErrorHandler>>,
    failures:       Mutex<Vec<DeliveryError>>,
    observer:       Arc<dyn PipelineObserver>,
}

impl Shared {
    pub(crate) fn new(observer: Arc<dyn PipelineObserver>) -> Self {
        Self {
            state: AtomicWorkerState::new(),
            stop_requested: AtomicBool::new(false),
            error_handler: RwLock::new(None),
            failures: Mutex::new(Vec::new()),
            observer,
        }
    }

    pub(crate) fn observer(&self) -> &dyn PipelineObserver { self.observer.as_ref() }

    pub(crate) fn state(&self) -> WorkerState { self.state.load() }

    pub(crate) fn advance(&self, to: WorkerState) -> bool {
        let Some(from) = self.state.advance(to) else {
            return false;
        };
        self.observer.state_changed(from, to);
        true
    }

    /// Returns `false` if a stop had already been requested.
    pub(crate) fn request_stop(&self) -> bool { !self.stop_requested.swap(true, Ordering::AcqRel) }

    pub(crate) fn is_stop_requested(&self) -> bool { self.stop_requested.load(Ordering::Acquire) }

    pub(crate) fn set_error_handler(&self, handler: ErrorHandler) {
        *self
            .error_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    fn error_handler(&self) -> Option<ErrorHandler> {
        self.error_handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn collect(&self, failure: DeliveryError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure);
    }

    pub(crate) fn take_failures(&self) -> Vec<DeliveryError> {
        std::mem::take(&mut *self.failures.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

pub(crate) struct DispatchHandler<Tr> {
    transport:    Tr,
    max_attempts: u32,
    shared:       Arc<Shared>,
}

impl<Tr: Transport> DispatchHandler<Tr> {
    pub(crate) const fn new(transport: Tr, max_attempts: u32, shared: Arc<Shared>) -> Self {
        Self {
            transport,
            max_attempts,
            shared,
        }
    }

    /// Send with retries. On success returns the acknowledged ids and the
    /// number of attempts used.
    fn deliver(&mut self, item: &SendItem) -> Result<(Vec<String>, u32), DeliveryError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            SEND_ATTEMPTS.inc();
            let error = match self.transport.send(item) {
                Ok(ids) => return Ok((ids, attempt)),
                Err(error) => error,
            };
            match error {
                TransportError::Permanent { reason } => {
                    return PermanentSendFailureSnafu {
                        item: item.clone(),
                        reason,
                    }
                    .fail();
                }
                TransportError::Transient { reason } if attempt >= self.max_attempts => {
                    return RetryBudgetExhaustedSnafu {
                        item: item.clone(),
                        attempts: attempt,
                        reason,
                    }
                    .fail();
                }
                transient @ TransportError::Transient { .. } => {
                    self.shared.observer().attempt_failed(item, attempt, &transient);
                }
            }
        }
    }

    /// With a registered handler the failure goes there. Without one it is
    /// only logged while running, and kept for the `stop()` caller once a
    /// stop has been requested.
    fn route(&self, failure: DeliveryError, ctx: &ListenerContext) {
        DELIVERY_FAILURES.with_label_values(&[failure.kind()]).inc();
        let handler = self.shared.error_handler();
        let keep = handler.is_none() && (ctx.is_stopping() || self.shared.is_stop_requested());
        self.shared.observer().delivery_failed(&failure);
        match handler {
            Some(handler) => handler(&failure),
            None if keep => self.shared.collect(failure),
            None => {}
        }
    }
}

impl<Tr: Transport> Handler<SendItem> for DispatchHandler<Tr> {
    fn on_start(&mut self, ctx: &ListenerContext) -> WorkResult {
        debug!(listener = ctx.name(), max_attempts = self.max_attempts, "Dispatch loop started");
        Ok(())
    }

    fn handle(&mut self, item: &SendItem, ctx: &ListenerContext) -> WorkResult {
        match self.deliver(item) {
            Ok((ids, attempts)) => {
                ITEMS_DELIVERED.inc_by(item.len() as u64);
                self.shared.observer().delivered(item, ids.len(), attempts);
            }
            Err(failure) => self.route(failure, ctx),
        }
        Ok(())
    }

    fn on_stop(&mut self, mode: StopMode, _ctx: &ListenerContext) -> WorkResult {
        if mode == StopMode::Drain {
            self.shared.advance(WorkerState::Stopping);
        }
        Ok(())
    }

    fn on_shutdown(&mut self, _ctx: &ListenerContext) -> WorkResult {
        self.shared.advance(WorkerState::Stopped);
        self.shared.observer().on_shutdown();
        Ok(())
    }
}
