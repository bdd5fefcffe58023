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

//! Producer-facing batching front end.
//!
//! ```text
//!  producers ──submit──► buffer ──(batch_size reached | flush | stop)──┐
//!                          │                                          ▼
//!                          └─ attachment records ───────────► data lane ──► dispatch thread ──► Transport
//!  stop / stop_force ────────────────────────────────────────► control lane ─┘
//! ```

use std::{
    mem,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use rplog_common_queue::Appender;
use rplog_common_worker::{ListenerConfig, ListenerHandle, QueueListener, StopMode};
use snafu::{ResultExt, ensure};
use tracing::{debug, warn};

use crate::{
    Batch, Command, DeliveryError, LogRecord, PipelineObserver, ReporterConfig, SendItem,
    Transport, TracingObserver, WorkerState,
    dispatch::{DispatchHandler, Shared},
    err::{AlreadyStoppedSnafu, Result, SpawnWorkerSnafu, UndeliveredSnafu, WorkerPanickedSnafu},
    metrics::{BATCHES_QUEUED, ITEMS_DISCARDED},
};

struct Buffer {
    records:  Vec<LogRecord>,
    capacity: usize,
    next_seq: u64,
}

impl Buffer {
    fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
            next_seq: 0,
        }
    }

    /// Swap the buffered records out for an empty buffer.
    fn take_batch(&mut self) -> Option<Batch> {
        if self.records.is_empty() {
            return None;
        }
        self.next_seq += 1;
        let records = mem::replace(&mut self.records, Vec::with_capacity(self.capacity));
        Some(Batch::new(self.next_seq, records))
    }
}

enum Worker {
    Idle(QueueListener<Command, SendItem>),
    Running(ListenerHandle<Command, SendItem>),
    Done,
}

/// Batches log records from any number of threads and hands them to a
/// single background dispatch thread.
///
/// Records submitted before [`start`](Self::start) are queued and sent once
/// the thread runs. Dropping a reporter requests a graceful stop without
/// waiting for it.
pub struct Reporter {
    config:   ReporterConfig,
    buffer:   Mutex<Buffer>,
    appender: Appender<Command, SendItem>,
    worker:   Mutex<Worker>,
    shared:   Arc<Shared>,
}

impl Reporter {
    /// Create a reporter that logs pipeline events through `tracing`.
    pub fn new(config: ReporterConfig, transport: impl Transport + 'static) -> Self {
        Self::with_observer(config, transport, Arc::new(TracingObserver::default()))
    }

    pub fn with_observer(
        config: ReporterConfig,
        transport: impl Transport + 'static,
        observer: Arc<dyn PipelineObserver>,
    ) -> Self {
        let shared = Arc::new(Shared::new(observer));
        let listener_config = ListenerConfig::builder()
            .name(config.thread_name.clone())
            .poll_interval(config.poll_interval())
            .build();
        let listener = QueueListener::new(listener_config).with_handler(DispatchHandler::new(
            transport,
            config.max_attempts(),
            shared.clone(),
        ));
        Self {
            buffer: Mutex::new(Buffer::new(config.batch_size())),
            appender: listener.appender(),
            worker: Mutex::new(Worker::Idle(listener)),
            shared,
            config,
        }
    }

    pub const fn config(&self) -> &ReporterConfig { &self.config }

    pub fn state(&self) -> WorkerState { self.shared.state() }

    /// Records waiting in the buffer for the next batch.
    pub fn buffered(&self) -> usize { self.lock_buffer().records.len() }

    /// Items waiting on the dispatch queue.
    pub fn queued(&self) -> usize { self.appender.len() }

    /// Register the callback for terminal delivery failures, replacing any
    /// previous one. It runs on the dispatch thread.
    pub fn on_error(&self, handler: impl Fn(&DeliveryError) + Send + Sync + 'static) {
        self.shared.set_error_handler(Arc::new(handler));
    }

    /// Spawn the dispatch thread. Calling it again while running is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.lock_worker();
        ensure!(!self.is_stop_requested(), AlreadyStoppedSnafu);
        match mem::replace(&mut *worker, Worker::Done) {
            Worker::Idle(listener) => {
                self.shared.advance(WorkerState::Running);
                match listener.spawn() {
                    Ok(handle) => {
                        *worker = Worker::Running(handle);
                        Ok(())
                    }
                    Err(e) => {
                        self.shared.request_stop();
                        self.appender.close();
                        self.shared.advance(WorkerState::Stopped);
                        self.shared.observer().on_shutdown();
                        Err(e).context(SpawnWorkerSnafu)
                    }
                }
            }
            Worker::Running(handle) => {
                *worker = Worker::Running(handle);
                Ok(())
            }
            Worker::Done => AlreadyStoppedSnafu.fail(),
        }
    }

    /// Buffer a record. A full buffer is pushed to the dispatch queue as one
    /// batch. Records with an attachment bypass the buffer and are queued on
    /// their own.
    pub fn submit(&self, record: LogRecord) -> Result<()> {
        let mut buffer = self.lock_buffer();
        ensure!(!self.is_stop_requested(), AlreadyStoppedSnafu);
        if record.has_attachment() {
            return self.enqueue(SendItem::Single(record));
        }
        buffer.records.push(record);
        if buffer.records.len() >= self.config.batch_size() {
            if let Some(batch) = buffer.take_batch() {
                self.enqueue(SendItem::Batch(batch))?;
            }
        }
        Ok(())
    }

    /// Queue whatever is buffered, even below the batch size.
    pub fn flush(&self) -> Result<()> {
        let mut buffer = self.lock_buffer();
        ensure!(!self.is_stop_requested(), AlreadyStoppedSnafu);
        match buffer.take_batch() {
            Some(batch) => self.enqueue(SendItem::Batch(batch)),
            None => Ok(()),
        }
    }

    /// Stop the reporter. `stop(false)` is [`stop_force`](Self::stop_force).
    ///
    /// A graceful stop flushes the buffer, lets the dispatch thread send
    /// everything still queued and waits for it to exit. Without an error
    /// handler, failures hit during that drain are returned as
    /// [`ReportError::Undelivered`](crate::ReportError::Undelivered). Only the
    /// first stop does anything.
    pub fn stop(&self, graceful: bool) -> Result<()> {
        if !graceful {
            return self.stop_force();
        }
        if !self.request_stop(true) {
            return Ok(());
        }
        let worker = mem::replace(&mut *self.lock_worker(), Worker::Done);
        match worker {
            Worker::Running(handle) => {
                handle.signal(StopMode::Drain);
                handle.close();
                let report = match handle.join() {
                    Ok(report) => report,
                    Err(e) => {
                        self.mark_stopped();
                        return Err(e).context(WorkerPanickedSnafu);
                    }
                };
                debug!(
                    handled = report.handled,
                    discarded = report.discarded,
                    "Dispatch thread joined"
                );
            }
            Worker::Idle(listener) => self.abandon(listener),
            Worker::Done => {}
        }
        let failures = self.shared.take_failures();
        ensure!(failures.is_empty(), UndeliveredSnafu { failures });
        Ok(())
    }

    /// Drop buffered and queued records and tell the dispatch thread to exit
    /// after its current send. Does not wait; see [`join`](Self::join).
    pub fn stop_force(&self) -> Result<()> {
        if !self.request_stop(false) {
            return Ok(());
        }
        let mut worker = self.lock_worker();
        match mem::replace(&mut *worker, Worker::Done) {
            Worker::Running(handle) => {
                handle.signal(StopMode::Immediate);
                handle.close();
                *worker = Worker::Running(handle);
            }
            Worker::Idle(listener) => self.abandon(listener),
            Worker::Done => {}
        }
        Ok(())
    }

    /// Wait for the dispatch thread of a stopped reporter to exit. Returns
    /// at once if no stop has been requested.
    pub fn join(&self) -> Result<()> {
        if !self.is_stop_requested() {
            return Ok(());
        }
        let worker = mem::replace(&mut *self.lock_worker(), Worker::Done);
        if let Worker::Running(handle) = worker {
            if let Err(e) = handle.join() {
                self.mark_stopped();
                return Err(e).context(WorkerPanickedSnafu);
            }
        }
        Ok(())
    }

    fn is_stop_requested(&self) -> bool { self.shared.is_stop_requested() }

    /// Mark the reporter stopped under the buffer lock, so no submit can slip
    /// in behind the final flush. Returns `false` if a stop was already
    /// requested.
    fn request_stop(&self, graceful: bool) -> bool {
        let mut buffer = self.lock_buffer();
        if !self.shared.request_stop() {
            return false;
        }
        if graceful {
            if let Some(batch) = buffer.take_batch() {
                if let Err(e) = self.enqueue(SendItem::Batch(batch)) {
                    warn!(error = %e, "Final flush could not be queued");
                }
            }
        } else {
            let dropped = buffer.records.len();
            buffer.records.clear();
            if dropped > 0 {
                ITEMS_DISCARDED.inc_by(dropped as u64);
                self.shared.observer().discarded(dropped);
            }
        }
        true
    }

    fn enqueue(&self, item: SendItem) -> Result<()> {
        let (kind, records) = (item.kind(), item.len());
        if let Err(e) = self.appender.push(item) {
            let item = e.into_inner();
            warn!(item = %item, records, "Dispatch queue is gone; item dropped");
            ITEMS_DISCARDED.inc_by(records as u64);
            self.shared.observer().discarded(records);
            return AlreadyStoppedSnafu.fail();
        }
        BATCHES_QUEUED.with_label_values(&[kind]).inc();
        self.shared.observer().item_queued(kind, records);
        Ok(())
    }

    /// Tear down a reporter whose dispatch thread never ran.
    fn abandon(&self, listener: QueueListener<Command, SendItem>) {
        let queued = self.appender.len();
        self.appender.close();
        drop(listener);
        if queued > 0 {
            warn!(queued, "Reporter stopped before start; queued items dropped");
        }
        self.mark_stopped();
    }

    /// Final state change for a dispatch thread that never ran its shutdown
    /// hook, either because it never started or because it panicked.
    fn mark_stopped(&self) {
        if self.shared.advance(WorkerState::Stopped) {
            self.shared.observer().on_shutdown();
        }
    }

    fn lock_buffer(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_worker(&self) -> MutexGuard<'_, Worker> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        if !self.request_stop(true) {
            return;
        }
        let worker = mem::replace(&mut *self.lock_worker(), Worker::Done);
        match worker {
            Worker::Running(handle) => {
                handle.signal(StopMode::Drain);
                handle.close();
            }
            Worker::Idle(listener) => self.abandon(listener),
            Worker::Done => {}
        }
    }
}
