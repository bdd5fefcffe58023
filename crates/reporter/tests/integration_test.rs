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
    collections::VecDeque,
    sync::{Arc, Barrier, Mutex, mpsc},
    thread,
    time::{Duration, Instant},
};

use rplog_reporter::{
    Attachment, DeliveryError, LogRecord, PipelineObserver, ReportError, Reporter,
    ReporterConfig, SendItem, Transport, TransportError, WorkerState,
};
use test_case::test_case;

type Script = VecDeque<Result<Vec<String>, TransportError>>;

/// Transport that records every attempt and answers from a script. Once the
/// script runs out every send succeeds.
struct ScriptedTransport {
    attempts: Arc<Mutex<Vec<SendItem>>>,
    script:   Script,
    gate:     Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>,
}

impl ScriptedTransport {
    fn new(script: impl IntoIterator<Item = Result<Vec<String>, TransportError>>) -> Self {
        Self {
            attempts: Arc::default(),
            script:   script.into_iter().collect(),
            gate:     None,
        }
    }

    /// Block the first send until the returned sender fires. The receiver
    /// yields once that send has started.
    fn gated(mut self) -> (Self, mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        self.gate = Some((started_tx, release_rx));
        (self, started_rx, release_tx)
    }

    fn attempts(&self) -> Arc<Mutex<Vec<SendItem>>> { self.attempts.clone() }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, item: &SendItem) -> Result<Vec<String>, TransportError> {
        self.attempts.lock().unwrap().push(item.clone());
        if let Some((started, release)) = self.gate.take() {
            started.send(()).unwrap();
            release.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        self.script
            .pop_front()
            .unwrap_or_else(|| Ok(item.records().iter().map(|r| r.message().to_string()).collect()))
    }
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<String> { self.events.lock().unwrap().clone() }

    fn push(&self, event: String) { self.events.lock().unwrap().push(event); }
}

impl PipelineObserver for RecordingObserver {
    fn item_queued(&self, kind: &'static str, records: usize) {
        self.push(format!("queued:{kind}:{records}"));
    }

    fn discarded(&self, records: usize) { self.push(format!("discarded:{records}")); }

    fn delivery_failed(&self, error: &DeliveryError) { self.push(format!("failed:{}", error.kind())); }

    fn state_changed(&self, from: WorkerState, to: WorkerState) { self.push(format!("{from}->{to}")); }

    fn on_shutdown(&self) { self.push("shutdown".to_string()); }
}

/// Transport whose every send panics. Signals `dropped` once the dispatch
/// thread has unwound past it.
struct PanickingTransport {
    dropped: mpsc::Sender<()>,
}

impl Transport for PanickingTransport {
    fn send(&mut self, item: &SendItem) -> Result<Vec<String>, TransportError> {
        panic!("transport bug while sending {item}")
    }
}

impl Drop for PanickingTransport {
    fn drop(&mut self) { let _ = self.dropped.send(()); }
}

fn config(batch_size: usize) -> ReporterConfig {
    ReporterConfig::builder()
        .batch_size(batch_size)
        .poll_interval_ms(10)
        .thread_name("rplog-test")
        .build()
}

fn record(message: &str) -> LogRecord {
    LogRecord::builder().launch_id("launch").message(message).build()
}

fn messages(item: &SendItem) -> Vec<String> {
    item.records().iter().map(|r| r.message().to_string()).collect()
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test_case(1 ; "one record")]
#[test_case(4 ; "just under the threshold")]
fn test_below_threshold_stays_buffered(n: usize) {
    rplog_common_telemetry::init_default_ut_logging();
    let reporter = Reporter::new(config(5), ScriptedTransport::new([]));
    for i in 0..n {
        reporter.submit(record(&format!("r{i}"))).unwrap();
    }
    assert_eq!(reporter.buffered(), n);
    assert_eq!(reporter.queued(), 0);
}

#[test]
fn test_threshold_batches_then_flush() {
    let transport = ScriptedTransport::new([]);
    let attempts = transport.attempts();
    let reporter = Reporter::new(config(3), transport);

    for message in ["A", "B", "C", "D"] {
        reporter.submit(record(message)).unwrap();
    }
    assert_eq!(reporter.queued(), 1);
    assert_eq!(reporter.buffered(), 1);

    reporter.flush().unwrap();
    assert_eq!(reporter.queued(), 2);
    assert_eq!(reporter.buffered(), 0);
    reporter.flush().unwrap();
    assert_eq!(reporter.queued(), 2);

    reporter.start().unwrap();
    reporter.stop(true).unwrap();
    assert_eq!(reporter.queued(), 0);
    assert_eq!(reporter.buffered(), 0);

    let attempts = attempts.lock().unwrap();
    let sent: Vec<_> = attempts.iter().map(messages).collect();
    assert_eq!(sent, vec![vec!["A", "B", "C"], vec!["D"]]);
    let seqs: Vec<_> = attempts
        .iter()
        .map(|item| match item {
            SendItem::Batch(batch) => batch.seq(),
            SendItem::Single(_) => 0,
        })
        .collect();
    assert_eq!(seqs, [1, 2]);
}

#[test]
fn test_attachment_bypasses_buffer() {
    let transport = ScriptedTransport::new([]);
    let attempts = transport.attempts();
    let reporter = Reporter::new(config(5), transport);
    reporter.submit(record("one")).unwrap();
    reporter.submit(record("two")).unwrap();

    let screenshot = LogRecord::builder()
        .launch_id("launch")
        .message("screenshot")
        .attachment(Attachment::new("shot.png", vec![0_u8; 16]).with_mime_type("image/png"))
        .build();
    reporter.submit(screenshot).unwrap();

    assert_eq!(reporter.queued(), 1);
    assert_eq!(reporter.buffered(), 2);

    reporter.start().unwrap();
    reporter.stop(true).unwrap();
    let attempts = attempts.lock().unwrap();
    assert!(matches!(&attempts[0], SendItem::Single(r) if r.message() == "screenshot"));
    assert_eq!(messages(&attempts[1]), ["one", "two"]);
}

#[test]
fn test_stop_is_idempotent_and_rejects_new_work() {
    let reporter = Reporter::new(config(2), ScriptedTransport::new([]));
    reporter.start().unwrap();
    reporter.start().unwrap();
    assert_eq!(reporter.state(), WorkerState::Running);

    reporter.stop(true).unwrap();
    reporter.stop(true).unwrap();
    reporter.stop_force().unwrap();
    assert_eq!(reporter.state(), WorkerState::Stopped);

    assert!(matches!(reporter.submit(record("late")), Err(ReportError::AlreadyStopped { .. })));
    assert!(matches!(reporter.flush(), Err(ReportError::AlreadyStopped { .. })));
    assert!(matches!(reporter.start(), Err(ReportError::AlreadyStopped { .. })));
    assert_eq!(reporter.queued(), 0);
}

#[test]
fn test_transient_failures_then_success() {
    let transport = ScriptedTransport::new([
        Err(TransportError::transient("timeout")),
        Err(TransportError::transient("timeout")),
    ]);
    let attempts = transport.attempts();
    let reporter = Reporter::new(config(1), transport);
    let handled = Arc::new(Mutex::new(Vec::new()));
    let sink = handled.clone();
    reporter.on_error(move |e: &DeliveryError| sink.lock().unwrap().push(e.to_string()));

    reporter.start().unwrap();
    reporter.submit(record("flaky")).unwrap();
    reporter.stop(true).unwrap();

    assert_eq!(attempts.lock().unwrap().len(), 3);
    assert!(handled.lock().unwrap().is_empty());
}

#[test]
fn test_retry_budget_exhausted_reaches_handler_once() {
    let transport = ScriptedTransport::new(
        std::iter::repeat_with(|| Err(TransportError::transient("unavailable"))).take(10),
    );
    let attempts = transport.attempts();
    let reporter = Reporter::new(config(1), transport);
    let handled = Arc::new(Mutex::new(Vec::new()));
    let sink = handled.clone();
    reporter.on_error(move |e: &DeliveryError| {
        sink.lock().unwrap().push(matches!(e, DeliveryError::RetryBudgetExhausted { attempts: 3, .. }));
    });

    reporter.start().unwrap();
    reporter.submit(record("doomed")).unwrap();
    reporter.stop(true).unwrap();

    assert_eq!(attempts.lock().unwrap().len(), 3);
    assert_eq!(*handled.lock().unwrap(), [true]);
}

#[test]
fn test_permanent_failure_is_not_retried() {
    let transport = ScriptedTransport::new([Err(TransportError::permanent("bad request"))]);
    let attempts = transport.attempts();
    let reporter = Reporter::new(config(1), transport);
    let handled = Arc::new(Mutex::new(0));
    let sink = handled.clone();
    reporter.on_error(move |_: &DeliveryError| *sink.lock().unwrap() += 1);

    reporter.start().unwrap();
    reporter.submit(record("rejected")).unwrap();
    reporter.submit(record("accepted")).unwrap();
    reporter.stop(true).unwrap();

    assert_eq!(attempts.lock().unwrap().len(), 2);
    assert_eq!(*handled.lock().unwrap(), 1);
}

#[test]
fn test_shutdown_failures_returned_without_handler() {
    let transport = ScriptedTransport::new([
        Err(TransportError::permanent("first")),
        Err(TransportError::permanent("last")),
    ]);
    let observer = Arc::new(RecordingObserver::default());
    let reporter = Reporter::with_observer(config(5), transport, observer.clone());
    reporter.start().unwrap();

    // Fails while running: logged only.
    reporter.submit(record("early")).unwrap();
    reporter.flush().unwrap();
    wait_until(|| observer.events().iter().any(|e| e.starts_with("failed:")));

    // Fails in the final flush: handed back to the caller.
    reporter.submit(record("final")).unwrap();
    let err = reporter.stop(true).unwrap_err();

    let failures = err.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].reason(), "last");
    assert_eq!(messages(failures[0].item()), ["final"]);
    assert!(matches!(err, ReportError::Undelivered { .. }));
}

#[test]
fn test_stop_force_never_sends_queued_items() {
    let (transport, started, release) = ScriptedTransport::new([]).gated();
    let attempts = transport.attempts();
    let reporter = Reporter::new(config(1), transport);
    reporter.start().unwrap();

    reporter.submit(record("in-flight")).unwrap();
    started.recv_timeout(Duration::from_secs(5)).unwrap();
    for i in 0..4 {
        reporter.submit(record(&format!("queued-{i}"))).unwrap();
    }
    assert_eq!(reporter.queued(), 4);

    reporter.stop_force().unwrap();
    assert!(matches!(reporter.submit(record("late")), Err(ReportError::AlreadyStopped { .. })));
    release.send(()).unwrap();
    reporter.join().unwrap();

    let attempts = attempts.lock().unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(messages(&attempts[0]), ["in-flight"]);
    assert_eq!(reporter.state(), WorkerState::Stopped);
}

#[test]
fn test_concurrent_producers_keep_their_order() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 50;
    const BATCH: usize = 7;

    let transport = ScriptedTransport::new([]);
    let attempts = transport.attempts();
    let reporter = Arc::new(Reporter::new(config(BATCH), transport));
    reporter.start().unwrap();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let reporter = reporter.clone();
            thread::spawn(move || {
                for n in 0..PER_PRODUCER {
                    reporter.submit(record(&format!("{p}:{n}"))).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    reporter.stop(true).unwrap();

    let attempts = attempts.lock().unwrap();
    assert!(attempts.iter().all(|item| item.len() <= BATCH));
    let all: Vec<String> = attempts.iter().flat_map(messages).collect();
    assert_eq!(all.len(), PRODUCERS * PER_PRODUCER);
    for p in 0..PRODUCERS {
        let seen: Vec<usize> = all
            .iter()
            .filter_map(|m| m.strip_prefix(&format!("{p}:")).map(|n| n.parse().unwrap()))
            .collect();
        assert_eq!(seen, (0..PER_PRODUCER).collect::<Vec<_>>());
    }
}

#[test_case(true, &["not_started->running", "running->stopping", "stopping->stopped", "shutdown"] ; "graceful")]
#[test_case(false, &["not_started->running", "running->stopped", "shutdown"] ; "forced")]
fn test_state_transitions(graceful: bool, expected: &[&str]) {
    let observer = Arc::new(RecordingObserver::default());
    let reporter = Reporter::with_observer(config(2), ScriptedTransport::new([]), observer.clone());
    reporter.start().unwrap();
    if graceful {
        reporter.stop(true).unwrap();
    } else {
        reporter.stop_force().unwrap();
        reporter.join().unwrap();
    }
    assert_eq!(observer.events(), expected);
}

#[test]
fn test_stop_before_start_sends_nothing() {
    let transport = ScriptedTransport::new([]);
    let attempts = transport.attempts();
    let observer = Arc::new(RecordingObserver::default());
    let reporter = Reporter::with_observer(config(2), transport, observer.clone());
    reporter.submit(record("never sent")).unwrap();

    reporter.stop(true).unwrap();

    assert_eq!(reporter.state(), WorkerState::Stopped);
    assert!(attempts.lock().unwrap().is_empty());
    assert_eq!(observer.events(), ["queued:batch:1", "not_started->stopped", "shutdown"]);
}

#[test]
fn test_concurrent_start_spawns_one_dispatch_thread() {
    const CALLERS: usize = 8;
    let transport = ScriptedTransport::new([]);
    let attempts = transport.attempts();
    let observer = Arc::new(RecordingObserver::default());
    let reporter = Reporter::with_observer(config(1), transport, observer.clone());
    let barrier = Barrier::new(CALLERS);

    thread::scope(|s| {
        for _ in 0..CALLERS {
            s.spawn(|| {
                barrier.wait();
                reporter.start().unwrap();
            });
        }
    });
    assert_eq!(reporter.state(), WorkerState::Running);
    reporter.submit(record("once")).unwrap();
    reporter.stop(true).unwrap();

    let events = observer.events();
    assert_eq!(events.iter().filter(|e| *e == "not_started->running").count(), 1);
    assert_eq!(events.iter().filter(|e| *e == "shutdown").count(), 1);
    assert_eq!(attempts.lock().unwrap().len(), 1);
}

#[test]
fn test_panicked_dispatch_thread_ends_stopped() {
    let (dropped, _gone) = mpsc::channel();
    let observer = Arc::new(RecordingObserver::default());
    let reporter =
        Reporter::with_observer(config(1), PanickingTransport { dropped }, observer.clone());
    reporter.start().unwrap();
    reporter.submit(record("boom")).unwrap();

    let err = reporter.stop(true).unwrap_err();
    assert!(matches!(err, ReportError::WorkerPanicked { .. }));
    assert_eq!(reporter.state(), WorkerState::Stopped);
    let events = observer.events();
    assert_eq!(events.last().map(String::as_str), Some("shutdown"));
    assert_eq!(events.iter().filter(|e| *e == "shutdown").count(), 1);
    reporter.join().unwrap();
}

#[test]
fn test_join_after_panic_reports_it_once() {
    let (dropped, gone) = mpsc::channel();
    let reporter = Reporter::new(config(1), PanickingTransport { dropped });
    reporter.start().unwrap();
    reporter.submit(record("boom")).unwrap();
    gone.recv_timeout(Duration::from_secs(5)).unwrap();

    reporter.stop_force().unwrap();
    assert!(matches!(reporter.join(), Err(ReportError::WorkerPanicked { .. })));
    assert_eq!(reporter.state(), WorkerState::Stopped);
    reporter.join().unwrap();
}

#[test]
fn test_item_refused_by_dead_dispatch_thread_is_reported_as_discarded() {
    let (dropped, gone) = mpsc::channel();
    let observer = Arc::new(RecordingObserver::default());
    let reporter =
        Reporter::with_observer(config(1), PanickingTransport { dropped }, observer.clone());
    reporter.start().unwrap();
    reporter.submit(record("boom")).unwrap();
    // The listener releases its queue before its handlers.
    gone.recv_timeout(Duration::from_secs(5)).unwrap();

    assert!(matches!(reporter.submit(record("late")), Err(ReportError::AlreadyStopped { .. })));
    let events = observer.events();
    assert_eq!(events.iter().filter(|e| e.starts_with("queued:")).count(), 1);
    assert!(events.contains(&"discarded:1".to_string()));
}

#[test]
fn test_dropping_a_running_reporter_drains_in_background() {
    let transport = ScriptedTransport::new([]);
    let attempts = transport.attempts();
    let reporter = Reporter::new(config(10), transport);
    reporter.start().unwrap();
    reporter.submit(record("orphan")).unwrap();
    drop(reporter);

    wait_until(|| !attempts.lock().unwrap().is_empty());
    assert_eq!(messages(&attempts.lock().unwrap()[0]), ["orphan"]);
}
