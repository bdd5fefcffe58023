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

//! Queue listener loop.
//!
//! A [`QueueListener`] owns the consumer half of a two-lane queue and runs on
//! a dedicated thread. Every popped data item is handed to each registered
//! [`Handler`] in order; control messages decide when and how it stops.
//!
//! ```text
//!                 ┌──────────── listener thread ────────────┐
//! Appender ──►    │ pop ─► Item    ─► handler 1 ─► handler 2 │
//!   (data,        │     ─► Control ─► stop(Drain|Immediate)  │
//!    control)     │     ─► Closed  ─► stop(Drain)            │
//!                 └─────────────────────────────────────────┘
//! ```
//!
//! On `Drain` the remaining items are handled before the thread exits; on
//! `Immediate` they are dropped and counted.

use std::{fmt::Debug, thread};

use prometheus::IntGauge;
use rplog_common_queue::{Appender, Popped, Tailer, unbounded_queue};
use snafu::ResultExt;
use tracing::{debug, error, info, warn};

use crate::{
    ControlSignal, Handler, ListenerConfig, ListenerContext, StopMode, WorkResult,
    err::{Result, SpawnSnafu},
    handle::ListenerHandle,
    metrics::{
        LISTENER_ACTIVE, LISTENER_HANDLER_ERRORS, LISTENER_ITEMS_DISCARDED,
        LISTENER_ITEMS_HANDLED, LISTENER_STARTED, LISTENER_STOPPED,
    },
};

/// Summary returned when a listener thread exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerReport {
    /// Items dispatched to the handlers.
    pub handled:   usize,
    /// Items dropped by an immediate stop.
    pub discarded: usize,
    /// The mode the listener finally stopped in.
    pub stop_mode: StopMode,
}

type BoxedHandler<T> = Box<dyn Handler<T>>;

pub struct QueueListener<C, T> {
    config:   ListenerConfig,
    appender: Appender<C, T>,
    tailer:   Tailer<C, T>,
    handlers: Vec<BoxedHandler<T>>,
}

impl<C, T> QueueListener<C, T>
where
    C: ControlSignal,
    T: Debug + Send + 'static,
{
    /// Create a listener together with a fresh queue.
    #[must_use]
    pub fn new(config: ListenerConfig) -> Self {
        let (appender, tailer) = unbounded_queue();
        Self {
            config,
            appender,
            tailer,
            handlers: Vec::new(),
        }
    }

    /// Producer handle for the listener's queue. Items pushed before
    /// [`spawn`](Self::spawn) are handled once the thread starts.
    #[must_use]
    pub fn appender(&self) -> Appender<C, T> { self.appender.clone() }

    #[must_use]
    pub fn with_handler(mut self, handler: impl Handler<T> + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Start the listener thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn(self) -> Result<ListenerHandle<C, T>> {
        let name = self.config.name().to_string();
        let appender = self.appender.clone();
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.run())
            .context(SpawnSnafu { name: name.clone() })?;
        Ok(ListenerHandle::new(name, appender, thread))
    }

    fn run(mut self) -> ListenerReport {
        let name = self.config.name().to_string();
        let label = [name.as_str()];
        let mut ctx = ListenerContext::new(name.clone());
        LISTENER_STARTED.with_label_values(&label).inc();
        let _active = ActiveGuard::enter(&name);
        info!(listener = ctx.name(), handlers = self.handlers.len(), "Queue listener starting");

        let mut handled = 0;
        let start_failed = each_handler(&mut self.handlers, &ctx, "on_start", true, |h, ctx| {
            h.on_start(ctx)
        });
        let mut mode = if start_failed {
            StopMode::Immediate
        } else {
            self.listen(&ctx, &mut handled)
        };

        ctx.begin_stop(mode);
        info!(listener = ctx.name(), mode = %mode, "Queue listener stopping");
        each_handler(&mut self.handlers, &ctx, "on_stop", false, |h, ctx| {
            h.on_stop(mode, ctx)
        });

        if mode == StopMode::Drain && self.drain(&ctx, &mut handled) {
            mode = StopMode::Immediate;
            ctx.begin_stop(mode);
        }
        let discarded = match mode {
            StopMode::Drain => 0,
            StopMode::Immediate => self.tailer.discard(),
        };
        if discarded > 0 {
            warn!(listener = ctx.name(), discarded, "Dropped queued items on immediate stop");
        }

        each_handler(&mut self.handlers, &ctx, "on_shutdown", false, |h, ctx| {
            h.on_shutdown(ctx)
        });

        LISTENER_ITEMS_HANDLED.with_label_values(&label).inc_by(handled as u64);
        LISTENER_ITEMS_DISCARDED.with_label_values(&label).inc_by(discarded as u64);
        LISTENER_STOPPED.with_label_values(&[name.as_str(), mode.as_str()]).inc();
        info!(listener = ctx.name(), handled, discarded, mode = %mode, "Queue listener stopped");

        ListenerReport {
            handled,
            discarded,
            stop_mode: mode,
        }
    }

    /// Normal operation. Returns once a stop is requested, the queue is
    /// closed, or a handler fails fatally.
    fn listen(&mut self, ctx: &ListenerContext, handled: &mut usize) -> StopMode {
        loop {
            match self.tailer.pop(self.config.poll_interval()) {
                Popped::Control(signal) => match signal.stop_mode() {
                    Some(mode) => return mode,
                    None => debug!(listener = ctx.name(), ?signal, "Ignoring control message"),
                },
                Popped::Item(item) => {
                    *handled += 1;
                    if self.dispatch(&item, ctx) {
                        return StopMode::Immediate;
                    }
                }
                Popped::Empty => {}
                Popped::Closed => {
                    debug!(listener = ctx.name(), "Queue closed");
                    return StopMode::Drain;
                }
            }
        }
    }

    /// Handle what is left in the queue. Returns `true` if the drain was cut
    /// short by an immediate stop or a fatal handler error.
    fn drain(&mut self, ctx: &ListenerContext, handled: &mut usize) -> bool {
        loop {
            match self.tailer.try_pop() {
                Popped::Item(item) => {
                    *handled += 1;
                    if self.dispatch(&item, ctx) {
                        return true;
                    }
                }
                Popped::Control(signal) => {
                    if signal.stop_mode() == Some(StopMode::Immediate) {
                        info!(listener = ctx.name(), "Drain interrupted by immediate stop");
                        return true;
                    }
                }
                Popped::Empty | Popped::Closed => return false,
            }
        }
    }

    /// Returns `true` if a handler failed fatally.
    fn dispatch(&mut self, item: &T, ctx: &ListenerContext) -> bool {
        each_handler(&mut self.handlers, ctx, "handle", true, |h, ctx| {
            h.handle(item, ctx)
        })
    }
}

/// One running listener thread in `listener_active`. Listeners may share a
/// name, so the gauge counts them; the count drops on panic too.
struct ActiveGuard(IntGauge);

impl ActiveGuard {
    fn enter(name: &str) -> Self {
        let gauge = LISTENER_ACTIVE.with_label_values(&[name]);
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) { self.0.dec(); }
}

/// Run one callback on every handler. With `stop_on_fatal`, the first fatal
/// error skips the remaining handlers. Returns whether any error was fatal.
fn each_handler<T>(
    handlers: &mut [BoxedHandler<T>],
    ctx: &ListenerContext,
    hook: &'static str,
    stop_on_fatal: bool,
    mut f: impl FnMut(&mut BoxedHandler<T>, &ListenerContext) -> WorkResult,
) -> bool {
    let mut fatal = false;
    for handler in handlers.iter_mut() {
        let Err(e) = f(handler, ctx) else {
            continue;
        };
        LISTENER_HANDLER_ERRORS.with_label_values(&[ctx.name()]).inc();
        if e.is_fatal() {
            error!(listener = ctx.name(), hook, error = %e, "Handler failed fatally");
            fatal = true;
            if stop_on_fatal {
                break;
            }
        } else {
            warn!(listener = ctx.name(), hook, error = %e, "Handler failed");
        }
    }
    fatal
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn active(name: &str) -> i64 { LISTENER_ACTIVE.with_label_values(&[name]).get() }

    fn wait_for_active(name: &str, expected: i64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while active(name) != expected {
            assert!(Instant::now() < deadline, "listener_active never reached {expected}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn spawn_named(name: &str) -> ListenerHandle<StopMode, u32> {
        let config = ListenerConfig::builder()
            .name(name)
            .poll_interval(Duration::from_millis(10))
            .build();
        QueueListener::<StopMode, u32>::new(config).spawn().unwrap()
    }

    #[test]
    fn test_active_gauge_counts_listeners_sharing_a_name() {
        let name = "active-gauge-shared";
        let first = spawn_named(name);
        let second = spawn_named(name);
        wait_for_active(name, 2);

        first.stop(StopMode::Drain).unwrap();
        assert_eq!(active(name), 1);
        assert!(!second.is_finished());

        second.stop(StopMode::Drain).unwrap();
        assert_eq!(active(name), 0);
    }

    #[test]
    fn test_active_gauge_released_when_handler_panics() {
        let name = "active-gauge-panic";
        let config = ListenerConfig::builder()
            .name(name)
            .poll_interval(Duration::from_millis(10))
            .build();
        let listener = QueueListener::<StopMode, u32>::new(config)
            .with_handler(crate::handler_fn(|_: &u32, _ctx| panic!("handler blew up")));
        let appender = listener.appender();
        let handle = listener.spawn().unwrap();
        appender.push(1).unwrap();

        assert!(handle.join().is_err());
        assert_eq!(active(name), 0);
    }
}
