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

use crate::{ListenerContext, StopMode, WorkResult};

/// Receives every item a [`QueueListener`](crate::QueueListener) pops.
///
/// Handlers run on the listener thread in registration order. Returning a
/// fatal [`WorkError`](crate::WorkError) from [`handle`](Self::handle) or
/// [`on_start`](Self::on_start) stops the listener immediately.
pub trait Handler<T>: Send {
    /// Called once on the listener thread before the first item.
    fn on_start(&mut self, _ctx: &ListenerContext) -> WorkResult { Ok(()) }

    fn handle(&mut self, item: &T, ctx: &ListenerContext) -> WorkResult;

    /// Called once when a stop is observed, before any remaining items are
    /// drained or discarded.
    fn on_stop(&mut self, _mode: StopMode, _ctx: &ListenerContext) -> WorkResult { Ok(()) }

    /// Called once right before the listener thread exits. Always runs, even
    /// after a fatal error.
    fn on_shutdown(&mut self, _ctx: &ListenerContext) -> WorkResult { Ok(()) }
}

/// Handler backed by a closure. See [`handler_fn`].
pub struct FnHandler<F>(F);

/// Wrap a closure as a [`Handler`].
pub const fn handler_fn<T, F>(f: F) -> FnHandler<F>
where
    F: FnMut(&T, &ListenerContext) -> WorkResult + Send,
{
    FnHandler(f)
}

impl<T, F> Handler<T> for FnHandler<F>
where
    F: FnMut(&T, &ListenerContext) -> WorkResult + Send,
{
    fn handle(&mut self, item: &T, ctx: &ListenerContext) -> WorkResult { (self.0)(item, ctx) }
}
