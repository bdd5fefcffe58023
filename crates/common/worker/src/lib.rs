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

//! Thread-backed queue listener.
//!
//! ```ignore
//! let listener = QueueListener::<StopMode, String>::new(ListenerConfig::default())
//!     .with_handler(handler_fn(|line: &String, _ctx| {
//!         println!("{line}");
//!         Ok(())
//!     }));
//! let appender = listener.appender();
//! let handle = listener.spawn()?;
//!
//! appender.push("hello".to_string())?;
//! let report = handle.stop(StopMode::Drain)?;
//! ```

mod config;
mod context;
mod err;
mod handle;
mod handler;
mod listener;
mod metrics;
mod stop;

pub use config::ListenerConfig;
pub use context::ListenerContext;
pub use err::{ErrorSeverity, ListenerError, Result, WorkError, WorkResult};
pub use handle::ListenerHandle;
pub use handler::{FnHandler, Handler, handler_fn};
pub use listener::{ListenerReport, QueueListener};
pub use stop::{ControlSignal, StopMode};
