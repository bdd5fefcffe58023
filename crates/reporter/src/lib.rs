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

//! Asynchronous log delivery for a ReportPortal-style reporting service.
//!
//! Producers hand [`LogRecord`]s to a [`Reporter`], which batches them and
//! feeds a single background thread. That thread sends each item through a
//! [`Transport`], retrying transient failures, and routes terminal failures
//! to an error handler.
//!
//! ```ignore
//! let client = ServiceClient::new(service_config)?;
//! let launch = client.start_launch(&StartLaunchRq::builder().name("nightly").build())?;
//!
//! let reporter = client.log_reporter(&launch, ReporterConfig::default());
//! reporter.start()?;
//! reporter.submit(LogRecord::builder().launch_id(&launch).message("hello").build())?;
//! reporter.stop(true)?;
//! ```

mod command;
mod config;
mod dispatch;
mod err;
pub mod http;
mod metrics;
mod model;
mod observer;
mod reporter;
mod transport;

pub use command::{Command, WorkerState};
pub use config::{ReporterConfig, ServiceConfig};
pub use dispatch::ErrorHandler;
pub use err::{DeliveryError, ReportError, Result};
pub use model::{Attachment, Batch, LogLevel, LogRecord, SendItem};
pub use observer::{PipelineObserver, TracingObserver};
pub use reporter::Reporter;
pub use transport::{Transport, TransportError};
