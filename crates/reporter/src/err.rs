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

use rplog_common_worker::ListenerError;
use rplog_error::{ErrorExt, StackError, StatusCode};
use snafu::Snafu;
use strum::EnumProperty;

use crate::SendItem;

/// Terminal outcome of an item the dispatch thread could not deliver.
#[derive(Debug, Snafu, strum_macros::EnumProperty)]
#[snafu(visibility(pub))]
pub enum DeliveryError {
    #[snafu(display("{item} rejected: {reason}"))]
    #[strum(props(status_code = "invalid_argument", kind = "permanent"))]
    PermanentSendFailure {
        item:   SendItem,
        reason: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("{item} undelivered after {attempts} attempts: {reason}"))]
    #[strum(props(status_code = "unavailable", kind = "retry_exhausted"))]
    RetryBudgetExhausted {
        item:     SendItem,
        attempts: u32,
        reason:   String,
        #[snafu(implicit)]
        loc:      snafu::Location,
    },
}

impl DeliveryError {
    pub const fn item(&self) -> &SendItem {
        match self {
            Self::PermanentSendFailure { item, .. } | Self::RetryBudgetExhausted { item, .. } => item,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::PermanentSendFailure { reason, .. }
            | Self::RetryBudgetExhausted { reason, .. } => reason,
        }
    }

    /// Label used for the failure metric.
    pub fn kind(&self) -> &'static str { self.get_str("kind").unwrap_or("unknown") }
}

impl ErrorExt for DeliveryError {
    fn status_code(&self) -> StatusCode {
        self.get_str("status_code")
            .and_then(|value| value.parse().ok())
            .unwrap_or(StatusCode::Unknown)
    }
}

impl StackError for DeliveryError {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) {
        let loc = match self {
            Self::PermanentSendFailure { loc, .. } | Self::RetryBudgetExhausted { loc, .. } => loc,
        };
        buf.push(format!("{layer}: {self}, at {loc}"));
    }

    fn next(&self) -> Option<&dyn StackError> { None }
}

pub type Result<T> = std::result::Result<T, ReportError>;

#[derive(Debug, Snafu, strum_macros::EnumProperty)]
#[snafu(visibility(pub))]
pub enum ReportError {
    #[snafu(display("Reporter is already stopped"))]
    #[strum(props(status_code = "conflict"))]
    AlreadyStopped {
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Failed to start the dispatch thread"))]
    #[strum(props(status_code = "internal"))]
    SpawnWorker {
        source: ListenerError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Dispatch thread panicked"))]
    #[strum(props(status_code = "internal"))]
    WorkerPanicked {
        source: ListenerError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("{} item(s) could not be delivered during shutdown", failures.len()))]
    #[strum(props(status_code = "unavailable"))]
    Undelivered {
        failures: Vec<DeliveryError>,
        #[snafu(implicit)]
        loc:      snafu::Location,
    },
}

impl ReportError {
    /// Failures collected while draining, if this is an `Undelivered` error.
    pub fn failures(&self) -> &[DeliveryError] {
        match self {
            Self::Undelivered { failures, .. } => failures,
            _ => &[],
        }
    }
}

impl ErrorExt for ReportError {
    fn status_code(&self) -> StatusCode {
        self.get_str("status_code")
            .and_then(|value| value.parse().ok())
            .unwrap_or(StatusCode::Unknown)
    }
}

impl StackError for ReportError {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) {
        buf.push(format!("{layer}: {self}"));
        for (i, failure) in self.failures().iter().enumerate() {
            failure.debug_fmt(layer + 1 + i, buf);
        }
    }

    fn next(&self) -> Option<&dyn StackError> {
        self.failures().first().map(|failure| failure as &dyn StackError)
    }
}
