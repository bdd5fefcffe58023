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

use std::{error::Error as StdError, fmt};

use snafu::Snafu;

/// Result returned by [`Handler`](crate::Handler) callbacks.
pub type WorkResult<T = ()> = std::result::Result<T, WorkError>;

type BoxedSource = Box<dyn StdError + Send + Sync>;

/// How the listener reacts to a handler error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ErrorSeverity {
    /// Logged; the listener moves on to the next handler and item.
    #[display("transient")]
    Transient,

    /// The listener stops as if an immediate stop had been requested.
    #[display("fatal")]
    Fatal,
}

/// Error raised by a handler.
#[derive(Debug)]
pub struct WorkError {
    severity: ErrorSeverity,
    message:  String,
    source:   Option<BoxedSource>,
}

impl WorkError {
    pub fn new(severity: ErrorSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            source: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorSeverity::Transient, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self { Self::new(ErrorSeverity::Fatal, message) }

    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    #[must_use]
    pub const fn severity(&self) -> ErrorSeverity { self.severity }

    #[must_use]
    pub fn is_fatal(&self) -> bool { self.severity == ErrorSeverity::Fatal }

    #[must_use]
    pub fn message(&self) -> &str { &self.message }
}

impl fmt::Display for WorkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

impl StdError for WorkError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn StdError + 'static))
    }
}

pub type Result<T> = std::result::Result<T, ListenerError>;

/// Lifecycle failures of the listener thread itself.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ListenerError {
    #[snafu(display("Failed to spawn listener thread {name}"))]
    Spawn {
        name:   String,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Listener thread {name} panicked"))]
    Panicked {
        name: String,
        #[snafu(implicit)]
        loc:  snafu::Location,
    },
}
