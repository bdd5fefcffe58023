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

use rplog_error::StatusCode;
use snafu::Snafu;

use crate::SendItem;

/// Sends one [`SendItem`] to the reporting service.
///
/// A transport is owned by the dispatch thread and never shared. Encoding,
/// authentication and addressing are its business; the pipeline only looks
/// at the outcome.
pub trait Transport: Send {
    /// Returns the ids the service acknowledged for the item's records.
    fn send(&mut self, item: &SendItem) -> Result<Vec<String>, TransportError>;
}

impl<Tr: Transport + ?Sized> Transport for Box<Tr> {
    fn send(&mut self, item: &SendItem) -> Result<Vec<String>, TransportError> {
        (**self).send(item)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum TransportError {
    /// May succeed if sent again unchanged.
    #[snafu(display("transient send failure: {reason}"))]
    Transient { reason: String },

    #[snafu(display("permanent send failure: {reason}"))]
    Permanent { reason: String },
}

impl TransportError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::Permanent {
            reason: reason.into(),
        }
    }

    /// Classify by status code: retryable codes become transient.
    pub fn from_status(code: StatusCode, reason: impl Into<String>) -> Self {
        if code.is_retryable() {
            Self::transient(reason)
        } else {
            Self::permanent(reason)
        }
    }

    pub const fn is_transient(&self) -> bool { matches!(self, Self::Transient { .. }) }

    pub fn reason(&self) -> &str {
        match self {
            Self::Transient { reason } | Self::Permanent { reason } => reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(StatusCode::RateLimited, true)]
    #[test_case(StatusCode::Unavailable, true)]
    #[test_case(StatusCode::Network, true)]
    #[test_case(StatusCode::Unauthorized, false)]
    #[test_case(StatusCode::InvalidResponse, false)]
    fn test_from_status(code: StatusCode, transient: bool) {
        let err = TransportError::from_status(code, "boom");
        assert_eq!(err.is_transient(), transient);
        assert_eq!(err.reason(), "boom");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            TransportError::transient("timed out").to_string(),
            "transient send failure: timed out"
        );
    }
}
