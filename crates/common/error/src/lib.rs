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

//! Status codes and error extension traits shared by the rplog crates.

use std::error::Error as StdError;

use http::StatusCode as HttpStatusCode;
use serde::Serialize;
use strum::EnumProperty;

/// Coarse classification of a failure.
///
/// `retryable` marks the codes a sender may try again without changing the
/// request; everything else is permanent.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Serialize,
    strum_macros::Display,
    strum_macros::EnumProperty,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusCode {
    #[strum(props(http_status = "400", retryable = "false"))]
    InvalidArgument,
    #[strum(props(http_status = "401", retryable = "false"))]
    Unauthorized,
    #[strum(props(http_status = "403", retryable = "false"))]
    Forbidden,
    #[strum(props(http_status = "404", retryable = "false"))]
    NotFound,
    #[strum(props(http_status = "408", retryable = "true"))]
    RequestTimeout,
    #[strum(props(http_status = "409", retryable = "false"))]
    Conflict,
    #[strum(props(http_status = "413", retryable = "false"))]
    PayloadTooLarge,
    #[strum(props(http_status = "429", retryable = "true"))]
    RateLimited,
    #[strum(props(http_status = "500", retryable = "true"))]
    Internal,
    #[strum(props(http_status = "503", retryable = "true"))]
    Unavailable,
    /// The request never produced a response (connect, TLS, timeout).
    #[strum(props(http_status = "503", retryable = "true"))]
    Network,
    /// A response arrived but could not be understood.
    #[strum(props(http_status = "502", retryable = "false"))]
    InvalidResponse,
    #[strum(props(http_status = "500", retryable = "false"))]
    Unknown,
}

impl StatusCode {
    pub fn http_status(self) -> HttpStatusCode {
        self.get_str("http_status")
            .and_then(|value| value.parse::<u16>().ok())
            .and_then(|value| HttpStatusCode::from_u16(value).ok())
            .unwrap_or(HttpStatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn is_retryable(self) -> bool { self.get_str("retryable") == Some("true") }

    /// Map an HTTP response status onto a status code. Success statuses map to
    /// `None`.
    pub fn from_http(status: u16) -> Option<Self> {
        let code = match status {
            100..=399 => return None,
            400 => Self::InvalidArgument,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            408 => Self::RequestTimeout,
            409 => Self::Conflict,
            413 => Self::PayloadTooLarge,
            429 => Self::RateLimited,
            500 | 501 => Self::Internal,
            502..=599 => Self::Unavailable,
            _ => Self::Unknown,
        };
        Some(code)
    }
}

pub trait StackError: StdError {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>);

    fn next(&self) -> Option<&dyn StackError>;

    fn last(&self) -> &dyn StackError
    where
        Self: Sized,
    {
        let Some(mut result) = self.next() else {
            return self;
        };
        while let Some(err) = result.next() {
            result = err;
        }
        result
    }
}

pub trait ErrorExt: StackError {
    fn status_code(&self) -> StatusCode { StatusCode::Unknown }

    /// Message suitable for showing to an end user: the innermost layer of
    /// the stack plus the root cause of any external error it wraps. Internal
    /// errors only show their status code.
    fn output_msg(&self) -> String
    where
        Self: Sized,
    {
        if matches!(self.status_code(), StatusCode::Unknown | StatusCode::Internal) {
            return format!("Internal error: {}", self.status_code());
        }
        let error = self.last();
        let Some(mut root) = error.source() else {
            return error.to_string();
        };
        while let Some(source) = root.source() {
            root = source;
        }
        format!("{error}: {root}")
    }
}

/// Render the layered `debug_fmt` output of an error, one layer per line.
pub fn format_stack(err: &dyn StackError) -> String {
    let mut buf = Vec::new();
    err.debug_fmt(0, &mut buf);
    buf.join("\n")
}

#[cfg(test)]
mod tests {
    use std::{fmt, io, str::FromStr};

    use test_case::test_case;

    use super::*;

    #[test_case(200, None ; "ok")]
    #[test_case(201, None ; "created")]
    #[test_case(400, Some(StatusCode::InvalidArgument) ; "bad request")]
    #[test_case(401, Some(StatusCode::Unauthorized) ; "unauthorized")]
    #[test_case(404, Some(StatusCode::NotFound) ; "not found")]
    #[test_case(418, Some(StatusCode::Unknown) ; "teapot")]
    #[test_case(429, Some(StatusCode::RateLimited) ; "rate limited")]
    #[test_case(501, Some(StatusCode::Internal) ; "not implemented")]
    #[test_case(503, Some(StatusCode::Unavailable) ; "unavailable")]
    fn test_from_http(status: u16, expected: Option<StatusCode>) {
        assert_eq!(StatusCode::from_http(status), expected);
    }

    #[test_case(StatusCode::RateLimited, true)]
    #[test_case(StatusCode::Unavailable, true)]
    #[test_case(StatusCode::Network, true)]
    #[test_case(StatusCode::RequestTimeout, true)]
    #[test_case(StatusCode::InvalidArgument, false)]
    #[test_case(StatusCode::Unauthorized, false)]
    #[test_case(StatusCode::InvalidResponse, false)]
    fn test_retryable(code: StatusCode, retryable: bool) {
        assert_eq!(code.is_retryable(), retryable);
    }

    #[test]
    fn test_names_round_trip_through_strum() {
        assert_eq!(StatusCode::RateLimited.to_string(), "rate_limited");
        assert_eq!(
            StatusCode::from_str("invalid_response").unwrap(),
            StatusCode::InvalidResponse
        );
        assert_eq!(StatusCode::Network.http_status(), HttpStatusCode::SERVICE_UNAVAILABLE);
    }

    #[derive(Debug)]
    struct WriteFailed(io::Error, StatusCode);

    impl fmt::Display for WriteFailed {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("write failed") }
    }

    impl StdError for WriteFailed {
        fn source(&self) -> Option<&(dyn StdError + 'static)> { Some(&self.0) }
    }

    impl StackError for WriteFailed {
        fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) {
            buf.push(format!("{layer}: {self}"));
        }

        fn next(&self) -> Option<&dyn StackError> { None }
    }

    impl ErrorExt for WriteFailed {
        fn status_code(&self) -> StatusCode { self.1 }
    }

    #[test]
    fn test_output_msg_appends_root_cause() {
        let err = WriteFailed(io::Error::other("disk full"), StatusCode::Unavailable);
        assert_eq!(err.output_msg(), "write failed: disk full");
        assert_eq!(format_stack(&err), "0: write failed");

        let err = WriteFailed(io::Error::other("bug"), StatusCode::Internal);
        assert_eq!(err.output_msg(), "Internal error: internal");
    }
}
