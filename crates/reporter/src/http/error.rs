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

use reqwest::header::InvalidHeaderValue;
use rplog_error::{ErrorExt, StackError, StatusCode};
use snafu::Snafu;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ClientError {
    #[snafu(display("API token is not a valid header value"))]
    InvalidToken {
        source: InvalidHeaderValue,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to build HTTP client"))]
    BuildClient {
        source: reqwest::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Request to {url} failed"))]
    Request {
        url:    String,
        source: reqwest::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("{url} rejected the request: {reason}"))]
    Rejected {
        url:    String,
        code:   StatusCode,
        reason: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Response from {url} is not valid JSON"))]
    Decode {
        url:    String,
        source: serde_json::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Response from {url} has no '{field}'"))]
    MissingField {
        url:   String,
        field: &'static str,
        #[snafu(implicit)]
        loc:   snafu::Location,
    },
}

impl ErrorExt for ClientError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidToken { .. } => StatusCode::Unauthorized,
            Self::BuildClient { .. } => StatusCode::Internal,
            Self::Request { .. } => StatusCode::Network,
            Self::Rejected { code, .. } => *code,
            Self::Decode { .. } | Self::MissingField { .. } => StatusCode::InvalidResponse,
        }
    }
}

impl StackError for ClientError {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) {
        buf.push(format!("{layer}: {self}"));
    }

    fn next(&self) -> Option<&dyn StackError> { None }
}
