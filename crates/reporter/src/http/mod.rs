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

//! Blocking HTTP binding to the reporting service.

mod client;
mod error;
mod payload;
mod transport;

use reqwest::{
    blocking::Client,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use rplog_error::StatusCode;
use snafu::ResultExt;

pub use self::{
    client::ServiceClient,
    error::{ClientError, ClientResult},
    payload::{
        ExternalIssue, FinishExecutionRq, FinishItemRq, Issue, ItemAttribute, ItemStatus,
        ItemType, LaunchMode, Parameter, StartItemRq, StartLaunchRq, UpdateItemRq,
        attributes_from_map, parameters_from_map,
    },
    transport::HttpTransport,
};
use self::{
    error::{BuildClientSnafu, InvalidTokenSnafu},
    payload::ServiceResponse,
};
use crate::ServiceConfig;

/// Client with the bearer token, timeout and TLS settings applied.
fn build_client(config: &ServiceConfig) -> ClientResult<Client> {
    let mut auth =
        HeaderValue::from_str(&format!("bearer {}", config.token)).context(InvalidTokenSnafu)?;
    auth.set_sensitive(true);
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);

    Client::builder()
        .default_headers(headers)
        .timeout(config.timeout())
        .danger_accept_invalid_certs(!config.verify_ssl)
        .build()
        .context(BuildClientSnafu)
}

/// A response the service refused or that could not be read.
#[derive(Debug)]
struct Rejection {
    code:   StatusCode,
    reason: String,
}

const BODY_EXCERPT: usize = 256;

/// Classify a response. Error entries in a 2xx body count as a rejection of
/// the whole request.
fn parse_response(status: u16, body: &str) -> Result<ServiceResponse, Rejection> {
    let parsed = if body.trim().is_empty() {
        None
    } else {
        Some(serde_json::from_str::<ServiceResponse>(body))
    };

    let Some(code) = StatusCode::from_http(status) else {
        let response = match parsed {
            Some(Ok(response)) => response,
            Some(Err(e)) => {
                return Err(Rejection {
                    code:   StatusCode::InvalidResponse,
                    reason: format!("invalid response: {e}: {}", excerpt(body)),
                });
            }
            None => {
                return Err(Rejection {
                    code:   StatusCode::InvalidResponse,
                    reason: "empty response".to_string(),
                });
            }
        };
        let errors = response.error_messages();
        if errors.is_empty() {
            return Ok(response);
        }
        return Err(Rejection {
            code:   StatusCode::InvalidArgument,
            reason: errors.join("; "),
        });
    };

    let errors = match parsed {
        Some(Ok(response)) => response.error_messages(),
        _ => Vec::new(),
    };
    let reason = if errors.is_empty() {
        format!("HTTP {status}: {}", excerpt(body))
    } else {
        errors.join("; ")
    };
    Err(Rejection { code, reason })
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(BODY_EXCERPT) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}
