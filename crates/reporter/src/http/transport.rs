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

use reqwest::blocking::{
    Client,
    multipart::{Form, Part},
};
use rplog_error::StatusCode;

use super::{
    ClientResult, build_client, parse_response,
    payload::{SaveLog, uri_join},
};
use crate::{LogRecord, SendItem, ServiceConfig, Transport, TransportError};

/// [`Transport`] posting log records to the service's `log` endpoint.
///
/// Every item goes out as one multipart request: a `json_request_part` array
/// with one entry per record, plus a `file` part per attachment.
pub struct HttpTransport {
    http:    Client,
    log_url: String,
}

impl HttpTransport {
    pub fn new(config: &ServiceConfig) -> ClientResult<Self> {
        let http = build_client(config)?;
        let log_url = uri_join(&[&config.endpoint, &config.api_base, &config.project, "log"]);
        Ok(Self::from_parts(http, log_url))
    }

    pub(crate) const fn from_parts(http: Client, log_url: String) -> Self { Self { http, log_url } }

    pub fn log_url(&self) -> &str { &self.log_url }
}

impl Transport for HttpTransport {
    fn send(&mut self, item: &SendItem) -> Result<Vec<String>, TransportError> {
        let form = multipart_form(item.records())?;
        let response = self
            .http
            .post(&self.log_url)
            .multipart(form)
            .send()
            .map_err(request_failure)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(request_failure)?;
        let response = parse_response(status, &body)
            .map_err(|rejection| TransportError::from_status(rejection.code, rejection.reason))?;
        Ok(response.ids())
    }
}

fn multipart_form(records: &[LogRecord]) -> Result<Form, TransportError> {
    let entries: Vec<SaveLog<'_>> = records.iter().map(SaveLog::from).collect();
    let json = serde_json::to_vec(&entries)
        .map_err(|e| TransportError::permanent(format!("encoding log entries: {e}")))?;
    let json_part = Part::bytes(json)
        .mime_str("application/json")
        .map_err(request_failure)?;

    let mut form = Form::new().part("json_request_part", json_part);
    for attachment in records.iter().filter_map(LogRecord::attachment) {
        let part = Part::bytes(attachment.content().to_vec())
            .file_name(attachment.name().to_string())
            .mime_str(attachment.mime_type())
            .map_err(request_failure)?;
        form = form.part("file", part);
    }
    Ok(form)
}

/// Requests that could not be built are permanent; anything that went wrong
/// on the wire may work next time.
fn request_failure(e: reqwest::Error) -> TransportError {
    let code = if e.is_builder() {
        StatusCode::InvalidArgument
    } else {
        StatusCode::Network
    };
    TransportError::from_status(code, e.to_string())
}
