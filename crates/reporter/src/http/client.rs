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

use std::sync::Arc;

use reqwest::blocking::{Client, RequestBuilder};
use snafu::{OptionExt, ResultExt};
use tracing::{debug, info};

use super::{
    ClientResult, FinishExecutionRq, FinishItemRq, HttpTransport, Issue, ItemStatus,
    StartItemRq, StartLaunchRq, UpdateItemRq, build_client,
    error::{DecodeSnafu, MissingFieldSnafu, RejectedSnafu, RequestSnafu},
    parse_response,
    payload::{ServiceResponse, uri_join},
};
use crate::{Reporter, ReporterConfig, ServiceConfig, TracingObserver};

/// Blocking client for launches and test items.
///
/// Logs do not go through this client directly; [`log_reporter`](Self::log_reporter)
/// hands out a batching [`Reporter`] that shares its HTTP connection pool.
pub struct ServiceClient {
    config:   ServiceConfig,
    http:     Client,
    base_url: String,
}

impl ServiceClient {
    pub fn new(config: ServiceConfig) -> ClientResult<Self> {
        let http = build_client(&config)?;
        let base_url = uri_join(&[&config.endpoint, &config.api_base, &config.project]);
        Ok(Self {
            config,
            http,
            base_url,
        })
    }

    pub const fn config(&self) -> &ServiceConfig { &self.config }

    /// `{endpoint}/{api_base}/{project}`.
    pub fn base_url(&self) -> &str { &self.base_url }

    /// Returns the new launch's id.
    pub fn start_launch(&self, rq: &StartLaunchRq) -> ClientResult<String> {
        let url = self.url(&["launch"]);
        let id = id_of(self.http.post(&url).json(rq), &url)?;
        info!(launch = %id, name = %rq.name, "Launch started");
        Ok(id)
    }

    /// Returns the service's confirmation message.
    pub fn finish_launch(&self, launch_id: &str, rq: &FinishExecutionRq) -> ClientResult<String> {
        let url = self.url(&["launch", launch_id, "finish"]);
        let msg = msg_of(self.http.put(&url).json(rq), &url)?;
        info!(launch = %launch_id, status = ?rq.status, "Launch finished");
        Ok(msg)
    }

    pub fn stop_launch(&self, launch_id: &str, rq: &FinishExecutionRq) -> ClientResult<String> {
        let url = self.url(&["launch", launch_id, "stop"]);
        let msg = msg_of(self.http.put(&url).json(rq), &url)?;
        info!(launch = %launch_id, "Launch stopped");
        Ok(msg)
    }

    /// Start a root item, or a child of `parent`. Returns the item id.
    pub fn start_test_item(&self, parent: Option<&str>, rq: &StartItemRq) -> ClientResult<String> {
        let url = match parent {
            Some(parent) => self.url(&["item", parent]),
            None => self.url(&["item"]),
        };
        let id = id_of(self.http.post(&url).json(rq), &url)?;
        debug!(item = %id, parent, name = %rq.name, "Test item started");
        Ok(id)
    }

    /// Finish an item. With `investigate_skipped` off, a skipped item without
    /// an issue is sent as `NOT_ISSUE`.
    pub fn finish_test_item(&self, item_id: &str, mut rq: FinishItemRq) -> ClientResult<String> {
        if !self.config.investigate_skipped
            && rq.status == Some(ItemStatus::Skipped)
            && rq.issue.is_none()
        {
            rq.issue = Some(Issue::not_issue());
        }
        let url = self.url(&["item", item_id]);
        let msg = msg_of(self.http.put(&url).json(&rq), &url)?;
        debug!(item = %item_id, status = ?rq.status, "Test item finished");
        Ok(msg)
    }

    /// Replace an item's description and attributes.
    pub fn update_test_item(&self, item_id: &str, rq: &UpdateItemRq) -> ClientResult<String> {
        let url = self.url(&["item", item_id, "update"]);
        let msg = msg_of(self.http.put(&url).json(rq), &url)?;
        debug!(item = %item_id, "Test item updated");
        Ok(msg)
    }

    /// The project's settings exactly as the service returns them.
    pub fn get_project_settings(&self) -> ClientResult<serde_json::Value> {
        let url = self.url(&["settings"]);
        let (_, body) = exchange(self.http.get(&url), &url)?;
        serde_json::from_str(&body).context(DecodeSnafu { url })
    }

    /// Transport for the `log` endpoint sharing this client's connection pool.
    pub fn log_transport(&self) -> HttpTransport {
        HttpTransport::from_parts(self.http.clone(), self.url(&["log"]))
    }

    /// A reporter that batches logs for `launch_id` over [`log_transport`](Self::log_transport).
    /// The reporter still has to be started.
    pub fn log_reporter(&self, launch_id: &str, config: ReporterConfig) -> Reporter {
        Reporter::with_observer(
            config,
            self.log_transport(),
            Arc::new(TracingObserver::new(launch_id)),
        )
    }

    fn url(&self, parts: &[&str]) -> String {
        let mut all = Vec::with_capacity(parts.len() + 1);
        all.push(self.base_url.as_str());
        all.extend_from_slice(parts);
        uri_join(&all)
    }
}

fn id_of(request: RequestBuilder, url: &str) -> ClientResult<String> {
    let (response, _) = exchange(request, url)?;
    response.id.context(MissingFieldSnafu { url, field: "id" })
}

fn msg_of(request: RequestBuilder, url: &str) -> ClientResult<String> {
    let (response, _) = exchange(request, url)?;
    response.msg.context(MissingFieldSnafu { url, field: "msg" })
}

/// Send a request and classify the answer. Returns the parsed response along
/// with the raw body.
fn exchange(request: RequestBuilder, url: &str) -> ClientResult<(ServiceResponse, String)> {
    let response = request.send().context(RequestSnafu { url })?;
    let status = response.status().as_u16();
    let text = response.text().context(RequestSnafu { url })?;
    let parsed = parse_response(status, &text).map_err(|rejection| {
        RejectedSnafu {
            url,
            code: rejection.code,
            reason: rejection.reason,
        }
        .build()
    })?;
    Ok((parsed, text))
}
