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

//! Request and response bodies of the reporting service API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{LogLevel, LogRecord};

/// Join URL segments with single slashes.
pub(crate) fn uri_join(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| part.trim_matches('/'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum LaunchMode {
    #[default]
    Default,
    Debug,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ItemType {
    Suite,
    Story,
    Test,
    Scenario,
    #[default]
    Step,
    BeforeClass,
    BeforeGroups,
    BeforeMethod,
    BeforeSuite,
    BeforeTest,
    AfterClass,
    AfterGroups,
    AfterMethod,
    AfterSuite,
    AfterTest,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ItemStatus {
    Passed,
    Failed,
    Stopped,
    Skipped,
    Interrupted,
    Cancelled,
    Info,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAttribute {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key:    Option<String>,
    pub value:  String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<bool>,
}

/// Convert key/value pairs to attributes sorted by key. Pairs with an empty
/// value are skipped; `system` is copied onto every attribute.
pub fn attributes_from_map<K, V>(
    map: impl IntoIterator<Item = (K, V)>,
    system: Option<bool>,
) -> Vec<ItemAttribute>
where
    K: Into<String>,
    V: Into<String>,
{
    let mut attributes: Vec<ItemAttribute> = map
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| ItemAttribute {
            key: Some(key),
            value,
            system,
        })
        .collect();
    attributes.sort_by(|a, b| a.key.cmp(&b.key));
    attributes
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub key:   String,
    pub value: String,
}

pub fn parameters_from_map<K, V>(map: impl IntoIterator<Item = (K, V)>) -> Vec<Parameter>
where
    K: Into<String>,
    V: Into<String>,
{
    map.into_iter()
        .map(|(key, value)| Parameter {
            key:   key.into(),
            value: value.into(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[builder(into)]
    pub issue_type:             String,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment:                Option<String>,
    #[builder(default)]
    pub auto_analyzed:          bool,
    #[builder(default)]
    pub ignore_analyzer:        bool,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_system_issues: Vec<ExternalIssue>,
}

impl Issue {
    /// Marks an item as not needing investigation.
    pub fn not_issue() -> Self { Self::builder().issue_type("NOT_ISSUE").build() }
}

/// A ticket in an external bug tracker linked to an [`Issue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(rename_all = "camelCase")]
pub struct ExternalIssue {
    #[builder(into)]
    pub ticket_id:   String,
    #[builder(into)]
    pub url:         String,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bts_url:     Option<String>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bts_project: Option<String>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub submit_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, bon::Builder)]
#[serde(rename_all = "camelCase")]
pub struct StartLaunchRq {
    #[builder(into)]
    pub name:        String,
    #[builder(default = Utc::now())]
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time:  DateTime<Utc>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[builder(default)]
    pub attributes:  Vec<ItemAttribute>,
    #[builder(default)]
    pub mode:        LaunchMode,
    #[builder(default)]
    pub rerun:       bool,
    /// Id of the launch to rerun. Only read by the service when `rerun` is set.
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerun_of:    Option<String>,
}

/// Body of both the finish and the stop launch calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, bon::Builder)]
#[serde(rename_all = "camelCase")]
pub struct FinishExecutionRq {
    #[builder(default = Utc::now())]
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status:   Option<ItemStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, bon::Builder)]
#[serde(rename_all = "camelCase")]
pub struct StartItemRq {
    #[builder(into)]
    pub name:         String,
    #[builder(into)]
    pub launch_uuid:  String,
    #[builder(default = Utc::now())]
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time:   DateTime<Utc>,
    #[builder(default)]
    #[serde(rename = "type")]
    pub item_type:    ItemType,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description:  Option<String>,
    #[builder(default)]
    pub attributes:   Vec<ItemAttribute>,
    #[builder(default)]
    pub parameters:   Vec<Parameter>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_ref:     Option<String>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_case_id: Option<String>,
    #[builder(default)]
    pub retry:        bool,
    #[builder(default = true)]
    pub has_stats:    bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, bon::Builder)]
#[serde(rename_all = "camelCase")]
pub struct FinishItemRq {
    #[builder(into)]
    pub launch_uuid: String,
    #[builder(default = Utc::now())]
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end_time:    DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status:      Option<ItemStatus>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[builder(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes:  Vec<ItemAttribute>,
    pub issue:       Option<Issue>,
    #[builder(default)]
    pub retry:       bool,
}

/// Body of the item update call. Both fields replace what the item has.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, bon::Builder)]
pub struct UpdateItemRq {
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[builder(default)]
    pub attributes:  Vec<ItemAttribute>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FileRef<'a> {
    name: &'a str,
}

/// One entry of a `json_request_part`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SaveLog<'a> {
    launch_uuid: &'a str,
    time:        i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    item_uuid:   Option<&'a str>,
    message:     &'a str,
    level:       LogLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    file:        Option<FileRef<'a>>,
}

impl<'a> From<&'a LogRecord> for SaveLog<'a> {
    fn from(record: &'a LogRecord) -> Self {
        Self {
            launch_uuid: record.launch_id(),
            time:        record.timestamp().timestamp_millis(),
            item_uuid:   record.item_id(),
            message:     record.message(),
            level:       record.level(),
            file:        record.attachment().map(|a| FileRef { name: a.name() }),
        }
    }
}

/// Any response body the service sends back. Success bodies carry `id` or
/// `msg`; error bodies carry `message` and `errorCode`; batch log responses
/// nest one of each per entry under `responses`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ServiceResponse {
    #[serde(default)]
    pub(crate) id:   Option<String>,
    #[serde(default)]
    pub(crate) msg:  Option<String>,
    #[serde(default)]
    message:         Option<String>,
    #[serde(default, alias = "errorCode")]
    error_code:      Option<i64>,
    #[serde(default)]
    responses:       Vec<ServiceResponse>,
}

impl ServiceResponse {
    pub(crate) fn ids(&self) -> Vec<String> {
        self.id
            .iter()
            .cloned()
            .chain(self.responses.iter().flat_map(Self::ids))
            .collect()
    }

    pub(crate) fn error_messages(&self) -> Vec<String> {
        let own = self.message.as_ref().map(|message| match self.error_code {
            Some(code) => format!("{code}: {message}"),
            None => message.clone(),
        });
        own.into_iter()
            .chain(self.responses.iter().flat_map(Self::error_messages))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::TimeZone;
    use serde_json::json;
    use test_case::test_case;

    use super::*;
    use crate::Attachment;

    #[test_case(&["http://rp.local/", "/api/v1/", "demo"], "http://rp.local/api/v1/demo" ; "slashes trimmed")]
    #[test_case(&["http://rp.local", "", "log"], "http://rp.local/log" ; "empty part skipped")]
    fn test_uri_join(parts: &[&str], expected: &str) {
        assert_eq!(uri_join(parts), expected);
    }

    #[test]
    fn test_attributes_sorted_and_filtered() {
        let map = HashMap::from([("os", "linux"), ("arch", "x86"), ("empty", "")]);
        let attributes = attributes_from_map(map, Some(true));
        let keys: Vec<_> = attributes.iter().filter_map(|a| a.key.as_deref()).collect();
        assert_eq!(keys, ["arch", "os"]);
        assert!(attributes.iter().all(|a| a.system == Some(true)));
        assert_eq!(
            serde_json::to_value(&attributes[0]).unwrap(),
            json!({"key": "arch", "value": "x86", "system": true})
        );
    }

    #[test]
    fn test_save_log_encoding() {
        let record = LogRecord::builder()
            .launch_id("launch")
            .item_id("item")
            .message("boom")
            .level(LogLevel::Error)
            .timestamp(Utc.timestamp_millis_opt(1_700_000_000_123).unwrap())
            .attachment(Attachment::new("trace.txt", "stack"))
            .build();
        assert_eq!(
            serde_json::to_value(SaveLog::from(&record)).unwrap(),
            json!({
                "launchUuid": "launch",
                "time": 1_700_000_000_123_i64,
                "itemUuid": "item",
                "message": "boom",
                "level": "error",
                "file": {"name": "trace.txt"},
            })
        );
    }

    #[test]
    fn test_start_item_encoding() {
        let rq = StartItemRq::builder()
            .name("login works")
            .launch_uuid("launch")
            .start_time(Utc.timestamp_millis_opt(1_000).unwrap())
            .item_type(ItemType::Test)
            .parameters(parameters_from_map([("user", "admin")]))
            .build();
        let value = serde_json::to_value(&rq).unwrap();
        assert_eq!(value["type"], "TEST");
        assert_eq!(value["startTime"], 1_000);
        assert_eq!(value["parameters"], json!([{"key": "user", "value": "admin"}]));
        assert!(value.get("description").is_none());
    }

    #[test]
    fn test_issue_with_external_tickets_encoding() {
        let issue = Issue::builder()
            .issue_type("PB001")
            .external_system_issues(vec![
                ExternalIssue::builder()
                    .ticket_id("RP-42")
                    .url("https://jira.local/browse/RP-42")
                    .bts_url("https://jira.local")
                    .bts_project("RP")
                    .submit_date(Utc.timestamp_millis_opt(2_000).unwrap())
                    .build(),
            ])
            .build();
        assert_eq!(
            serde_json::to_value(&issue).unwrap(),
            json!({
                "issueType": "PB001",
                "autoAnalyzed": false,
                "ignoreAnalyzer": false,
                "externalSystemIssues": [{
                    "ticketId": "RP-42",
                    "url": "https://jira.local/browse/RP-42",
                    "btsUrl": "https://jira.local",
                    "btsProject": "RP",
                    "submitDate": 2_000,
                }],
            })
        );
        let plain = serde_json::to_value(Issue::not_issue()).unwrap();
        assert!(plain.get("externalSystemIssues").is_none());
    }

    #[test]
    fn test_rerun_launch_encoding() {
        let rq = StartLaunchRq::builder()
            .name("nightly")
            .rerun(true)
            .rerun_of("launch-1")
            .build();
        let value = serde_json::to_value(&rq).unwrap();
        assert_eq!(value["rerun"], true);
        assert_eq!(value["rerunOf"], "launch-1");

        let fresh = serde_json::to_value(StartLaunchRq::builder().name("nightly").build()).unwrap();
        assert!(fresh.get("rerunOf").is_none());
    }

    #[test]
    fn test_update_item_encoding() {
        let rq = UpdateItemRq::builder()
            .description("flaky on arm")
            .attributes(attributes_from_map([("os", "linux")], None))
            .build();
        assert_eq!(
            serde_json::to_value(&rq).unwrap(),
            json!({"description": "flaky on arm", "attributes": [{"key": "os", "value": "linux"}]})
        );
    }

    #[test]
    fn test_response_ids_and_errors() {
        let response: ServiceResponse = serde_json::from_value(json!({
            "responses": [
                {"id": "a"},
                {"message": "bad level", "errorCode": 4001},
                {"id": "b"},
            ]
        }))
        .unwrap();
        assert_eq!(response.ids(), ["a", "b"]);
        assert_eq!(response.error_messages(), ["4001: bad level"]);

        let ok: ServiceResponse = serde_json::from_value(json!({"id": "x", "msg": "ok"})).unwrap();
        assert_eq!(ok.ids(), ["x"]);
        assert!(ok.error_messages().is_empty());
    }
}
