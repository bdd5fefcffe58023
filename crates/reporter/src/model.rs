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

//! Records, batches and the items carried on the dispatch queue.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a log record, with the numeric codes the reporting service
/// uses for filtering.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
    Unknown,
}

impl LogLevel {
    pub const fn code(self) -> u32 {
        match self {
            Self::Trace => 5_000,
            Self::Debug => 10_000,
            Self::Info => 20_000,
            Self::Warn => 30_000,
            Self::Error => 40_000,
            Self::Fatal => 50_000,
            Self::Unknown => 60_000,
        }
    }

    pub const fn from_code(code: u32) -> Option<Self> {
        let level = match code {
            5_000 => Self::Trace,
            10_000 => Self::Debug,
            20_000 => Self::Info,
            30_000 => Self::Warn,
            40_000 => Self::Error,
            50_000 => Self::Fatal,
            60_000 => Self::Unknown,
            _ => return None,
        };
        Some(level)
    }
}

/// A file sent together with a log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    name:      String,
    content:   Bytes,
    mime_type: String,
}

impl Attachment {
    pub const DEFAULT_MIME_TYPE: &'static str = "application/octet-stream";

    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name:      name.into(),
            content:   content.into(),
            mime_type: Self::DEFAULT_MIME_TYPE.to_string(),
        }
    }

    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn name(&self) -> &str { &self.name }

    pub const fn content(&self) -> &Bytes { &self.content }

    pub fn mime_type(&self) -> &str { &self.mime_type }
}

/// One log entry. Immutable once built.
///
/// ```ignore
/// let record = LogRecord::builder()
///     .launch_id("launch-uuid")
///     .message("step passed")
///     .level(LogLevel::Info)
///     .build();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder)]
pub struct LogRecord {
    #[builder(into)]
    launch_id:  String,
    #[builder(into)]
    message:    String,
    #[builder(default)]
    level:      LogLevel,
    #[builder(default = Utc::now())]
    timestamp:  DateTime<Utc>,
    #[builder(into)]
    item_id:    Option<String>,
    attachment: Option<Attachment>,
}

impl LogRecord {
    pub fn launch_id(&self) -> &str { &self.launch_id }

    pub fn message(&self) -> &str { &self.message }

    pub const fn level(&self) -> LogLevel { self.level }

    pub const fn timestamp(&self) -> DateTime<Utc> { self.timestamp }

    pub fn item_id(&self) -> Option<&str> { self.item_id.as_deref() }

    pub const fn attachment(&self) -> Option<&Attachment> { self.attachment.as_ref() }

    pub const fn has_attachment(&self) -> bool { self.attachment.is_some() }
}

/// Records flushed together, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    seq:     u64,
    records: Vec<LogRecord>,
}

impl Batch {
    pub(crate) const fn new(seq: u64, records: Vec<LogRecord>) -> Self { Self { seq, records } }

    /// Per-reporter sequence number, starting at 1.
    pub const fn seq(&self) -> u64 { self.seq }

    pub fn records(&self) -> &[LogRecord] { &self.records }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }
}

/// Unit of work on the dispatch queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendItem {
    Batch(Batch),
    /// A record carrying an attachment. Never coalesced with others.
    Single(LogRecord),
}

impl SendItem {
    pub fn records(&self) -> &[LogRecord] {
        match self {
            Self::Batch(batch) => batch.records(),
            Self::Single(record) => std::slice::from_ref(record),
        }
    }

    pub fn len(&self) -> usize { self.records().len() }

    pub fn is_empty(&self) -> bool { self.records().is_empty() }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Batch(_) => "batch",
            Self::Single(_) => "single",
        }
    }
}

impl fmt::Display for SendItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batch(batch) => write!(f, "batch #{} ({} records)", batch.seq, batch.len()),
            Self::Single(record) => {
                let name = record.attachment().map_or("", Attachment::name);
                write!(f, "attachment '{name}'")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_level_codes_round_trip() {
        for level in LogLevel::iter() {
            assert_eq!(LogLevel::from_code(level.code()), Some(level));
        }
        assert_eq!(LogLevel::from_code(42), None);
    }

    #[test_case("info", LogLevel::Info)]
    #[test_case("WARN", LogLevel::Warn)]
    #[test_case("Error", LogLevel::Error)]
    fn test_level_parses_any_case(raw: &str, expected: LogLevel) {
        assert_eq!(LogLevel::from_str(raw).unwrap(), expected);
    }

    #[test]
    fn test_levels_are_ordered_by_severity() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Error < LogLevel::Fatal);
        assert_eq!(serde_json::to_string(&LogLevel::Warn).unwrap(), "\"warn\"");
    }

    #[test]
    fn test_builder_defaults() {
        let before = Utc::now();
        let record = LogRecord::builder().launch_id("l").message("m").build();
        assert_eq!(record.level(), LogLevel::Info);
        assert!(record.timestamp() >= before);
        assert_eq!(record.item_id(), None);
        assert!(!record.has_attachment());
    }

    #[test]
    fn test_attachment_mime_defaults_to_octet_stream() {
        let attachment = Attachment::new("dump.bin", vec![1_u8, 2, 3]);
        assert_eq!(attachment.mime_type(), "application/octet-stream");
        let attachment = attachment.with_mime_type("image/png");
        assert_eq!(attachment.mime_type(), "image/png");
        assert_eq!(attachment.content().len(), 3);
    }

    #[test]
    fn test_send_item_display() {
        let record = LogRecord::builder().launch_id("l").message("m").build();
        let batch = SendItem::Batch(Batch::new(7, vec![record.clone(), record.clone()]));
        assert_eq!(batch.to_string(), "batch #7 (2 records)");
        assert_eq!(batch.kind(), "batch");

        let single = LogRecord::builder()
            .launch_id("l")
            .message("screenshot")
            .attachment(Attachment::new("shot.png", Bytes::from_static(b"png")))
            .build();
        let single = SendItem::Single(single);
        assert_eq!(single.to_string(), "attachment 'shot.png'");
        assert_eq!(single.len(), 1);
    }
}
