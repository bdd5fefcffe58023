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

use std::sync::LazyLock;

use prometheus::{IntCounter, IntCounterVec, register_int_counter, register_int_counter_vec};

pub const KIND_LABEL: &str = "kind";

pub static BATCHES_QUEUED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "rplog_batches_queued_total",
        "Items pushed onto the dispatch queue, by kind (batch or single)",
        &[KIND_LABEL]
    )
    .unwrap()
});

pub static ITEMS_DELIVERED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "rplog_items_delivered_total",
        "Log records acknowledged by the reporting service"
    )
    .unwrap()
});

pub static SEND_ATTEMPTS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("rplog_send_attempts_total", "Calls made to the transport").unwrap()
});

pub static DELIVERY_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "rplog_delivery_failures_total",
        "Items dropped after a terminal send failure",
        &[KIND_LABEL]
    )
    .unwrap()
});

pub static ITEMS_DISCARDED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "rplog_items_discarded_total",
        "Buffered log records dropped by a forced stop"
    )
    .unwrap()
});
