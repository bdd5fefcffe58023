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

use prometheus::{IntCounterVec, IntGaugeVec, register_int_counter_vec, register_int_gauge_vec};

pub const LISTENER_LABEL: &str = "listener";
pub const MODE_LABEL: &str = "mode";

pub static LISTENER_STARTED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "listener_started_total",
        "Total number of queue listeners started",
        &[LISTENER_LABEL]
    )
    .unwrap()
});

pub static LISTENER_STOPPED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "listener_stopped_total",
        "Total number of queue listeners stopped, by stop mode",
        &[LISTENER_LABEL, MODE_LABEL]
    )
    .unwrap()
});

pub static LISTENER_ITEMS_HANDLED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "listener_items_handled_total",
        "Total number of items dispatched to handlers",
        &[LISTENER_LABEL]
    )
    .unwrap()
});

pub static LISTENER_ITEMS_DISCARDED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "listener_items_discarded_total",
        "Total number of queued items dropped by an immediate stop",
        &[LISTENER_LABEL]
    )
    .unwrap()
});

pub static LISTENER_HANDLER_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "listener_handler_errors_total",
        "Total number of handler errors",
        &[LISTENER_LABEL]
    )
    .unwrap()
});

pub static LISTENER_ACTIVE: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec!(
        "listener_active",
        "Whether the listener thread is currently running (1) or not (0)",
        &[LISTENER_LABEL]
    )
    .unwrap()
});
