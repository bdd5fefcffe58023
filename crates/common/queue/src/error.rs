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

use std::fmt::Debug;

use snafu::Snafu;

/// Returned when pushing onto a closed queue. Carries the rejected value
/// back to the caller.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PushError<T>
where
    T: Debug,
{
    #[snafu(display("queue is closed"))]
    Closed {
        item: T,
        #[snafu(implicit)]
        loc:  snafu::Location,
    },
}

impl<T: Debug> PushError<T> {
    /// Take back the value that could not be pushed.
    pub fn into_inner(self) -> T {
        match self {
            Self::Closed { item, .. } => item,
        }
    }
}

pub type PushResult<T> = std::result::Result<(), PushError<T>>;
