// Copyright (C) 2020-2026  The Blockhouse Technology Limited (TBTL).
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public
// License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Retrying of transient failures with exponential backoff.

use std::{future::Future, time::Duration};

use serde::Deserialize;

/// Policy for retrying an operation which failed transiently.
///
/// The first retry waits `base_delay_ms`, and the delay doubles with every
/// further retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// How many times the operation is retried after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// A policy which never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
        }
    }

    /// Delay before the given retry, counting from 1.
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u64
            .checked_shl(retry.saturating_sub(1))
            .unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    /// Runs `operation`, retrying it while it fails with an error for which
    /// `is_retryable` holds and retries are left.
    ///
    /// The last result is returned as is.
    pub async fn run<T, E, F, Fut>(
        &self,
        mut operation: F,
        is_retryable: impl Fn(&E) -> bool,
    ) -> bherror::Result<T, E>
    where
        E: bherror::BhError,
        F: FnMut() -> Fut,
        Fut: Future<Output = bherror::Result<T, E>>,
    {
        let mut retry = 0;
        loop {
            match operation().await {
                Err(error) if retry < self.max_retries && is_retryable(&error.error) => {
                    retry += 1;
                    let delay = self.delay(retry);
                    tracing::warn!(
                        retry,
                        max_retries = self.max_retries,
                        ?delay,
                        "retrying after transient failure: {}",
                        error.error
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                result => return result,
            }
        }
    }
}
