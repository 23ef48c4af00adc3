// This file is part of the terraform-provider-appservice project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Wait for a remote object to reach a target state

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::error::ArmError;

const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Polling configuration
///
/// `refresh` functions return `None` when the remote object does not exist (yet),
/// or the object together with its current state.
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    /// States that keep the polling going
    pub pending: Vec<String>,
    /// States that end the polling successfully
    pub target: Vec<String>,
    /// Wait before the first refresh
    pub delay: Duration,
    /// Fixed interval between refreshes.
    /// When zero, the interval starts at `min_timeout` and doubles up to 10s.
    pub poll_interval: Duration,
    pub min_timeout: Duration,
    /// Overall deadline
    pub timeout: Duration,
    /// Number of consecutive `None` tolerated
    pub not_found_checks: usize,
    /// Number of consecutive target states required
    pub continuous_target_occurence: usize,
}

impl Default for StateChangeConf {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            target: Vec::new(),
            delay: Duration::ZERO,
            poll_interval: Duration::ZERO,
            min_timeout: Duration::from_millis(100),
            timeout: Duration::from_secs(30 * 60),
            not_found_checks: 20,
            continuous_target_occurence: 1,
        }
    }
}

fn contains(states: &[String], state: &str) -> bool {
    states.iter().any(|s| s.eq_ignore_ascii_case(state))
}

impl StateChangeConf {
    pub fn new<P, T>(pending: P, target: T, timeout: Duration) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            timeout,
            ..Default::default()
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Refresh until the target state is reached
    pub async fn wait_for_state<T, F, Fut>(&self, mut refresh: F) -> Result<T, ArmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<(T, String)>, ArmError>>,
    {
        let deadline = Instant::now() + self.timeout;
        let timeout_error = |last_state: &str| ArmError::Timeout {
            target: self.target.clone(),
            last_state: last_state.to_owned(),
            timeout: self.timeout,
        };

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let mut last_state = String::new();
        let mut not_found = 0;
        let mut target_occurence = 0;
        let mut backoff = self.min_timeout.max(Duration::from_millis(1));

        loop {
            let result = match tokio::time::timeout_at(deadline, refresh()).await {
                Ok(result) => result?,
                Err(_) => return Err(timeout_error(&last_state)),
            };

            match result {
                None => {
                    target_occurence = 0;
                    not_found += 1;
                    if not_found > self.not_found_checks {
                        return Err(ArmError::NotFoundChecks { checks: not_found });
                    }
                }
                Some((value, state)) => {
                    not_found = 0;
                    if contains(&self.target, &state) {
                        target_occurence += 1;
                        if target_occurence >= self.continuous_target_occurence.max(1) {
                            return Ok(value);
                        }
                    } else if contains(&self.pending, &state) {
                        target_occurence = 0;
                    } else {
                        return Err(ArmError::UnexpectedState {
                            state,
                            target: self.target.clone(),
                        });
                    }
                    tracing::trace!(state, "waiting for state change");
                    last_state = state;
                }
            }

            let wait = if self.poll_interval.is_zero() {
                let wait = backoff;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                wait
            } else {
                self.poll_interval
            };

            if Instant::now() + wait > deadline {
                return Err(timeout_error(&last_state));
            }
            sleep(wait).await;
        }
    }
}
