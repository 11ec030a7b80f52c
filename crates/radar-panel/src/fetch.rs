// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
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

//! Blocking HTTP retrieval with bounded retries.
//!
//! [`Fetch`] performs a single GET; [`fetch_with_retry`] wraps any
//! implementation with exponential backoff. [`HttpFetcher`] is the
//! reqwest-backed transport used in production.

use std::fmt;
use std::time::Duration;

use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONNECTION, USER_AGENT};
use thiserror::Error;

/// Accept header sent with every request (tiles first, JSON metadata second)
const ACCEPT_VALUE: &str = "image/png,image/*;q=0.8,application/json;q=0.7,*/*;q=0.5";

/// Which phase of a request ran out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    Connect,
    Read,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutPhase::Connect => write!(f, "connect"),
            TimeoutPhase::Read => write!(f, "read"),
        }
    }
}

/// Failure of a single HTTP request.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("{phase} timeout fetching {url}")]
    Timeout { url: String, phase: TimeoutPhase },

    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("transport error fetching {url}: {message}")]
    Transport { url: String, message: String },
}

impl FetchError {
    /// Short category label used in retry logs
    pub fn category(&self) -> &'static str {
        match self {
            FetchError::Timeout {
                phase: TimeoutPhase::Connect,
                ..
            } => "connect-timeout",
            FetchError::Timeout {
                phase: TimeoutPhase::Read,
                ..
            } => "read-timeout",
            FetchError::Status { .. } => "http-status",
            FetchError::Transport { .. } => "transport",
        }
    }

    fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            let phase = if err.is_connect() {
                TimeoutPhase::Connect
            } else {
                TimeoutPhase::Read
            };
            FetchError::Timeout {
                url: url.to_string(),
                phase,
            }
        } else if let Some(status) = err.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// A transport capable of a single blocking GET.
pub trait Fetch {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Attempt budget and backoff base for [`fetch_with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each later one
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Policy with no sleeping between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay after the failed attempt `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// GET `url`, retrying on any failure until the policy is exhausted.
///
/// There is no sleep after the final attempt; the last error is returned.
pub fn fetch_with_retry<F: Fetch + ?Sized>(
    fetcher: &F,
    url: &str,
    policy: RetryPolicy,
) -> Result<Vec<u8>, FetchError> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match fetcher.get(url) {
            Ok(bytes) => {
                debug!("Fetched {} ({} bytes)", url, bytes.len());
                return Ok(bytes);
            }
            Err(e) => {
                if attempt + 1 >= attempts {
                    warn!(
                        "Giving up on {} after {} attempt(s) [{}]: {}",
                        url,
                        attempts,
                        e.category(),
                        e
                    );
                    return Err(e);
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    "Attempt {}/{} for {} failed [{}]: {} - retrying in {:?}",
                    attempt + 1,
                    attempts,
                    url,
                    e.category(),
                    e,
                    delay
                );
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                attempt += 1;
            }
        }
    }
}

/// Build the outbound identification string.
pub fn user_agent_string(user_agent: &str, contact_email: &str) -> String {
    format!("{user_agent} (contact: {contact_email})")
}

/// reqwest-backed blocking transport.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(
        user_agent: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        let ua = HeaderValue::from_str(user_agent).map_err(|e| FetchError::Transport {
            url: String::new(),
            message: format!("invalid user agent: {e}"),
        })?;
        headers.insert(USER_AGENT, ua);

        let client = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                message: e.to_string(),
            })?;

        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .map_err(|e| FetchError::from_reqwest(url, &e))?;
        Ok(bytes.to_vec())
    }
}
