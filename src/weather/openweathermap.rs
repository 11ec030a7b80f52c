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

//! OpenWeatherMap current weather client.

use std::time::Duration;

use log::{debug, warn};
use serde_json::{json, Value};

use crate::error::{Result, StationError};

pub const CURRENT_WEATHER_URL: &str = "http://api.openweathermap.org/data/2.5/weather";

/// Environment variable checked before the configured key
pub const API_KEY_ENV: &str = "OPENWEATHERMAP_API_KEY";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolve API key from environment variable or config
pub fn resolve_api_key(config_key: Option<&str>) -> Option<String> {
    pick_api_key(std::env::var(API_KEY_ENV).ok().as_deref(), config_key)
}

fn pick_api_key(env_key: Option<&str>, config_key: Option<&str>) -> Option<String> {
    // Check environment variable first
    if let Some(key) = env_key.filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }

    // Fall back to config
    config_key.map(ToString::to_string).filter(|s| !s.is_empty())
}

fn error_value(message: String) -> Value {
    json!({ "error": message })
}

/// Turn an HTTP status and body into the stored weather document.
pub fn interpret_response(status: u16, body: &str) -> Value {
    if status != 200 {
        return error_value(format!("API request failed: {body}"));
    }
    serde_json::from_str(body)
        .unwrap_or_else(|e| error_value(format!("API returned invalid JSON: {e}")))
}

/// Blocking client for the current weather endpoint
pub struct OpenWeatherMapClient {
    client: reqwest::blocking::Client,
    api_key: String,
    city: String,
}

impl std::fmt::Debug for OpenWeatherMapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWeatherMapClient")
            .field("city", &self.city)
            .finish_non_exhaustive()
    }
}

impl OpenWeatherMapClient {
    /// Create a client; fails when no API key is available
    pub fn new(config_key: Option<&str>, city: &str, user_agent: &str) -> Result<Self> {
        let api_key = resolve_api_key(config_key).ok_or_else(|| {
            StationError::Config(format!(
                "OpenWeatherMap API key missing (set {API_KEY_ENV} or openweathermap_api_key)"
            ))
        })?;

        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            api_key,
            city: city.to_string(),
        })
    }

    /// Fetch current conditions.
    ///
    /// Never fails: transport problems and non-200 answers come back as an
    /// `{"error": ...}` document so the station cycle can carry on.
    pub fn current(&self) -> Value {
        debug!("Requesting current weather for {}", self.city);
        let response = self
            .client
            .get(CURRENT_WEATHER_URL)
            .query(&[
                ("q", self.city.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send();

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!("OpenWeatherMap request timed out");
                return error_value(
                    "OpenWeatherMap API not available at this timepoint (timeout)".to_string(),
                );
            }
            Err(e) => {
                let e = e.without_url();
                warn!("OpenWeatherMap request failed: {}", e);
                return error_value(format!(
                    "OpenWeatherMap API not available at this timepoint ({e})"
                ));
            }
        };

        let status = response.status().as_u16();
        match response.text() {
            Ok(body) => {
                if status != 200 {
                    warn!("OpenWeatherMap answered HTTP {}", status);
                }
                interpret_response(status, &body)
            }
            Err(e) => error_value(format!(
                "OpenWeatherMap API not available at this timepoint ({})",
                e.without_url()
            )),
        }
    }
}
