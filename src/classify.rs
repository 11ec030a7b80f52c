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

//! Rule-based weather classification of OpenWeatherMap current conditions.
//!
//! The label combines cloud coverage, an optional phenomenon and a storm
//! flag, e.g. `"broken clouds with rain (storm)"`. Captures are filed into
//! one directory per label.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Wind speed (m/s) from which a reading counts as storm
pub const STORM_WIND_MS: f64 = 17.0;

/// Directory name for captures without a usable label
pub const UNCLASSIFIED: &str = "unclassified";

/// Inputs and intermediate results behind a classification label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationDetail {
    pub coverage: String,
    pub phenomenon: Option<String>,
    pub storm: bool,
    pub wind_speed_ms: Option<f64>,
    pub clouds_percent: Option<i64>,
    pub weather_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    pub detail: ClassificationDetail,
}

/// Numbers may arrive as JSON numbers or numeric strings
fn as_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coverage(clouds: Option<i64>, main: &str) -> &'static str {
    match clouds {
        Some(c) if c <= 10 => "clear",
        Some(c) if c <= 25 => "few clouds",
        Some(c) if c <= 50 => "scattered clouds",
        Some(c) if c <= 84 => "broken clouds",
        Some(_) => "overcast clouds",
        None if main == "Clouds" => "overcast clouds",
        None => "clear",
    }
}

fn phenomenon(id: Option<i64>, main: &str) -> Option<String> {
    match id {
        Some(200..=232) => Some("thunderstorm".to_string()),
        Some(300..=321) => Some("drizzle".to_string()),
        Some(500..=531) => Some("rain".to_string()),
        Some(600..=622) => Some("snow".to_string()),
        Some(700..=781) if main.is_empty() => Some("atmosphere".to_string()),
        Some(700..=781) => Some(main.to_lowercase()),
        Some(_) => None,
        None if !main.is_empty() && main != "Clouds" && main != "Clear" => {
            Some(main.to_lowercase())
        }
        None => None,
    }
}

/// Classify an OpenWeatherMap current-weather document.
///
/// Missing or malformed fields are treated as absent rather than errors.
pub fn classify(weather: &Value) -> Classification {
    let clouds = as_i64(weather.pointer("/clouds/all"));
    let first = weather.pointer("/weather/0");
    let weather_id = as_i64(first.and_then(|w| w.get("id")));
    let main = first
        .and_then(|w| w.get("main"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim();
    let wind_speed_ms = as_f64(weather.pointer("/wind/speed"));

    let coverage = coverage(clouds, main).to_string();
    let phenomenon = phenomenon(weather_id, main);
    let storm = wind_speed_ms.is_some_and(|s| s >= STORM_WIND_MS);

    let mut label = coverage.clone();
    if let Some(p) = &phenomenon {
        label.push_str(" with ");
        label.push_str(p);
    }
    if storm {
        label.push_str(" (storm)");
    }

    Classification {
        label,
        detail: ClassificationDetail {
            coverage,
            phenomenon,
            storm,
            wind_speed_ms,
            clouds_percent: clouds,
            weather_id,
        },
    }
}

/// Directory-safe form of a label: `"few clouds with rain"` → `few_clouds_with_rain`
pub fn safe_label(label: &str) -> String {
    let kept: String = label
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    let safe = kept.trim().replace(' ', "_").to_lowercase();
    if safe.is_empty() {
        UNCLASSIFIED.to_string()
    } else {
        safe
    }
}

/// Copy the archived image and its weather record into `<base>/<safe_label>/`.
pub fn copy_to_classified(
    label: &str,
    image: &Path,
    record: &Path,
    base: &Path,
) -> Result<PathBuf> {
    let target = base.join(safe_label(label));
    fs::create_dir_all(&target)?;

    for source in [image, record] {
        if let Some(name) = source.file_name() {
            fs::copy(source, target.join(name))?;
        }
    }

    info!("Filed capture under {}", target.display());
    Ok(target)
}
