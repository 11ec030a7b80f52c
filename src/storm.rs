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

//! Wind-based storm warning with persisted state.
//!
//! Each tick compares the strongest of wind speed and gust against the WATCH
//! and STORM thresholds. A notification goes out only when the level differs
//! from the one persisted by the previous tick.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classify::ClassificationDetail;
use crate::config::StormConfig;
use crate::error::{Result, StationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StormLevel {
    #[default]
    Ok,
    Watch,
    Storm,
}

impl fmt::Display for StormLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StormLevel::Ok => "OK",
            StormLevel::Watch => "WATCH",
            StormLevel::Storm => "STORM",
        };
        f.write_str(s)
    }
}

/// Persisted between ticks
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StormState {
    pub state: StormLevel,
    /// Seconds since the Unix epoch
    pub last_update: f64,
}

/// Load the persisted state; anything unreadable counts as OK
pub fn load_state(path: &Path) -> StormState {
    let Ok(text) = fs::read_to_string(path) else {
        return StormState::default();
    };
    serde_json::from_str(&text).unwrap_or_else(|e| {
        warn!("Ignoring unreadable storm state {}: {}", path.display(), e);
        StormState::default()
    })
}

pub fn save_state(path: &Path, state: &StormState) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string(state)?)?;
    Ok(())
}

/// Wind measurement in m/s
#[derive(Debug, Clone, PartialEq)]
pub struct WindReading {
    pub speed: f64,
    pub gust: Option<f64>,
    pub location: String,
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Pull wind data out of a provider document.
///
/// Speed falls back to the classified speed, then to zero. The location is
/// the document's `name`, then `fallback_location`, then `N/A`.
pub fn extract_wind(
    weather: &Value,
    detail: Option<&ClassificationDetail>,
    fallback_location: Option<&str>,
) -> WindReading {
    let speed = number(weather.pointer("/wind/speed"))
        .or_else(|| detail.and_then(|d| d.wind_speed_ms))
        .unwrap_or(0.0);
    let gust = number(weather.pointer("/wind/gust"));
    let location = weather
        .get("name")
        .and_then(Value::as_str)
        .or(fallback_location)
        .unwrap_or("N/A")
        .to_string();

    WindReading {
        speed,
        gust,
        location,
    }
}

/// Message sent on a level change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

/// Delivery channel for storm notifications.
pub trait Notifier: fmt::Debug {
    fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Runs `<command> <subject> <body>`
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    command: PathBuf,
}

impl CommandNotifier {
    pub fn new(command: PathBuf) -> Self {
        Self { command }
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        let output = Command::new(&self.command)
            .arg(&notification.subject)
            .arg(&notification.body)
            .output()?;
        if !output.status.success() {
            return Err(StationError::Script {
                script: self.command.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Outcome of one tick, stored in the weather record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StormReport {
    pub prev_state: StormLevel,
    pub new_state: StormLevel,
    pub notified: bool,
    pub wind_speed: f64,
    pub wind_gust: Option<f64>,
    pub location: String,
    pub state_file: PathBuf,
}

/// Threshold evaluation plus state bookkeeping
pub struct StormWarning<'a> {
    config: &'a StormConfig,
    state_file: PathBuf,
    notifier: Option<&'a dyn Notifier>,
}

impl fmt::Debug for StormWarning<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StormWarning")
            .field("config", &self.config)
            .field("state_file", &self.state_file)
            .field("has_notifier", &self.notifier.is_some())
            .finish()
    }
}

impl<'a> StormWarning<'a> {
    pub fn new(
        config: &'a StormConfig,
        state_file: PathBuf,
        notifier: Option<&'a dyn Notifier>,
    ) -> Self {
        Self {
            config,
            state_file,
            notifier,
        }
    }

    pub fn level(&self, speed: f64, gust: Option<f64>) -> StormLevel {
        let strongest = gust.map_or(speed, |g| speed.max(g));
        if strongest >= self.config.storm_wind {
            StormLevel::Storm
        } else if strongest >= self.config.watch_wind {
            StormLevel::Watch
        } else {
            StormLevel::Ok
        }
    }

    fn notification(
        &self,
        prev: StormLevel,
        new: StormLevel,
        reading: &WindReading,
    ) -> Notification {
        let units = &self.config.units;
        let gust = reading
            .gust
            .map(|g| format!(", gust: {g:.1} {units}"))
            .unwrap_or_default();
        Notification {
            subject: format!("[Storm warning] {}: {}", reading.location, new),
            body: format!(
                "Location: {}\nState: {} -> {}\nCurrent wind: {:.1} {}{}\n\
                 Thresholds: WATCH >= {:.1} {}, STORM >= {:.1} {}\n",
                reading.location,
                prev,
                new,
                reading.speed,
                units,
                gust,
                self.config.watch_wind,
                units,
                self.config.storm_wind,
                units
            ),
        }
    }

    /// Evaluate `reading`, notify on a level change and persist the new level.
    ///
    /// Notification delivery is best-effort; failing to persist the state is
    /// an error.
    pub fn tick(&self, reading: &WindReading) -> Result<StormReport> {
        let previous = load_state(&self.state_file);
        let prev = previous.state;
        let new = self.level(reading.speed, reading.gust);

        let mut notified = false;
        if new != prev {
            let notification = self.notification(prev, new, reading);
            match self.notifier {
                Some(notifier) => match notifier.notify(&notification) {
                    Ok(()) => notified = true,
                    Err(e) => warn!("Storm notification failed: {}", e),
                },
                None => info!("{} (no notifier configured)", notification.subject),
            }
        }

        let state = StormState {
            state: new,
            last_update: Utc::now().timestamp_millis() as f64 / 1000.0,
        };
        save_state(&self.state_file, &state)?;

        info!(
            "Storm warning {}: {} -> {} (notified: {})",
            reading.location, prev, new, notified
        );

        Ok(StormReport {
            prev_state: prev,
            new_state: new,
            notified,
            wind_speed: reading.speed,
            wind_gust: reading.gust,
            location: reading.location.clone(),
            state_file: self.state_file.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Debug, Default)]
    struct Recorder {
        sent: RefCell<Vec<Notification>>,
        fail: bool,
    }

    impl Notifier for Recorder {
        fn notify(&self, notification: &Notification) -> Result<()> {
            if self.fail {
                return Err(StationError::Config("mail server down".to_string()));
            }
            self.sent.borrow_mut().push(notification.clone());
            Ok(())
        }
    }

    fn reading(speed: f64, gust: Option<f64>) -> WindReading {
        WindReading {
            speed,
            gust,
            location: "Laufamholz".to_string(),
        }
    }

    #[test]
    fn test_level_thresholds() {
        let config = StormConfig::default();
        let warning = StormWarning::new(&config, PathBuf::from("unused"), None);
        assert_eq!(warning.level(5.0, None), StormLevel::Ok);
        assert_eq!(warning.level(13.0, None), StormLevel::Watch);
        assert_eq!(warning.level(5.0, Some(14.0)), StormLevel::Watch);
        assert_eq!(warning.level(17.0, None), StormLevel::Storm);
        assert_eq!(warning.level(12.9, Some(3.0)), StormLevel::Ok);
    }

    #[test]
    fn test_notifies_only_on_change() {
        let dir = TempDir::new().unwrap();
        let state_file = dir.path().join("stormwarning/storm_state.json");
        let config = StormConfig::default();
        let recorder = Recorder::default();
        let warning = StormWarning::new(&config, state_file.clone(), Some(&recorder));

        let report = warning.tick(&reading(3.0, None)).unwrap();
        assert_eq!((report.prev_state, report.new_state), (StormLevel::Ok, StormLevel::Ok));
        assert!(!report.notified);

        let report = warning.tick(&reading(15.0, Some(18.0))).unwrap();
        assert_eq!(report.new_state, StormLevel::Storm);
        assert!(report.notified);

        let report = warning.tick(&reading(17.5, None)).unwrap();
        assert_eq!(report.prev_state, StormLevel::Storm);
        assert!(!report.notified);

        let sent = recorder.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "[Storm warning] Laufamholz: STORM");
        assert!(sent[0].body.contains("OK -> STORM"));
        assert!(sent[0].body.contains("gust: 18.0 m/s"));

        assert_eq!(load_state(&state_file).state, StormLevel::Storm);
    }

    #[test]
    fn test_failed_notification_still_persists() {
        let dir = TempDir::new().unwrap();
        let state_file = dir.path().join("storm_state.json");
        let config = StormConfig::default();
        let recorder = Recorder {
            fail: true,
            ..Default::default()
        };
        let warning = StormWarning::new(&config, state_file.clone(), Some(&recorder));

        let report = warning.tick(&reading(14.0, None)).unwrap();
        assert_eq!(report.new_state, StormLevel::Watch);
        assert!(!report.notified);
        assert_eq!(load_state(&state_file).state, StormLevel::Watch);
    }

    #[test]
    fn test_corrupt_state_counts_as_ok() {
        let dir = TempDir::new().unwrap();
        let state_file = dir.path().join("storm_state.json");
        fs::write(&state_file, "not json").unwrap();
        assert_eq!(load_state(&state_file), StormState::default());
        assert_eq!(load_state(&dir.path().join("missing.json")).state, StormLevel::Ok);
    }

    #[test]
    fn test_state_file_format() {
        let state = StormState {
            state: StormLevel::Watch,
            last_update: 1_700_000_000.5,
        };
        let text = serde_json::to_string(&state).unwrap();
        assert_eq!(text, r#"{"state":"WATCH","last_update":1700000000.5}"#);
    }

    #[test]
    fn test_extract_wind() {
        let weather = json!({"wind": {"speed": 4.2, "gust": "9.5"}, "name": "Nürnberg"});
        let r = extract_wind(&weather, None, None);
        assert_eq!(
            r,
            WindReading {
                speed: 4.2,
                gust: Some(9.5),
                location: "Nürnberg".to_string()
            }
        );

        let detail = ClassificationDetail {
            coverage: "clear".to_string(),
            phenomenon: None,
            storm: false,
            wind_speed_ms: Some(6.0),
            clouds_percent: None,
            weather_id: None,
        };
        let r = extract_wind(&json!({"error": "timeout"}), Some(&detail), Some("Garden"));
        assert!((r.speed - 6.0).abs() < f64::EPSILON);
        assert_eq!(r.gust, None);
        assert_eq!(r.location, "Garden");

        let r = extract_wind(&json!({}), None, None);
        assert!(r.speed.abs() < f64::EPSILON);
        assert_eq!(r.location, "N/A");
    }
}
