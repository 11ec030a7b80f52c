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

//! Station configuration management.
//!
//! The configuration lives either in an explicit JSON file passed on the
//! command line or in the per-user TOML file managed by confy. Radar panel
//! settings are nested under `radar`; everything else drives the station
//! cycle around it.

use std::path::{Path, PathBuf};

use log::info;
use radar_panel::{PanelConfig, PanelPaths};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StationError};

/// Application name used for confy and the default data directory
pub const APP_NAME: &str = "rainradar-station";

/// Credentials and target for the upload script
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Script run as `<script> <remote_path> <remote_file> <local_path>`
    pub script: PathBuf,
    pub remote_user: String,
    pub remote_host: String,
    pub password: String,
    pub remote_path: String,
    pub remote_file: String,
}

impl std::fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadConfig")
            .field("script", &self.script)
            .field("remote_user", &self.remote_user)
            .field("remote_host", &self.remote_host)
            .field("remote_path", &self.remote_path)
            .field("remote_file", &self.remote_file)
            .finish_non_exhaustive()
    }
}

/// SMTP account used for storm notifications
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub smtp_server: String,

    /// Submission port; the connection is upgraded with STARTTLS
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    pub smtp_user: String,
    pub smtp_pass: String,
    pub from: String,
    pub to: String,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("smtp_server", &self.smtp_server)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_user", &self.smtp_user)
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

/// Wind thresholds and notification settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StormConfig {
    /// WATCH threshold in m/s
    #[serde(default = "default_watch_wind")]
    pub watch_wind: f64,

    /// STORM threshold in m/s
    #[serde(default = "default_storm_wind")]
    pub storm_wind: f64,

    #[serde(default = "default_units")]
    pub units: String,

    /// Location name used when the weather data carries none
    #[serde(default)]
    pub location: Option<String>,

    /// Mail sent on state changes
    #[serde(default)]
    pub mail: Option<MailConfig>,

    /// Command run as `<command> <subject> <body>` when no mail is configured
    #[serde(default)]
    pub notify_command: Option<PathBuf>,
}

/// Station configuration stored as JSON
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StationConfig {
    /// Root for jpg/, json/ and cache/; defaults to the user data directory
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    /// OpenWeatherMap query, e.g. `Laufamholz,de`
    #[serde(default = "default_city")]
    pub city: String,

    /// OpenWeatherMap API key (optional, env var takes precedence)
    #[serde(default)]
    pub openweathermap_api_key: Option<String>,

    /// Capture script; prints the captured image path on stdout
    #[serde(default)]
    pub capture_script: Option<PathBuf>,

    /// File name of the fixed background image under `jpg/current/`
    #[serde(default = "default_background_file")]
    pub background_file: String,

    #[serde(default)]
    pub upload: Option<UploadConfig>,

    #[serde(default)]
    pub storm: StormConfig,

    #[serde(default)]
    pub radar: PanelConfig,
}

// Default value functions for serde
fn default_watch_wind() -> f64 {
    13.0
}

fn default_storm_wind() -> f64 {
    17.0
}

fn default_units() -> String {
    "m/s".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_city() -> String {
    "Laufamholz,de".to_string()
}

fn default_background_file() -> String {
    "IMG_4903.jpg".to_string()
}

impl Default for StormConfig {
    fn default() -> Self {
        Self {
            watch_wind: default_watch_wind(),
            storm_wind: default_storm_wind(),
            units: default_units(),
            location: None,
            mail: None,
            notify_command: None,
        }
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            city: default_city(),
            openweathermap_api_key: None,
            capture_script: None,
            background_file: default_background_file(),
            upload: None,
            storm: StormConfig::default(),
            radar: PanelConfig::default(),
        }
    }
}

impl StationConfig {
    /// Load from `path`, or from the confy location when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_json(&std::fs::read_to_string(path)?)?
            }
            None => confy::load(APP_NAME, "config")?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.radar.validate()?;
        if self.storm.watch_wind > self.storm.storm_wind {
            return Err(StationError::Config(format!(
                "storm.watch_wind ({}) exceeds storm.storm_wind ({})",
                self.storm.watch_wind, self.storm.storm_wind
            )));
        }
        Ok(())
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<PathBuf> {
        Ok(confy::get_configuration_file_path(APP_NAME, "config")?)
    }

    /// Resolve the station directory layout, preferring `override_dir`
    pub fn layout(&self, override_dir: Option<&Path>) -> Result<StationLayout> {
        let base = match (override_dir, &self.base_dir) {
            (Some(dir), _) => dir.to_path_buf(),
            (None, Some(dir)) => dir.clone(),
            (None, None) => dirs::data_local_dir()
                .map(|d| d.join(APP_NAME))
                .ok_or_else(|| StationError::Config("no base directory available".to_string()))?,
        };
        Ok(StationLayout::new(base, &self.background_file))
    }
}

/// Directory layout of one station below its base directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationLayout {
    pub base: PathBuf,
    /// Archived captures
    pub old_dir: PathBuf,
    /// Per-classification copies of image + JSON
    pub classified_dir: PathBuf,
    /// Weather records, one per capture
    pub json_dir: PathBuf,
    /// Storm warning state file
    pub storm_state: PathBuf,
    /// Fixed upload source, overwritten with the radar panel embedded
    pub background: PathBuf,
    pub radar_output: PathBuf,
    pub radar_cache: PathBuf,
    pub basemap_cache: PathBuf,
}

impl StationLayout {
    pub fn new(base: PathBuf, background_file: &str) -> Self {
        Self {
            old_dir: base.join("jpg").join("old"),
            classified_dir: base.join("jpg").join("classified"),
            json_dir: base.join("json"),
            storm_state: base.join("json").join("stormwarning").join("storm_state.json"),
            background: base.join("jpg").join("current").join(background_file),
            radar_output: base.join("jpg").join("radar").join("radar.jpg"),
            radar_cache: base.join("cache").join("radar.png"),
            basemap_cache: base.join("cache").join("basemap.png"),
            base,
        }
    }

    pub fn panel_paths(&self) -> PanelPaths {
        PanelPaths {
            output_image_path: self.radar_output.clone(),
            bg_image_path: self.background.clone(),
            radar_image_cache_path: self.radar_cache.clone(),
            basemap_image_cache_path: self.basemap_cache.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = StationConfig::from_json("{}").unwrap();
        assert_eq!(config, StationConfig::default());
        assert_eq!(config.city, "Laufamholz,de");
        assert!((config.storm.watch_wind - 13.0).abs() < f64::EPSILON);
        assert!((config.storm.storm_wind - 17.0).abs() < f64::EPSILON);
        assert_eq!(config.radar.zoom, 6);
    }

    #[test]
    fn test_nested_radar_section() {
        let config = StationConfig::from_json(
            r#"{
                "city": "Berlin,de",
                "radar": {"tiles": [[1, 2], [2, 2]], "zoom": 5, "opacity": 0.5},
                "upload": {
                    "script": "/opt/upload.sh",
                    "remote_user": "u",
                    "remote_host": "h",
                    "password": "secret",
                    "remote_path": "/www/",
                    "remote_file": "cam.jpg"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.radar.tiles.len(), 2);
        assert_eq!(config.radar.zoom, 5);
        assert_eq!(config.radar.legend_width, 54);
        assert!(config.upload.is_some());
        assert!(!format!("{:?}", config.upload).contains("secret"));
    }

    #[test]
    fn test_storm_mail_section() {
        let config = StationConfig::from_json(
            r#"{
                "storm": {
                    "mail": {
                        "smtp_server": "smtp.example.org",
                        "smtp_user": "station",
                        "smtp_pass": "hunter2",
                        "from": "station@example.org",
                        "to": "ops@example.org"
                    }
                }
            }"#,
        )
        .unwrap();
        let mail = config.storm.mail.unwrap();
        assert_eq!(mail.smtp_port, 587);
        assert_eq!(mail.to, "ops@example.org");
        assert!(!format!("{mail:?}").contains("hunter2"));
    }

    #[test]
    fn test_radar_section_requires_tiles_and_zoom() {
        assert!(StationConfig::from_json(r#"{"radar": {"zoom": 5}}"#).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_panel_config() {
        let mut config = StationConfig::default();
        config.radar.opacity = 2.0;
        assert!(matches!(config.validate(), Err(StationError::Panel(_))));

        let mut config = StationConfig::default();
        config.storm.watch_wind = 20.0;
        assert!(matches!(config.validate(), Err(StationError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.local.json");
        std::fs::write(&path, r#"{"city": "Hamburg,de"}"#).unwrap();

        let config = StationConfig::load(Some(&path)).unwrap();
        assert_eq!(config.city, "Hamburg,de");

        assert!(StationConfig::load(Some(&dir.path().join("missing.json"))).is_err());
    }

    #[test]
    fn test_layout() {
        let config = StationConfig {
            base_dir: Some(PathBuf::from("/srv/station")),
            ..Default::default()
        };
        let layout = config.layout(None).unwrap();
        assert_eq!(layout.old_dir, Path::new("/srv/station/jpg/old"));
        assert_eq!(layout.background, Path::new("/srv/station/jpg/current/IMG_4903.jpg"));
        assert_eq!(
            layout.storm_state,
            Path::new("/srv/station/json/stormwarning/storm_state.json")
        );

        let layout = config.layout(Some(Path::new("/tmp/other"))).unwrap();
        assert_eq!(layout.base, Path::new("/tmp/other"));
        assert_eq!(layout.panel_paths().bg_image_path, layout.background);
    }
}
