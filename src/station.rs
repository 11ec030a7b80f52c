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

//! One station cycle: capture, archive, weather, radar panel, upload.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{error, info, warn};
use radar_panel::{Generated, PanelConfig, PanelPaths};
use serde_json::Value;

use crate::capture::{archive_capture, capture};
use crate::classify::{classify, copy_to_classified};
use crate::config::{StationConfig, StationLayout, StormConfig};
use crate::error::{Result, StationError};
use crate::mail::SmtpNotifier;
use crate::storm::{extract_wind, CommandNotifier, Notifier, StormWarning};
use crate::upload::upload;
use crate::weather::{OpenWeatherMapClient, WeatherRecord};

/// Anything that can produce a current-weather document
pub trait WeatherSource {
    fn current(&self) -> Value;
}

impl WeatherSource for OpenWeatherMapClient {
    fn current(&self) -> Value {
        OpenWeatherMapClient::current(self)
    }
}

/// Renders the radar panel into the background image
pub type RenderPanel<'a> = &'a dyn Fn(&PanelConfig, &PanelPaths) -> radar_panel::Result<Generated>;

/// Mail when configured, else the notify command, else nothing
pub fn storm_notifier(config: &StormConfig) -> Option<Box<dyn Notifier>> {
    if let Some(mail) = &config.mail {
        return Some(Box::new(SmtpNotifier::new(mail.clone())));
    }
    config
        .notify_command
        .clone()
        .map(|command| Box::new(CommandNotifier::new(command)) as Box<dyn Notifier>)
}

/// How a cycle ended
#[derive(Debug)]
pub enum CycleOutcome {
    /// The capture script had nothing to capture
    Skipped,
    Completed {
        archived: PathBuf,
        record: PathBuf,
        radar: Option<Generated>,
        uploaded: bool,
    },
}

/// Timestamp used for the weather record of a capture without a usable name
pub fn timestamp_now() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

#[derive(Debug)]
pub struct Station<'a> {
    config: &'a StationConfig,
    layout: StationLayout,
}

impl<'a> Station<'a> {
    pub fn new(config: &'a StationConfig, layout: StationLayout) -> Self {
        Self { config, layout }
    }

    pub fn layout(&self) -> &StationLayout {
        &self.layout
    }

    /// Production weather client
    pub fn weather_client(&self) -> Result<OpenWeatherMapClient> {
        OpenWeatherMapClient::new(
            self.config.openweathermap_api_key.as_deref(),
            &self.config.city,
            &self.config.radar.user_agent_header(),
        )
    }

    /// Fetch and classify current conditions.
    ///
    /// A provider error is kept in the record and leaves it unclassified.
    pub fn observe(&self, source: &dyn WeatherSource, timestamp: &str) -> WeatherRecord {
        let mut record = WeatherRecord::new(timestamp, source.current());
        if record.is_error() {
            warn!("Weather unavailable: {}", record.openweathermap["error"]);
            return record;
        }

        let classification = classify(&record.openweathermap);
        info!("Weather classified as {:?}", classification.label);
        record.classification = Some(classification.label);
        record.classification_detail = Some(classification.detail);
        record
    }

    /// Run the storm warning for `record` and attach its report.
    pub fn check_storm(&self, record: &mut WeatherRecord) -> Result<()> {
        let notifier = storm_notifier(&self.config.storm);
        let warning = StormWarning::new(
            &self.config.storm,
            self.layout.storm_state.clone(),
            notifier.as_deref(),
        );

        let reading = extract_wind(
            &record.openweathermap,
            record.classification_detail.as_ref(),
            self.config.storm.location.as_deref(),
        );
        record.stormwarning = Some(warning.tick(&reading)?);
        Ok(())
    }

    /// Persist the record as `<json_dir>/<timestamp>.json`
    pub fn write_record(&self, record: &WeatherRecord) -> Result<PathBuf> {
        fs::create_dir_all(&self.layout.json_dir)?;
        let path = self.layout.json_dir.join(format!("{}.json", record.timestamp));
        fs::write(&path, serde_json::to_string_pretty(record)?)?;
        info!("Wrote weather record {}", path.display());
        Ok(path)
    }

    /// Render the radar panel into the configured background
    pub fn radar(&self) -> Result<Generated> {
        Ok(radar_panel::generate(&self.config.radar, &self.layout.panel_paths())?)
    }

    /// Full cycle with the production weather client and panel renderer.
    pub fn run(&self) -> Result<CycleOutcome> {
        let client = self.weather_client()?;
        self.run_with(&client, &radar_panel::generate)
    }

    /// Full cycle with injected weather source and panel renderer.
    ///
    /// A failed radar panel does not stop the cycle: the plain capture is
    /// uploaded instead.
    pub fn run_with(
        &self,
        weather: &dyn WeatherSource,
        render: RenderPanel<'_>,
    ) -> Result<CycleOutcome> {
        let script = self
            .config
            .capture_script
            .as_deref()
            .ok_or_else(|| StationError::Config("capture_script is not configured".to_string()))?;

        let Some(image) = capture(script)? else {
            info!("No capture this cycle");
            return Ok(CycleOutcome::Skipped);
        };

        let archived = archive_capture(&image, &self.layout.old_dir, &self.layout.background)?;
        let timestamp = record_stem(&archived);

        let mut record = self.observe(weather, &timestamp);
        if !record.is_error() {
            self.check_storm(&mut record)?;
        }
        let record_path = self.write_record(&record)?;

        if let Some(label) = &record.classification {
            copy_to_classified(label, &archived, &record_path, &self.layout.classified_dir)?;
        }

        let radar = match render(&self.config.radar, &self.layout.panel_paths()) {
            Ok(generated) => {
                info!(
                    "Radar panel {}x{} embedded ({})",
                    generated.panel_size.0, generated.panel_size.1, generated.source
                );
                Some(generated)
            }
            Err(e) => {
                error!("Radar panel failed, uploading plain capture: {}", e);
                None
            }
        };

        let uploaded = match &self.config.upload {
            Some(upload_config) => {
                upload(upload_config, &self.layout.background)?;
                true
            }
            None => {
                info!("No upload configured");
                false
            }
        };

        Ok(CycleOutcome::Completed {
            archived,
            record: record_path,
            radar,
            uploaded,
        })
    }
}

/// Records share the capture's file stem so both sort together
fn record_stem(image: &Path) -> String {
    image
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map_or_else(timestamp_now, ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storm::StormLevel;
    use radar_panel::PanelError;
    use serde_json::json;
    use tempfile::TempDir;

    struct Canned(Value);

    impl WeatherSource for Canned {
        fn current(&self) -> Value {
            self.0.clone()
        }
    }

    fn windy() -> Canned {
        Canned(json!({
            "name": "Laufamholz",
            "clouds": {"all": 60},
            "weather": [{"id": 500, "main": "Rain"}],
            "wind": {"speed": 14.0}
        }))
    }

    fn failing_render(_: &PanelConfig, _: &PanelPaths) -> radar_panel::Result<Generated> {
        Err(PanelError::NoDataAvailable)
    }

    fn station_in<'a>(dir: &TempDir, config: &'a StationConfig) -> Station<'a> {
        let layout = StationLayout::new(dir.path().to_path_buf(), &config.background_file);
        Station::new(config, layout)
    }

    #[test]
    fn test_observe_classifies() {
        let dir = TempDir::new().unwrap();
        let config = StationConfig::default();
        let station = station_in(&dir, &config);

        let record = station.observe(&windy(), "20250101_120000");
        assert_eq!(record.classification.as_deref(), Some("broken clouds with rain"));
        assert_eq!(record.timestamp, "20250101_120000");
    }

    #[test]
    fn test_observe_keeps_provider_error() {
        let dir = TempDir::new().unwrap();
        let config = StationConfig::default();
        let station = station_in(&dir, &config);

        let record = station.observe(&Canned(json!({"error": "timeout"})), "t");
        assert!(record.is_error());
        assert_eq!(record.classification, None);
    }

    #[test]
    fn test_storm_and_record_persistence() {
        let dir = TempDir::new().unwrap();
        let config = StationConfig::default();
        let station = station_in(&dir, &config);

        let mut record = station.observe(&windy(), "20250101_120000");
        station.check_storm(&mut record).unwrap();
        let report = record.stormwarning.as_ref().unwrap();
        assert_eq!(report.new_state, StormLevel::Watch);
        assert_eq!(report.location, "Laufamholz");
        assert!(station.layout().storm_state.exists());

        let path = station.write_record(&record).unwrap();
        assert_eq!(path, dir.path().join("json/20250101_120000.json"));
        let stored: WeatherRecord =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored, record);
    }

    #[test]
    fn test_run_requires_capture_script() {
        let dir = TempDir::new().unwrap();
        let config = StationConfig::default();
        let station = station_in(&dir, &config);

        assert!(matches!(
            station.run_with(&windy(), &failing_render),
            Err(StationError::Config(_))
        ));
    }

    #[cfg(unix)]
    fn script(dir: &TempDir, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("capture.sh");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_run_skips_at_night() {
        let dir = TempDir::new().unwrap();
        let config = StationConfig {
            capture_script: Some(script(&dir, "exit 3")),
            ..Default::default()
        };
        let station = station_in(&dir, &config);

        let outcome = station.run_with(&windy(), &failing_render).unwrap();
        assert!(matches!(outcome, CycleOutcome::Skipped));
        assert!(!station.layout().json_dir.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_survives_radar_failure() {
        let dir = TempDir::new().unwrap();
        let capture_dir = dir.path().join("incoming");
        fs::create_dir_all(&capture_dir).unwrap();
        let image = capture_dir.join("20250101_120000.jpg");
        fs::write(&image, b"jpeg").unwrap();

        let config = StationConfig {
            capture_script: Some(script(&dir, &format!("echo '{}'", image.display()))),
            ..Default::default()
        };
        let station = station_in(&dir, &config);

        let outcome = station.run_with(&windy(), &failing_render).unwrap();
        let CycleOutcome::Completed {
            archived,
            record,
            radar,
            uploaded,
        } = outcome
        else {
            panic!("cycle was skipped");
        };

        assert_eq!(archived, station.layout().old_dir.join("20250101_120000.jpg"));
        assert_eq!(record, station.layout().json_dir.join("20250101_120000.json"));
        assert!(radar.is_none());
        assert!(!uploaded);
        assert_eq!(fs::read(&station.layout().background).unwrap(), b"jpeg");
        assert!(station
            .layout()
            .classified_dir
            .join("broken_clouds_with_rain/20250101_120000.json")
            .exists());
    }

    #[test]
    fn test_storm_notifier_selection() {
        let mut storm = StormConfig::default();
        assert!(storm_notifier(&storm).is_none());

        storm.notify_command = Some(PathBuf::from("/usr/local/bin/notify"));
        let notifier = storm_notifier(&storm).unwrap();
        assert!(format!("{notifier:?}").starts_with("CommandNotifier"));

        storm.mail = Some(crate::config::MailConfig {
            smtp_server: "smtp.example.org".to_string(),
            smtp_port: 587,
            smtp_user: "station".to_string(),
            smtp_pass: "secret".to_string(),
            from: "station@example.org".to_string(),
            to: "ops@example.org".to_string(),
        });
        let notifier = storm_notifier(&storm).unwrap();
        assert!(format!("{notifier:?}").starts_with("SmtpNotifier"));
    }

    #[test]
    fn test_record_stem() {
        assert_eq!(record_stem(Path::new("/x/20250101_120000.jpg")), "20250101_120000");
        assert_eq!(record_stem(Path::new("/")).len(), "20250101_120000".len());
    }
}
