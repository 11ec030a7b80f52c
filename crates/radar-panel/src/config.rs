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

//! Panel generation parameters.
//!
//! `tiles` and `zoom` are required when deserializing; every other field
//! falls back to the production defaults below.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PanelError, Result};
use crate::fetch::{user_agent_string, RetryPolicy};
use crate::grid::{TileCoord, TileGrid};
use crate::radar::RadarStyle;

/// Nuremberg area at zoom 6 (2x2 tiles)
pub const DEFAULT_TILES: [(u32, u32); 4] = [(33, 21), (34, 21), (33, 22), (34, 22)];

/// Full set of parameters for one `generate` call
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PanelConfig {
    /// Tile coordinates, laid out row-major
    pub tiles: Vec<TileCoord>,

    /// Slippy-map zoom level shared by all tiles
    pub zoom: u8,

    /// Append the colour scale to the right edge
    #[serde(default = "default_true")]
    pub legend: bool,

    #[serde(default = "default_legend_width")]
    pub legend_width: u32,

    #[serde(default = "default_legend_padding")]
    pub legend_padding: u32,

    /// Size of the panel once embedded in the background photo
    #[serde(default = "default_overlay_size")]
    pub overlay_size: (u32, u32),

    #[serde(default = "default_margin")]
    pub margin_right: u32,

    #[serde(default = "default_margin")]
    pub margin_bottom: u32,

    /// Pixels removed from the bottom of the map before decorating
    #[serde(default)]
    pub crop_bottom: i32,

    /// Radar layer opacity (0.0 - 1.0)
    #[serde(default = "default_opacity")]
    pub opacity: f32,

    #[serde(default = "default_true")]
    pub border: bool,

    #[serde(default = "default_border_width")]
    pub border_width: u32,

    /// `#RRGGBB` or `#RGB`
    #[serde(default = "default_border_color")]
    pub border_color: String,

    #[serde(default = "default_header_title")]
    pub header_title: String,

    /// strftime-style format for the radar timestamp
    #[serde(default = "default_timestamp_fmt")]
    pub timestamp_fmt: String,

    /// Footer text; empty disables the footer
    #[serde(default = "default_attribution_text")]
    pub attribution_text: String,

    #[serde(default = "default_palette")]
    pub palette: i32,

    #[serde(default = "default_one")]
    pub smooth: i32,

    #[serde(default = "default_one")]
    pub snow: i32,

    /// Read timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: f64,

    /// Extra attempts per tile after the first
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_jpg_quality")]
    pub jpg_quality: u8,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_contact_email")]
    pub contact_email: String,
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_legend_width() -> u32 {
    54
}

fn default_legend_padding() -> u32 {
    8
}

fn default_overlay_size() -> (u32, u32) {
    (400, 400)
}

fn default_margin() -> u32 {
    20
}

fn default_opacity() -> f32 {
    0.85
}

fn default_border_width() -> u32 {
    4
}

fn default_border_color() -> String {
    "#808080".to_string()
}

fn default_header_title() -> String {
    "Rain Radar".to_string()
}

fn default_timestamp_fmt() -> String {
    "%Y-%m-%d %H:%M".to_string()
}

fn default_attribution_text() -> String {
    "© OpenStreetMap · Carto | Radar: RainViewer".to_string()
}

fn default_palette() -> i32 {
    2
}

fn default_one() -> i32 {
    1
}

fn default_timeout() -> f64 {
    8.0
}

fn default_connect_timeout() -> f64 {
    3.0
}

fn default_retries() -> u32 {
    2
}

fn default_jpg_quality() -> u8 {
    92
}

fn default_user_agent() -> String {
    concat!("rainradar-station/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_contact_email() -> String {
    "contact@example.com".to_string()
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            tiles: DEFAULT_TILES.iter().copied().map(TileCoord::from).collect(),
            zoom: 6,
            legend: true,
            legend_width: default_legend_width(),
            legend_padding: default_legend_padding(),
            overlay_size: default_overlay_size(),
            margin_right: default_margin(),
            margin_bottom: default_margin(),
            crop_bottom: 0,
            opacity: default_opacity(),
            border: true,
            border_width: default_border_width(),
            border_color: default_border_color(),
            header_title: default_header_title(),
            timestamp_fmt: default_timestamp_fmt(),
            attribution_text: default_attribution_text(),
            palette: default_palette(),
            smooth: default_one(),
            snow: default_one(),
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            retries: default_retries(),
            jpg_quality: default_jpg_quality(),
            user_agent: default_user_agent(),
            contact_email: default_contact_email(),
        }
    }
}

impl PanelConfig {
    /// Parse from JSON and validate
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| PanelError::config(format!("panel config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no panel can be rendered from
    pub fn validate(&self) -> Result<()> {
        if self.tiles.is_empty() {
            return Err(PanelError::config("tiles must not be empty"));
        }
        if self.zoom == 0 {
            return Err(PanelError::config("zoom must be positive"));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(PanelError::config(format!(
                "opacity must be within [0, 1], got {}",
                self.opacity
            )));
        }
        if !(1..=100).contains(&self.jpg_quality) {
            return Err(PanelError::config(format!(
                "jpg_quality must be within 1..=100, got {}",
                self.jpg_quality
            )));
        }
        if self.overlay_size.0 == 0 || self.overlay_size.1 == 0 {
            return Err(PanelError::config("overlay_size must be non-zero"));
        }
        let timeouts = [("timeout", self.timeout), ("connect_timeout", self.connect_timeout)];
        for (name, secs) in timeouts {
            if secs <= 0.0 || Duration::try_from_secs_f64(secs).is_err() {
                return Err(PanelError::config(format!(
                    "{name} must be a positive number of seconds, got {secs}"
                )));
            }
        }
        Ok(())
    }

    pub fn grid(&self) -> Result<TileGrid> {
        TileGrid::new(self.tiles.clone())
    }

    pub fn radar_style(&self) -> RadarStyle {
        RadarStyle {
            palette: self.palette,
            smooth: self.smooth,
            snow: self.snow,
        }
    }

    /// Attempt budget for tile downloads (first try plus `retries`)
    pub fn tile_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries.saturating_add(1))
    }

    pub fn read_timeout(&self) -> Duration {
        seconds(self.timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        seconds(self.connect_timeout)
    }

    /// Outbound User-Agent header value
    pub fn user_agent_header(&self) -> String {
        user_agent_string(&self.user_agent, &self.contact_email)
    }
}

/// Out-of-range values saturate; `validate` rejects them before use
fn seconds(secs: f64) -> Duration {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) => duration,
        Err(_) if secs > 0.0 => Duration::MAX,
        Err(_) => Duration::ZERO,
    }
}

/// Files read and written by one `generate` call
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PanelPaths {
    /// Standalone radar JPEG
    pub output_image_path: PathBuf,
    /// Background photo, overwritten in place
    pub bg_image_path: PathBuf,
    /// Last good radar overlay (PNG + `.json` sidecar)
    pub radar_image_cache_path: PathBuf,
    /// Stitched basemap (PNG)
    pub basemap_image_cache_path: PathBuf,
}
