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

//! RainViewer radar overlay with last-known-good fallback.
//!
//! The latest past frame is looked up from the public weather-maps index,
//! its tiles are composited into a transparent overlay, and the result is
//! cached. When anything in that chain fails, the previously cached overlay
//! is used instead; when there is no usable cache either, the radar layer
//! is simply left out.

use std::path::Path;

use image::{imageops, Rgba, RgbaImage};
use log::{info, warn};
use serde::Deserialize;

use crate::cache::CacheStore;
use crate::error::{PanelError, Result};
use crate::fetch::{fetch_with_retry, Fetch, RetryPolicy};
use crate::grid::{TileCoord, TileGrid};

/// RainViewer public weather-maps index
pub const RAINVIEWER_API: &str = "https://api.rainviewer.com/public/weather-maps.json";

/// Tile host used when the index does not name one
pub const DEFAULT_RADAR_HOST: &str = "https://tilecache.rainviewer.com";

#[derive(Debug, Deserialize)]
struct WeatherMaps {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    radar: Option<RadarSection>,
}

#[derive(Debug, Deserialize)]
struct RadarSection {
    #[serde(default)]
    past: Vec<FrameEntry>,
}

#[derive(Debug, Deserialize)]
struct FrameEntry {
    time: i64,
    path: String,
}

/// Most recent radar frame advertised by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestFrame {
    pub host: String,
    pub path: String,
    pub epoch: i64,
}

/// RainViewer tile style options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadarStyle {
    /// Colour scheme id
    pub palette: i32,
    /// Blur the radar data (0 or 1)
    pub smooth: i32,
    /// Render snow with its own colours (0 or 1)
    pub snow: i32,
}

impl Default for RadarStyle {
    fn default() -> Self {
        Self {
            palette: 2,
            smooth: 1,
            snow: 1,
        }
    }
}

/// Everything needed to fetch one overlay.
#[derive(Debug, Clone)]
pub struct RadarRequest<'a> {
    pub grid: &'a TileGrid,
    pub zoom: u8,
    pub style: RadarStyle,
    pub opacity: f32,
    pub tile_policy: RetryPolicy,
    pub metadata_policy: RetryPolicy,
}

/// Outcome of a radar fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum RadarFrame {
    /// Freshly downloaded overlay
    Fresh { overlay: RgbaImage, epoch: i64 },
    /// Overlay recovered from the cache after a failed download
    Stale {
        overlay: RgbaImage,
        epoch: Option<i64>,
    },
    /// Neither network nor cache produced an overlay
    Unavailable,
}

impl RadarFrame {
    pub fn overlay(&self) -> Option<&RgbaImage> {
        match self {
            RadarFrame::Fresh { overlay, .. } | RadarFrame::Stale { overlay, .. } => Some(overlay),
            RadarFrame::Unavailable => None,
        }
    }

    pub fn epoch(&self) -> Option<i64> {
        match self {
            RadarFrame::Fresh { epoch, .. } => Some(*epoch),
            RadarFrame::Stale { epoch, .. } => *epoch,
            RadarFrame::Unavailable => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RadarFrame::Fresh { .. } => "fresh",
            RadarFrame::Stale { .. } => "stale",
            RadarFrame::Unavailable => "unavailable",
        }
    }
}

/// Scale the alpha channel by `opacity`.
///
/// `opacity >= 1.0` returns an identical copy and `opacity <= 0.0` a fully
/// transparent image of the same size.
pub fn apply_alpha(image: &RgbaImage, opacity: f32) -> RgbaImage {
    if opacity >= 1.0 {
        return image.clone();
    }
    if opacity <= 0.0 {
        return RgbaImage::from_pixel(image.width(), image.height(), Rgba([0, 0, 0, 0]));
    }

    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel[3] = (f32::from(pixel[3]) * opacity) as u8;
    }
    out
}

/// Build the URL of one radar tile
pub fn radar_tile_url(
    frame: &LatestFrame,
    coord: TileCoord,
    zoom: u8,
    style: RadarStyle,
) -> String {
    format!(
        "{}{}/256/{}/{}/{}/{}/{}_{}.png",
        frame.host, frame.path, zoom, coord.x, coord.y, style.palette, style.smooth, style.snow
    )
}

/// Parse the weather-maps index and pick the newest past frame.
pub fn parse_latest_frame(body: &[u8]) -> Result<LatestFrame> {
    let maps: WeatherMaps = serde_json::from_slice(body)?;
    let host = maps
        .host
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| DEFAULT_RADAR_HOST.to_string());

    let last = maps
        .radar
        .and_then(|radar| radar.past.into_iter().last())
        .ok_or(PanelError::NoDataAvailable)?;

    Ok(LatestFrame {
        host,
        path: last.path,
        epoch: last.time,
    })
}

/// Query the provider for the latest frame.
pub fn fetch_latest_frame<F: Fetch + ?Sized>(
    fetcher: &F,
    policy: RetryPolicy,
) -> Result<LatestFrame> {
    let body = fetch_with_retry(fetcher, RAINVIEWER_API, policy)?;
    parse_latest_frame(&body)
}

/// Download and composite every radar tile for `frame`.
pub fn compose_radar_overlay<F: Fetch + ?Sized>(
    fetcher: &F,
    frame: &LatestFrame,
    request: &RadarRequest<'_>,
) -> Result<RgbaImage> {
    let (width, height) = request.grid.pixel_size();
    let mut overlay = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));

    for (coord, (x, y)) in request.grid.cells() {
        let url = radar_tile_url(frame, coord, request.zoom, request.style);
        let bytes = fetch_with_retry(fetcher, &url, request.tile_policy)?;
        let tile = image::load_from_memory(&bytes)?.to_rgba8();
        let tile = apply_alpha(&tile, request.opacity);
        imageops::overlay(&mut overlay, &tile, i64::from(x), i64::from(y));
    }

    Ok(overlay)
}

fn download_overlay<F: Fetch + ?Sized>(
    fetcher: &F,
    request: &RadarRequest<'_>,
) -> Result<(RgbaImage, i64)> {
    let frame = fetch_latest_frame(fetcher, request.metadata_policy)?;
    info!("Latest radar frame {} (epoch {})", frame.path, frame.epoch);
    let overlay = compose_radar_overlay(fetcher, &frame, request)?;
    Ok((overlay, frame.epoch))
}

/// Fetch the current overlay, falling back to the cached one.
///
/// Never fails: the worst outcome is [`RadarFrame::Unavailable`]. Writing
/// the fresh overlay to the cache is best-effort.
pub fn fetch_radar_overlay<F: Fetch + ?Sized, S: CacheStore + ?Sized>(
    fetcher: &F,
    store: &S,
    key: &Path,
    request: &RadarRequest<'_>,
) -> RadarFrame {
    match download_overlay(fetcher, request) {
        Ok((overlay, epoch)) => {
            if let Err(e) = store.write(key, &overlay, Some(epoch)) {
                warn!("Could not cache radar overlay at {}: {}", key.display(), e);
            }
            RadarFrame::Fresh { overlay, epoch }
        }
        Err(e) => {
            warn!("Radar download failed, using cache: {}", e);
            match store.read(key) {
                Some(cached) => {
                    info!(
                        "Using cached radar overlay from {} (epoch {:?})",
                        key.display(),
                        cached.epoch
                    );
                    RadarFrame::Stale {
                        overlay: cached.image,
                        epoch: cached.epoch,
                    }
                }
                None => {
                    warn!("No cached radar overlay available, rendering basemap only");
                    RadarFrame::Unavailable
                }
            }
        }
    }
}
