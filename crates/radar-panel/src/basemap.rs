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

//! Stitched Carto basemap with a persistent cache.
//!
//! Map tiles are static, so a cached basemap never expires; delete the
//! cache file to force a rebuild.

use std::path::Path;

use image::{imageops, Rgba, RgbaImage};
use log::{info, warn};

use crate::cache::CacheStore;
use crate::error::Result;
use crate::fetch::{fetch_with_retry, Fetch, RetryPolicy};
use crate::grid::{TileCoord, TileGrid};

/// Carto light basemap tile endpoint
pub const CARTO_BASE_URL: &str = "https://basemaps.cartocdn.com/light_all";

/// Get the basemap tile URL for a coordinate
pub fn basemap_tile_url(coord: TileCoord, zoom: u8) -> String {
    format!("{}/{}/{}/{}.png", CARTO_BASE_URL, zoom, coord.x, coord.y)
}

/// Download every tile of `grid` and paste it into an opaque black canvas.
pub fn compose_basemap<F: Fetch + ?Sized>(
    fetcher: &F,
    grid: &TileGrid,
    zoom: u8,
    policy: RetryPolicy,
) -> Result<RgbaImage> {
    let (width, height) = grid.pixel_size();
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));

    for (coord, (x, y)) in grid.cells() {
        let url = basemap_tile_url(coord, zoom);
        let bytes = fetch_with_retry(fetcher, &url, policy)?;
        let tile = image::load_from_memory(&bytes)?.to_rgba8();
        imageops::replace(&mut canvas, &tile, i64::from(x), i64::from(y));
    }

    Ok(canvas)
}

/// Return the cached basemap, or build and cache it on a miss.
///
/// An undecodable cache file counts as a miss. Failing to persist a freshly
/// built basemap is an error.
pub fn load_or_build_basemap<F: Fetch + ?Sized, S: CacheStore + ?Sized>(
    store: &S,
    key: &Path,
    grid: &TileGrid,
    zoom: u8,
    fetcher: &F,
    policy: RetryPolicy,
) -> Result<RgbaImage> {
    if let Some(cached) = store.read(key) {
        info!("Loaded basemap from cache {}", key.display());
        return Ok(cached.image);
    }

    info!(
        "Building basemap from {} tile(s) at zoom {}",
        grid.tiles().len(),
        zoom
    );
    let basemap = compose_basemap(fetcher, grid, zoom, policy)?;

    if let Err(e) = store.write(key, &basemap, None) {
        warn!("Failed to persist basemap to {}: {}", key.display(), e);
        return Err(e);
    }

    Ok(basemap)
}
