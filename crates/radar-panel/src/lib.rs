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

//! Rain-radar panel generation.
//!
//! This library turns a list of slippy-map tiles into a decorated radar panel
//! and embeds it into a background photograph. The pipeline is built from
//! layers that can be used on their own:
//!
//! - **Grid**: tile layout math ([`grid`])
//! - **Transport**: blocking HTTP with bounded retries ([`fetch`])
//! - **Cache**: PNG images with an optional epoch sidecar ([`cache`])
//! - **Sources**: the Carto basemap ([`basemap`]) and the RainViewer overlay ([`radar`])
//! - **Rendering**: header, footer, border and legend ([`compose`], [`legend`], [`text`])
//! - **Output**: JPEG writing and embedding ([`embed`])
//!
//! # Quick Start
//!
//! ```no_run
//! use radar_panel::{generate, PanelConfig, PanelPaths};
//!
//! let config = PanelConfig::from_json(r#"{"tiles": [[33, 21], [34, 21]], "zoom": 6}"#)?;
//! let paths = PanelPaths {
//!     output_image_path: "out/radar.jpg".into(),
//!     bg_image_path: "out/bg.jpg".into(),
//!     radar_image_cache_path: "cache/radar.png".into(),
//!     basemap_image_cache_path: "cache/basemap.png".into(),
//! };
//! let generated = generate(&config, &paths)?;
//! println!("radar was {}", generated.source);
//! # Ok::<(), radar_panel::PanelError>(())
//! ```
//!
//! # Failure model
//!
//! Basemap problems abort the run. Radar problems never do: the overlay
//! falls back to the last cached frame, and then to no overlay at all. The
//! background photo is written last, so an aborted run leaves it untouched.

pub mod basemap;
pub mod cache;
pub mod compose;
pub mod config;
pub mod embed;
pub mod error;
pub mod fetch;
pub mod grid;
pub mod legend;
pub mod radar;
pub mod text;

#[cfg(test)]
mod testing;

use std::time::Duration;

use log::info;

pub use cache::{CacheStore, CachedImage, FileCacheStore, MemoryCacheStore};
pub use compose::compose_panel;
pub use config::{PanelConfig, PanelPaths};
pub use embed::{embed, Placement};
pub use error::{PanelError, Result};
pub use fetch::{Fetch, FetchError, HttpFetcher, RetryPolicy};
pub use grid::{grid_shape, TileCoord, TileGrid};
pub use legend::make_legend;
pub use radar::{apply_alpha, RadarFrame};
pub use text::TextRenderer;

/// Attempts for the radar metadata request
pub const METADATA_ATTEMPTS: u32 = 3;

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    /// `fresh`, `stale` or `unavailable`
    pub source: &'static str,
    /// Radar frame timestamp shown in the header, if any
    pub epoch: Option<i64>,
    /// Size of the panel before it was resized for embedding
    pub panel_size: (u32, u32),
}

/// Runs the full pipeline against injected transport and cache.
#[derive(Debug)]
pub struct Generator<F, S> {
    fetcher: F,
    store: S,
    text: TextRenderer,
    backoff: Duration,
}

impl Generator<HttpFetcher, FileCacheStore> {
    /// Production wiring: reqwest transport, file cache, system and bundled fonts
    pub fn for_config(config: &PanelConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(
            &config.user_agent_header(),
            config.connect_timeout(),
            config.read_timeout(),
        )?;
        Ok(Self::new(fetcher, FileCacheStore::new(), TextRenderer::with_system_fonts()))
    }
}

impl<F: Fetch, S: CacheStore> Generator<F, S> {
    pub fn new(fetcher: F, store: S, text: TextRenderer) -> Self {
        Self {
            fetcher,
            store,
            text,
            backoff: RetryPolicy::default().base_delay,
        }
    }

    /// Override the base retry delay
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn policy(&self, max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: self.backoff,
        }
    }

    /// Basemap, radar, compose, embed.
    pub fn generate(&self, config: &PanelConfig, paths: &PanelPaths) -> Result<Generated> {
        config.validate()?;
        let grid = config.grid()?;
        let tile_policy = self.policy(config.tile_policy().max_attempts);

        let basemap = basemap::load_or_build_basemap(
            &self.store,
            &paths.basemap_image_cache_path,
            &grid,
            config.zoom,
            &self.fetcher,
            tile_policy,
        )?;

        let request = radar::RadarRequest {
            grid: &grid,
            zoom: config.zoom,
            style: config.radar_style(),
            opacity: config.opacity,
            tile_policy,
            metadata_policy: self.policy(METADATA_ATTEMPTS),
        };
        let frame = radar::fetch_radar_overlay(
            &self.fetcher,
            &self.store,
            &paths.radar_image_cache_path,
            &request,
        );
        info!("Radar source: {} (epoch {:?})", frame.label(), frame.epoch());

        let panel = compose_panel(&basemap, frame.overlay(), frame.epoch(), config, &self.text);

        let placement = Placement {
            overlay_size: config.overlay_size,
            margin_right: config.margin_right,
            margin_bottom: config.margin_bottom,
        };
        embed(&panel, paths, placement, config.jpg_quality)?;

        Ok(Generated {
            source: frame.label(),
            epoch: frame.epoch(),
            panel_size: panel.dimensions(),
        })
    }
}

/// Run the whole pipeline with the production transport and file cache.
pub fn generate(config: &PanelConfig, paths: &PanelPaths) -> Result<Generated> {
    config.validate()?;
    Generator::for_config(config)?.generate(config, paths)
}
