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

//! Tile grid layout.
//!
//! Maps an ordered list of slippy-map tile coordinates onto a row-major
//! canvas of fixed-size cells.

use serde::{Deserialize, Serialize};

use crate::error::{PanelError, Result};

/// Edge length of a source tile in pixels
pub const TILE_SIZE: u32 = 256;

/// Slippy-map tile coordinate at the configured zoom level.
///
/// Serialized as a two-element array `[x, y]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl From<(u32, u32)> for TileCoord {
    fn from((x, y): (u32, u32)) -> Self {
        Self { x, y }
    }
}

impl From<TileCoord> for (u32, u32) {
    fn from(coord: TileCoord) -> Self {
        (coord.x, coord.y)
    }
}

/// Compute `(columns, rows)` for `n` tiles.
///
/// Columns start at the integer square root of `n` and step down until they
/// divide `n` evenly, bottoming out at a single column. Prime counts
/// therefore end up as one column of `n` rows.
pub fn grid_shape(n: usize) -> Result<(u32, u32)> {
    if n == 0 {
        return Err(PanelError::config("tiles must not be empty"));
    }

    let mut cols = 1usize;
    while (cols + 1) * (cols + 1) <= n {
        cols += 1;
    }
    while cols > 1 && n % cols != 0 {
        cols -= 1;
    }
    let rows = n.div_ceil(cols);

    Ok((cols as u32, rows as u32))
}

/// Ordered tile list together with its derived canvas shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileGrid {
    tiles: Vec<TileCoord>,
    cols: u32,
    rows: u32,
}

impl TileGrid {
    pub fn new(tiles: Vec<TileCoord>) -> Result<Self> {
        let (cols, rows) = grid_shape(tiles.len())?;
        Ok(Self { tiles, cols, rows })
    }

    pub fn tiles(&self) -> &[TileCoord] {
        &self.tiles
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Canvas size in pixels
    pub fn pixel_size(&self) -> (u32, u32) {
        (self.cols * TILE_SIZE, self.rows * TILE_SIZE)
    }

    /// Top-left pixel of the cell holding the tile at `index`
    pub fn cell_origin(&self, index: usize) -> (u32, u32) {
        let index = index as u32;
        let row = index / self.cols;
        let col = index % self.cols;
        (col * TILE_SIZE, row * TILE_SIZE)
    }

    /// Iterate tiles with their cell origins
    pub fn cells(&self) -> impl Iterator<Item = (TileCoord, (u32, u32))> + '_ {
        self.tiles
            .iter()
            .enumerate()
            .map(|(idx, coord)| (*coord, self.cell_origin(idx)))
    }
}
