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

//! JPEG output and embedding of the finished panel into the background photo.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage, RgbaImage};
use log::{debug, info};

use crate::config::PanelPaths;
use crate::error::Result;

/// Where the panel lands on the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub overlay_size: (u32, u32),
    pub margin_right: u32,
    pub margin_bottom: u32,
}

impl Placement {
    /// Top-left corner on a `bg_w` x `bg_h` background, clamped at zero
    pub fn offset(&self, bg_w: u32, bg_h: u32) -> (u32, u32) {
        let (ow, oh) = self.overlay_size;
        (
            bg_w.saturating_sub(ow).saturating_sub(self.margin_right),
            bg_h.saturating_sub(oh).saturating_sub(self.margin_bottom),
        )
    }
}

/// Encode an RGB image as baseline JPEG, creating parent directories.
///
/// The JPEG is written beside `path` and renamed over it, so a failed
/// write leaves any existing file untouched.
pub fn save_jpeg(image: &RgbImage, path: &Path, quality: u8) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = partial_path(path);
    if let Err(e) = write_jpeg(image, &tmp, quality) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)?;

    debug!("Wrote {}x{} JPEG to {}", image.width(), image.height(), path.display());
    Ok(())
}

fn write_jpeg(image: &RgbImage, path: &Path, quality: u8) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    JpegEncoder::new_with_quality(&mut writer, quality).encode_image(image)?;
    writer.flush()?;
    Ok(())
}

/// `radar.jpg` -> `radar.jpg.partial`
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

/// Drop the alpha channel
pub fn flatten(image: &RgbaImage) -> RgbImage {
    DynamicImage::ImageRgba8(image.clone()).to_rgb8()
}

/// Paste a resized copy of `panel` onto `background` at the placement offset.
pub fn paste_panel(background: &RgbImage, panel: &RgbaImage, placement: Placement) -> RgbImage {
    let (ow, oh) = placement.overlay_size;
    let resized = imageops::resize(panel, ow, oh, FilterType::Lanczos3);
    let (x, y) = placement.offset(background.width(), background.height());

    let mut canvas = DynamicImage::ImageRgb8(background.clone()).to_rgba8();
    imageops::overlay(&mut canvas, &resized, i64::from(x), i64::from(y));
    DynamicImage::ImageRgba8(canvas).to_rgb8()
}

/// Write the standalone panel and embed it into the background photo.
///
/// The background is read before anything is written to it and is
/// replaced atomically as the very last step.
pub fn embed(
    panel: &RgbaImage,
    paths: &PanelPaths,
    placement: Placement,
    quality: u8,
) -> Result<()> {
    save_jpeg(&flatten(panel), &paths.output_image_path, quality)?;
    info!("Saved radar panel to {}", paths.output_image_path.display());

    let background = image::open(&paths.bg_image_path)?.to_rgb8();
    let combined = paste_panel(&background, panel, placement);
    save_jpeg(&combined, &paths.bg_image_path, quality)?;

    let (x, y) = placement.offset(background.width(), background.height());
    info!(
        "Embedded panel into {} at ({}, {})",
        paths.bg_image_path.display(),
        x,
        y
    );
    Ok(())
}
