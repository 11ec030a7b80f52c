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

//! Panel composition.
//!
//! Every step returns a new image; inputs are never modified. The order is
//! fixed: radar over basemap, bottom crop, border, header, footer, legend.
//! Header, footer and border only wrap the map; the legend is appended last
//! and spans the full decorated height.

use std::fmt::Write as _;

use chrono::{Local, TimeZone};
use image::{imageops, Rgba, RgbaImage};
use log::{debug, warn};

use crate::config::PanelConfig;
use crate::legend::{make_legend, parse_hex_color};
use crate::text::{sanitize_text, TextRenderer};

pub const TEXT_PAD_X: u32 = 8;
pub const HEADER_PAD_Y: u32 = 6;
pub const HEADER_MIN_TEXT_HEIGHT: u32 = 12;
pub const FOOTER_PAD_Y: u32 = 4;
pub const FOOTER_MIN_TEXT_HEIGHT: u32 = 10;

const HEADER_BG: Rgba<u8> = Rgba([60, 60, 60, 200]);
const HEADER_TEXT: Rgba<u8> = Rgba([0xDC, 0xDC, 0xDC, 255]);
const FOOTER_BG: Rgba<u8> = Rgba([0, 0, 0, 100]);
const FOOTER_TEXT: Rgba<u8> = Rgba([0xD0, 0xD0, 0xD0, 255]);
const FALLBACK_BORDER: [u8; 3] = [0x80, 0x80, 0x80];
const FALLBACK_TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M";

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Format an epoch in local time.
///
/// An unusable format string falls back to `%Y-%m-%d %H:%M`.
pub fn format_timestamp(epoch: i64, fmt: &str) -> Option<String> {
    let local = Local.timestamp_opt(epoch, 0).single()?;

    let mut out = String::new();
    if write!(out, "{}", local.format(fmt)).is_ok() {
        return Some(out);
    }

    warn!("Invalid timestamp format {:?}, using default", fmt);
    Some(local.format(FALLBACK_TIMESTAMP_FMT).to_string())
}

/// `"<title> | <timestamp>"`, or just the title without an epoch; sanitized
pub fn header_text(title: &str, epoch: Option<i64>, fmt: &str) -> String {
    let text = match epoch.and_then(|e| format_timestamp(e, fmt)) {
        Some(ts) if !ts.is_empty() => format!("{title} | {ts}"),
        _ => title.to_string(),
    };
    sanitize_text(&text)
}

pub fn header_height(text: &TextRenderer, label: &str) -> u32 {
    HEADER_PAD_Y + text.measure_height(label).max(HEADER_MIN_TEXT_HEIGHT) + HEADER_PAD_Y
}

/// Footer strip height; zero when there is no attribution
pub fn footer_height(text: &TextRenderer, attribution: &str) -> u32 {
    if attribution.is_empty() {
        return 0;
    }
    let label = sanitize_text(attribution);
    FOOTER_PAD_Y + text.measure_height(&label).max(FOOTER_MIN_TEXT_HEIGHT) + FOOTER_PAD_Y
}

/// Paste `src` at (`x`, `y`) using its own alpha as the mask.
///
/// Every channel, alpha included, is interpolated between the destination
/// and the source, so a translucent strip over a transparent canvas ends up
/// darker and more transparent than its nominal colour.
fn mask_paste(dst: &mut RgbaImage, src: &RgbaImage, x: u32, y: u32) {
    for (sx, sy, pixel) in src.enumerate_pixels() {
        let (dx, dy) = (x + sx, y + sy);
        if dx >= dst.width() || dy >= dst.height() {
            continue;
        }
        let mask = u32::from(pixel[3]);
        let under = dst.get_pixel_mut(dx, dy);
        for c in 0..4 {
            let blended = u32::from(pixel[c]) * mask + u32::from(under[c]) * (255 - mask);
            under[c] = ((blended + 127) / 255) as u8;
        }
    }
}

fn strip(width: u32, height: u32, color: Rgba<u8>) -> RgbaImage {
    RgbaImage::from_pixel(width, height, color)
}

/// Source-over composite of `overlay` onto a copy of `base`
pub fn composite_over(base: &RgbaImage, overlay: Option<&RgbaImage>) -> RgbaImage {
    let mut out = base.clone();
    if let Some(overlay) = overlay {
        if overlay.dimensions() != base.dimensions() {
            debug!(
                "Radar overlay {:?} does not match basemap {:?}",
                overlay.dimensions(),
                base.dimensions()
            );
        }
        imageops::overlay(&mut out, overlay, 0, 0);
    }
    out
}

/// Remove `amount` rows from the bottom; no-op unless `0 < amount < height`
pub fn crop_bottom(img: RgbaImage, amount: i32) -> RgbaImage {
    if amount <= 0 || amount as u32 >= img.height() {
        return img;
    }
    let height = img.height() - amount as u32;
    imageops::crop_imm(&img, 0, 0, img.width(), height).to_image()
}

/// Surround the image with a solid border `width` pixels wide
pub fn add_border(img: &RgbaImage, width: u32, color: [u8; 3]) -> RgbaImage {
    let [r, g, b] = color;
    let mut out = RgbaImage::from_pixel(
        img.width() + 2 * width,
        img.height() + 2 * width,
        Rgba([r, g, b, 255]),
    );
    imageops::replace(&mut out, img, i64::from(width), i64::from(width));
    out
}

/// Put a gray title strip above the image
pub fn add_header(img: &RgbaImage, label: &str, text: &TextRenderer) -> RgbaImage {
    let height = header_height(text, label);
    let mut out = RgbaImage::from_pixel(img.width(), height + img.height(), TRANSPARENT);
    mask_paste(&mut out, &strip(img.width(), height, HEADER_BG), 0, 0);
    mask_paste(&mut out, img, 0, height);
    text.draw(&mut out, TEXT_PAD_X, HEADER_PAD_Y, label, HEADER_TEXT);
    out
}

/// Put a translucent attribution strip below the image
pub fn add_footer(img: &RgbaImage, attribution: &str, text: &TextRenderer) -> RgbaImage {
    if attribution.is_empty() {
        return img.clone();
    }
    let label = sanitize_text(attribution);
    let height = footer_height(text, attribution);

    let mut out = RgbaImage::from_pixel(img.width(), img.height() + height, TRANSPARENT);
    mask_paste(&mut out, img, 0, 0);
    mask_paste(&mut out, &strip(img.width(), height, FOOTER_BG), 0, img.height());
    text.draw(&mut out, TEXT_PAD_X, img.height() + FOOTER_PAD_Y, &label, FOOTER_TEXT);
    out
}

/// Append `legend` to the right edge of `img`
pub fn append_legend(img: &RgbaImage, legend: &RgbaImage) -> RgbaImage {
    let mut out = RgbaImage::from_pixel(img.width() + legend.width(), img.height(), TRANSPARENT);
    imageops::replace(&mut out, img, 0, 0);
    imageops::overlay(&mut out, legend, i64::from(img.width()), 0);
    out
}

/// Build the finished radar panel.
pub fn compose_panel(
    basemap: &RgbaImage,
    overlay: Option<&RgbaImage>,
    epoch: Option<i64>,
    config: &PanelConfig,
    text: &TextRenderer,
) -> RgbaImage {
    let mut panel = composite_over(basemap, overlay);
    panel = crop_bottom(panel, config.crop_bottom);

    if config.border && config.border_width > 0 {
        let color = parse_hex_color(&config.border_color).unwrap_or_else(|e| {
            warn!("{}; using default border colour", e);
            FALLBACK_BORDER
        });
        panel = add_border(&panel, config.border_width, color);
    }

    let label = header_text(&config.header_title, epoch, &config.timestamp_fmt);
    panel = add_header(&panel, &label, text);
    panel = add_footer(&panel, &config.attribution_text, text);

    if config.legend {
        let legend = make_legend(panel.height(), config.legend_width, config.legend_padding);
        panel = append_legend(&panel, &legend);
    }

    debug!("Composed panel {}x{}", panel.width(), panel.height());
    panel
}
