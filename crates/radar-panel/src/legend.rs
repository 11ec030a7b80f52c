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

//! Unlabelled precipitation colour scale and colour parsing helpers.

use image::{Rgba, RgbaImage};

use crate::error::{PanelError, Result};

/// Gradient stops from heavy (top) to light (bottom) precipitation
pub const LEGEND_STOPS: [(f32, [u8; 3]); 7] = [
    (0.00, [0xEE, 0x82, 0xEE]), // violet
    (0.20, [0xFF, 0x00, 0x00]), // red
    (0.40, [0xFF, 0x7F, 0x00]), // orange
    (0.60, [0xFF, 0xFF, 0x00]), // yellow
    (0.78, [0x00, 0xFF, 0x00]), // green
    (0.88, [0x00, 0xBF, 0xFF]), // cyan
    (1.00, [0x80, 0x80, 0x80]), // gray
];

const OUTLINE: Rgba<u8> = Rgba([0x55, 0x55, 0x55, 255]);

/// Parse `#RRGGBB` or `#RGB` (leading `#` optional).
pub fn parse_hex_color(hex: &str) -> Result<[u8; 3]> {
    let digits = hex.trim().trim_start_matches('#');
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return Err(PanelError::config(format!("invalid colour {hex:?}"))),
    };

    let channel = |i: usize| {
        u8::from_str_radix(&expanded[i..i + 2], 16)
            .map_err(|e| PanelError::config(format!("invalid colour {hex:?}: {e}")))
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

fn lerp_channel(a: u8, b: u8, t: f32) -> u8 {
    let (a, b) = (f32::from(a), f32::from(b));
    (a + (b - a) * t) as u8
}

/// Colour of the gradient at position `t` in `[0, 1]`.
pub fn gradient_color(t: f32) -> [u8; 3] {
    for pair in LEGEND_STOPS.windows(2) {
        let (p0, c0) = pair[0];
        let (p1, c1) = pair[1];
        if t <= p1 {
            let tt = if (p1 - p0).abs() < f32::EPSILON {
                0.0
            } else {
                ((t - p0) / (p1 - p0)).max(0.0)
            };
            return [
                lerp_channel(c0[0], c1[0], tt),
                lerp_channel(c0[1], c1[1], tt),
                lerp_channel(c0[2], c1[2], tt),
            ];
        }
    }
    LEGEND_STOPS[LEGEND_STOPS.len() - 1].1
}

/// Build a vertical colour bar exactly `height` pixels tall.
///
/// The strip is `max(20, width)` wide and transparent outside the bar. The
/// bar is inset by `padding` and at least 12 px wide, with a one pixel
/// outline flush with the top and bottom edges.
pub fn make_legend(height: u32, width: u32, padding: u32) -> RgbaImage {
    let strip_width = width.max(20);
    let mut legend = RgbaImage::from_pixel(strip_width, height, Rgba([0, 0, 0, 0]));
    if height == 0 {
        return legend;
    }

    let bar_x = padding;
    let bar_w = width.saturating_sub(2 * padding).max(12);

    let put = |img: &mut RgbaImage, x: i64, y: u32, color: Rgba<u8>| {
        if x >= 0 && (x as u32) < img.width() && y < img.height() {
            img.put_pixel(x as u32, y, color);
        }
    };

    let denom = height.saturating_sub(1).max(1) as f32;
    for y in 0..height {
        let [r, g, b] = gradient_color(y as f32 / denom);
        for x in bar_x..bar_x + bar_w {
            put(&mut legend, i64::from(x), y, Rgba([r, g, b, 255]));
        }
    }

    // Outline from (bar_x - 1, 0) to (bar_x + bar_w, height - 1)
    let left = i64::from(bar_x) - 1;
    let right = i64::from(bar_x + bar_w);
    for x in left..=right {
        put(&mut legend, x, 0, OUTLINE);
        put(&mut legend, x, height - 1, OUTLINE);
    }
    for y in 0..height {
        put(&mut legend, left, y, OUTLINE);
        put(&mut legend, right, y, OUTLINE);
    }

    legend
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dominant_color(img: &RgbaImage, y: u32) -> [u8; 3] {
        use std::collections::HashMap;
        let mut counts: HashMap<[u8; 3], usize> = HashMap::new();
        for x in 0..img.width() {
            let p = img.get_pixel(x, y);
            if p[3] == 255 {
                *counts.entry([p[0], p[1], p[2]]).or_default() += 1;
            }
        }
        counts.into_iter().max_by_key(|(_, n)| *n).unwrap().0
    }

    fn assert_close(got: [u8; 3], want: [u8; 3]) {
        for (g, w) in got.iter().zip(want) {
            assert!(g.abs_diff(w) <= 16, "got {got:?}, want {want:?}");
        }
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#808080").unwrap(), [0x80, 0x80, 0x80]);
        assert_eq!(parse_hex_color("#f0a").unwrap(), [0xFF, 0x00, 0xAA]);
        assert_eq!(parse_hex_color("00BFFF").unwrap(), [0x00, 0xBF, 0xFF]);
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("#zzzzzz").is_err());
    }

    #[test]
    fn test_gradient_hits_stops() {
        assert_eq!(gradient_color(0.0), [0xEE, 0x82, 0xEE]);
        assert_eq!(gradient_color(0.2), [0xFF, 0x00, 0x00]);
        assert_eq!(gradient_color(1.0), [0x80, 0x80, 0x80]);
    }

    #[test]
    fn test_gradient_interpolates() {
        // Halfway between red and orange
        assert_eq!(gradient_color(0.3), [0xFF, 0x3F, 0x00]);
    }

    #[test]
    fn test_legend_dimensions_and_ends() {
        let legend = make_legend(100, 54, 8);
        assert_eq!(legend.height(), 100);
        assert!(legend.width() >= 54);

        // Top and bottom rows are outline; the gradient ends sit just inside
        assert_close(dominant_color(&legend, 1), [0xEE, 0x82, 0xEE]);
        assert_close(dominant_color(&legend, 98), [0x80, 0x80, 0x80]);
    }

    #[test]
    fn test_legend_outline_and_transparent_margin() {
        let legend = make_legend(50, 54, 8);
        assert_eq!(legend.get_pixel(7, 25), &OUTLINE);
        assert_eq!(legend.get_pixel(8 + 38, 25), &OUTLINE);
        assert_eq!(legend.get_pixel(20, 0), &OUTLINE);
        assert_eq!(legend.get_pixel(20, 49), &OUTLINE);
        assert_eq!(legend.get_pixel(2, 25)[3], 0);
        assert_eq!(legend.get_pixel(53, 25)[3], 0);
    }

    #[test]
    fn test_narrow_legend_is_widened() {
        let legend = make_legend(10, 5, 8);
        assert_eq!(legend.width(), 20);
        assert_eq!(legend.height(), 10);
    }
}
