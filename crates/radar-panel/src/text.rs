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

//! Single-line text measuring and drawing for header and footer strips.
//!
//! Text is laid out as a tiny SVG document and rasterized with resvg. The
//! system fonts are used when present, with a bundled DejaVu Sans behind
//! them so labels are drawn on hosts without any fonts installed. A renderer
//! with an empty font database measures zero pixels and draws nothing;
//! callers apply their own minimum strip heights.

use std::sync::Arc;

use image::{Pixel, Rgba, RgbaImage};
use log::debug;
use resvg::tiny_skia;

/// Default font size in pixels, close to a small bitmap UI font
pub const DEFAULT_FONT_SIZE: f32 = 11.0;

const FONT_FAMILY: &str = "DejaVu Sans, Liberation Sans, Arial, sans-serif";

/// Embedded fallback font - DejaVu Sans
const BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");
const BUNDLED_FAMILY: &str = "DejaVu Sans";

/// Replace typographic punctuation with ASCII equivalents.
pub fn sanitize_text(text: &str) -> String {
    text.replace(['\u{2014}', '\u{2013}'], "-")
        .replace('\u{2019}', "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn hex(color: Rgba<u8>) -> String {
    format!("#{:02X}{:02X}{:02X}", color[0], color[1], color[2])
}

/// Renders single lines of text onto RGBA images.
pub struct TextRenderer {
    options: usvg::Options<'static>,
    font_size: f32,
}

impl std::fmt::Debug for TextRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRenderer")
            .field("font_size", &self.font_size)
            .field("faces", &self.options.fontdb.len())
            .finish_non_exhaustive()
    }
}

impl TextRenderer {
    /// Renderer backed by the fonts installed on this machine plus the
    /// bundled fallback
    pub fn with_system_fonts() -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        debug!("Loaded {} system font face(s)", db.len());
        load_bundled(&mut db);
        Self::with_fontdb(Arc::new(db))
    }

    /// Renderer using only the bundled font, independent of the host
    pub fn with_bundled_font() -> Self {
        let mut db = usvg::fontdb::Database::new();
        load_bundled(&mut db);
        Self::with_fontdb(Arc::new(db))
    }

    /// Renderer with no fonts at all; every string measures zero
    pub fn without_fonts() -> Self {
        Self::with_fontdb(Arc::new(usvg::fontdb::Database::new()))
    }

    pub fn with_fontdb(fontdb: Arc<usvg::fontdb::Database>) -> Self {
        let options = usvg::Options {
            fontdb,
            ..Default::default()
        };
        Self {
            options,
            font_size: DEFAULT_FONT_SIZE,
        }
    }

    #[must_use]
    pub fn with_font_size(mut self, font_size: f32) -> Self {
        self.font_size = font_size;
        self
    }

    pub fn has_fonts(&self) -> bool {
        !self.options.fontdb.is_empty()
    }

    fn layout(&self, text: &str, color: Rgba<u8>, width: u32, height: u32) -> Option<usvg::Tree> {
        if text.is_empty() || width == 0 || height == 0 {
            return None;
        }

        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}"><text x="0" y="{baseline}" font-family="{family}" font-size="{size}" fill="{fill}" fill-opacity="{opacity}" xml:space="preserve">{body}</text></svg>"#,
            w = width,
            h = height,
            baseline = self.font_size,
            family = FONT_FAMILY,
            size = self.font_size,
            fill = hex(color),
            opacity = f32::from(color[3]) / 255.0,
            body = escape_xml(text),
        );

        match usvg::Tree::from_str(&svg, &self.options) {
            Ok(tree) if tree.root().has_children() => Some(tree),
            Ok(_) => None,
            Err(e) => {
                debug!("Could not lay out text {:?}: {}", text, e);
                None
            }
        }
    }

    /// Distance from the draw origin to the bottom of the rendered glyphs.
    pub fn measure_height(&self, text: &str) -> u32 {
        let probe_width = (text.chars().count() as f32 * self.font_size).ceil() as u32 + 1;
        let probe_height = (self.font_size * 3.0).ceil() as u32;

        self.layout(text, Rgba([0, 0, 0, 255]), probe_width, probe_height)
            .map_or(0, |tree| tree.root().abs_bounding_box().bottom().ceil().max(0.0) as u32)
    }

    /// Draw `text` with its top-left corner at (`x`, `y`), clipped to the canvas.
    pub fn draw(&self, canvas: &mut RgbaImage, x: u32, y: u32, text: &str, color: Rgba<u8>) {
        let width = canvas.width().saturating_sub(x);
        let height = canvas.height().saturating_sub(y);

        let Some(tree) = self.layout(text, color, width, height) else {
            return;
        };
        let Some(mut pixmap) = tiny_skia::Pixmap::new(width, height) else {
            return;
        };
        resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

        for (idx, px) in pixmap.pixels().iter().enumerate() {
            if px.alpha() == 0 {
                continue;
            }
            let c = px.demultiply();
            let px_x = x + (idx as u32 % width);
            let px_y = y + (idx as u32 / width);
            canvas
                .get_pixel_mut(px_x, px_y)
                .blend(&Rgba([c.red(), c.green(), c.blue(), c.alpha()]));
        }
    }
}

fn load_bundled(db: &mut usvg::fontdb::Database) {
    db.load_font_data(BUNDLED_FONT.to_vec());
    db.set_sans_serif_family(BUNDLED_FAMILY);
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::with_system_fonts()
    }
}
