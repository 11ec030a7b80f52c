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

//! Shared fixtures for unit tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Cursor};
use std::path::Path;

use image::{ImageFormat, Rgba, RgbaImage};

use crate::cache::{CacheStore, CachedImage};
use crate::error::Result;
use crate::fetch::{Fetch, FetchError};

/// Encode a solid-colour tile as PNG bytes
pub fn png_tile(color: [u8; 4]) -> Vec<u8> {
    png_bytes(&RgbaImage::from_pixel(256, 256, Rgba(color)))
}

pub fn png_bytes(image: &RgbaImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Serves canned responses by URL and counts requests.
///
/// Unknown URLs answer with HTTP 404; URLs starting with a registered
/// failing prefix answer with HTTP 503.
#[derive(Debug, Default)]
pub struct MapFetcher {
    responses: HashMap<String, Vec<u8>>,
    failing_prefixes: Vec<String>,
    fallback: Option<Vec<u8>>,
    pub calls: RefCell<Vec<String>>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, body: Vec<u8>) -> Self {
        self.responses.insert(url.into(), body);
        self
    }

    /// Answer every unregistered URL with `body`
    pub fn with_fallback(mut self, body: Vec<u8>) -> Self {
        self.fallback = Some(body);
        self
    }

    pub fn failing(mut self, prefix: impl Into<String>) -> Self {
        self.failing_prefixes.push(prefix.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn calls_with_prefix(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|url| url.starts_with(prefix))
            .count()
    }
}

impl Fetch for MapFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.borrow_mut().push(url.to_string());

        if self.failing_prefixes.iter().any(|p| url.starts_with(p.as_str())) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            });
        }

        self.responses
            .get(url)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// A cache that is always empty and refuses every write
#[derive(Debug, Default)]
pub struct ReadOnlyStore {
    pub writes: RefCell<usize>,
}

impl CacheStore for ReadOnlyStore {
    fn read(&self, _key: &Path) -> Option<CachedImage> {
        None
    }

    fn write(&self, _key: &Path, _image: &RgbaImage, _epoch: Option<i64>) -> Result<()> {
        *self.writes.borrow_mut() += 1;
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only cache").into())
    }
}
