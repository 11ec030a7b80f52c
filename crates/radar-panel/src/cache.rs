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

//! Persisted "last good" images for the basemap and radar layers.
//!
//! Each entry is a PNG plus an optional JSON sidecar (same path, `.json`
//! extension) holding the radar epoch. A file that exists but fails to
//! decode is reported as a miss, never as an error.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Image read back from a cache together with its recorded epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedImage {
    pub image: RgbaImage,
    pub epoch: Option<i64>,
}

/// Storage for cached layer images, keyed by path.
pub trait CacheStore {
    /// Returns `None` when the entry is missing or unreadable.
    fn read(&self, key: &Path) -> Option<CachedImage>;

    fn write(&self, key: &Path, image: &RgbaImage, epoch: Option<i64>) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    epoch: i64,
}

/// Sidecar metadata path for a cached image
pub fn sidecar_path(key: &Path) -> PathBuf {
    key.with_extension("json")
}

/// Cache backed by PNG files on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCacheStore;

impl FileCacheStore {
    pub fn new() -> Self {
        Self
    }

    fn read_epoch(key: &Path) -> Option<i64> {
        let meta = sidecar_path(key);
        if !meta.exists() {
            return None;
        }
        match fs::read_to_string(&meta)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str::<Sidecar>(&text).map_err(|e| e.to_string()))
        {
            Ok(sidecar) => Some(sidecar.epoch),
            Err(e) => {
                debug!("Ignoring unreadable cache sidecar {}: {}", meta.display(), e);
                None
            }
        }
    }
}

impl CacheStore for FileCacheStore {
    fn read(&self, key: &Path) -> Option<CachedImage> {
        if !key.exists() {
            debug!("No cache entry at {}", key.display());
            return None;
        }

        let image = match image::open(key) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                warn!("Cache entry {} is unreadable, treating as miss: {}", key.display(), e);
                return None;
            }
        };

        Some(CachedImage {
            image,
            epoch: Self::read_epoch(key),
        })
    }

    fn write(&self, key: &Path, image: &RgbaImage, epoch: Option<i64>) -> Result<()> {
        if let Some(parent) = key.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write beside the target and rename so readers never see a partial PNG
        let tmp = key.with_extension("png.partial");
        image.save_with_format(&tmp, ImageFormat::Png)?;
        fs::rename(&tmp, key)?;

        let meta = sidecar_path(key);
        match epoch {
            Some(epoch) => fs::write(&meta, serde_json::to_string(&Sidecar { epoch })?)?,
            None => {
                if meta.exists() {
                    fs::remove_file(&meta)?;
                }
            }
        }

        debug!("Cached {}x{} image at {}", image.width(), image.height(), key.display());
        Ok(())
    }
}

/// In-memory cache for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RefCell<HashMap<PathBuf, CachedImage>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl CacheStore for MemoryCacheStore {
    fn read(&self, key: &Path) -> Option<CachedImage> {
        self.entries.borrow().get(key).cloned()
    }

    fn write(&self, key: &Path, image: &RgbaImage, epoch: Option<i64>) -> Result<()> {
        self.entries.borrow_mut().insert(
            key.to_path_buf(),
            CachedImage {
                image: image.clone(),
                epoch,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample() -> RgbaImage {
        RgbaImage::from_fn(4, 3, |x, y| Rgba([x as u8 * 10, y as u8 * 20, 200, 128]))
    }

    #[test]
    fn test_file_store_round_trip_with_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("nested").join("radar.png");
        let store = FileCacheStore::new();

        store.write(&key, &sample(), Some(1_700_000_000)).unwrap();

        let cached = store.read(&key).unwrap();
        assert_eq!(cached.image, sample());
        assert_eq!(cached.epoch, Some(1_700_000_000));
        assert!(sidecar_path(&key).exists());
        assert!(!key.with_extension("png.partial").exists());
    }

    #[test]
    fn test_file_store_missing_entry() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileCacheStore::new().read(&dir.path().join("nope.png")).is_none());
    }

    #[test]
    fn test_file_store_corrupt_entry_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("basemap.png");
        fs::write(&key, b"\x89PNG\r\n\x1a\ntruncated").unwrap();

        assert!(FileCacheStore::new().read(&key).is_none());
    }

    #[test]
    fn test_file_store_bad_sidecar_drops_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("radar.png");
        let store = FileCacheStore::new();
        store.write(&key, &sample(), Some(42)).unwrap();
        fs::write(sidecar_path(&key), "{not json").unwrap();

        let cached = store.read(&key).unwrap();
        assert_eq!(cached.epoch, None);
    }

    #[test]
    fn test_file_store_write_without_epoch_clears_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("radar.png");
        let store = FileCacheStore::new();
        store.write(&key, &sample(), Some(42)).unwrap();
        store.write(&key, &sample(), None).unwrap();

        assert!(!sidecar_path(&key).exists());
        assert_eq!(store.read(&key).unwrap().epoch, None);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCacheStore::new();
        let key = Path::new("radar.png");
        assert!(store.read(key).is_none());

        store.write(key, &sample(), Some(7)).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.read(key).unwrap().epoch, Some(7));
    }
}
