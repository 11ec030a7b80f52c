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

//! Webcam capture and archiving of captured images.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};

use crate::error::{Result, StationError};

/// Exit status a capture script uses to signal "nothing to capture" (night)
pub const SKIP_EXIT_CODE: i32 = 3;

/// Run the capture script and return the image it produced.
///
/// `Ok(None)` means the script chose not to capture: it exited with
/// [`SKIP_EXIT_CODE`] or printed nothing.
pub fn capture(script: &Path) -> Result<Option<PathBuf>> {
    debug!("Running capture script {}", script.display());
    let output = Command::new(script).output()?;

    if output.status.code() == Some(SKIP_EXIT_CODE) {
        info!("Capture script asked to skip this cycle");
        return Ok(None);
    }
    if !output.status.success() {
        return Err(StationError::Script {
            script: script.to_path_buf(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let printed = stdout.trim();
    if printed.is_empty() {
        info!("Capture script produced no image");
        return Ok(None);
    }

    let image = PathBuf::from(printed);
    if !image.exists() {
        return Err(StationError::MissingCapture(image));
    }
    Ok(Some(fs::canonicalize(image)?))
}

/// Move `image` into `old_dir`, then copy it to `background`.
///
/// Returns the archived path. The background copy is what the radar panel
/// gets embedded into; the archived original stays untouched.
pub fn archive_capture(image: &Path, old_dir: &Path, background: &Path) -> Result<PathBuf> {
    let name = image
        .file_name()
        .ok_or_else(|| StationError::MissingCapture(image.to_path_buf()))?;

    fs::create_dir_all(old_dir)?;
    let archived = old_dir.join(name);
    if fs::rename(image, &archived).is_err() {
        // Different filesystem
        fs::copy(image, &archived)?;
        fs::remove_file(image)?;
    }
    info!("Archived capture to {}", archived.display());

    if let Some(parent) = background.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(&archived, background)?;
    debug!("Copied capture to background {}", background.display());

    Ok(archived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn script(dir: &TempDir, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("capture.sh");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_skip_exit_code() {
        let dir = TempDir::new().unwrap();
        let script = script(&dir, "exit 3");
        assert_eq!(capture(&script).unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_empty_output_is_skip() {
        let dir = TempDir::new().unwrap();
        let script = script(&dir, "exit 0");
        assert_eq!(capture(&script).unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_carries_stderr() {
        let dir = TempDir::new().unwrap();
        let script = script(&dir, "echo 'no camera' >&2\nexit 1");
        match capture(&script) {
            Err(StationError::Script { message, .. }) => assert_eq!(message, "no camera"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_printed_path_is_returned() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("20250101_120000.jpg");
        fs::write(&image, b"jpeg").unwrap();
        let script = script(&dir, &format!("echo '{}'", image.display()));

        let captured = capture(&script).unwrap().unwrap();
        assert_eq!(captured, fs::canonicalize(&image).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_image_is_an_error() {
        let dir = TempDir::new().unwrap();
        let script = script(&dir, "echo /nonexistent/image.jpg");
        assert!(matches!(capture(&script), Err(StationError::MissingCapture(_))));
    }

    #[test]
    fn test_archive_moves_and_copies() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("20250101_120000.jpg");
        fs::write(&image, b"jpeg bytes").unwrap();
        let old_dir = dir.path().join("jpg/old");
        let background = dir.path().join("jpg/current/IMG_4903.jpg");

        let archived = archive_capture(&image, &old_dir, &background).unwrap();
        assert_eq!(archived, old_dir.join("20250101_120000.jpg"));
        assert!(!image.exists());
        assert_eq!(fs::read(&archived).unwrap(), b"jpeg bytes");
        assert_eq!(fs::read(&background).unwrap(), b"jpeg bytes");
    }
}
