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

use std::path::Path;
use std::process::Command;

use log::info;

use crate::config::UploadConfig;
use crate::error::{Result, StationError};

/// Hand `local` to the upload script.
///
/// Credentials travel in `REMOTE_USER`, `REMOTE_HOST` and `PASSWORD`; the
/// arguments are `remote_path remote_file local_path`.
pub fn upload(config: &UploadConfig, local: &Path) -> Result<()> {
    let output = Command::new(&config.script)
        .arg(&config.remote_path)
        .arg(&config.remote_file)
        .arg(local)
        .env("REMOTE_USER", &config.remote_user)
        .env("REMOTE_HOST", &config.remote_host)
        .env("PASSWORD", &config.password)
        .output()?;

    if !output.status.success() {
        return Err(StationError::Script {
            script: config.script.clone(),
            message: format!(
                "exit status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    info!(
        "Uploaded {} -> {}{}",
        local.display(),
        config.remote_path,
        config.remote_file
    );
    Ok(())
}
