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

use std::path::PathBuf;

use radar_panel::PanelError;
use thiserror::Error;

/// Failures of a station command.
#[derive(Debug, Error)]
pub enum StationError {
    #[error(transparent)]
    Panel(#[from] PanelError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("could not load configuration: {0}")]
    Confy(#[from] confy::ConfyError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid mail address: {0}")]
    MailAddress(#[from] lettre::address::AddressError),

    #[error("could not build mail: {0}")]
    MailMessage(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("{} failed: {message}", script.display())]
    Script { script: PathBuf, message: String },

    #[error("script reported missing image {}", .0.display())]
    MissingCapture(PathBuf),
}

pub type Result<T, E = StationError> = std::result::Result<T, E>;
