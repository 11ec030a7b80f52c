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

//! Error types for the radar panel pipeline.

use thiserror::Error;

use crate::fetch::FetchError;

/// Errors that can abort a pipeline stage.
///
/// Recoverable conditions (corrupt cache files, radar outages, failed
/// best-effort writes) are absorbed inside the stages and never show up
/// here.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("network error: {0}")]
    Network(#[from] FetchError),

    #[error("radar provider returned no frames")]
    NoDataAvailable,

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl PanelError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

pub type Result<T, E = PanelError> = std::result::Result<T, E>;
