//! Current weather conditions.
//!
//! This module fetches current conditions from OpenWeatherMap and wraps
//! them, together with their classification and storm warning, in the
//! record persisted for each capture.

pub mod openweathermap;

pub use openweathermap::OpenWeatherMapClient;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classify::ClassificationDetail;
use crate::storm::StormReport;

/// Everything known about the weather at capture time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    /// Capture timestamp, also the record's file stem
    pub timestamp: String,

    /// Raw provider response, or `{"error": "..."}`
    pub openweathermap: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_detail: Option<ClassificationDetail>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stormwarning: Option<StormReport>,
}

impl WeatherRecord {
    pub fn new(timestamp: impl Into<String>, openweathermap: Value) -> Self {
        Self {
            timestamp: timestamp.into(),
            openweathermap,
            classification: None,
            classification_detail: None,
            stormwarning: None,
        }
    }

    /// Whether the provider call failed
    pub fn is_error(&self) -> bool {
        self.openweathermap.get("error").is_some()
    }
}
