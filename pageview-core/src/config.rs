//! Host-supplied presentation settings.
//!
//! The engine only reads these values; it never mutates them. Every field has
//! a default so a partial JSON document is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_LOADING_MESSAGE: &str = "Loading...";
pub const DEFAULT_ERROR_MESSAGE: &str = "Unable to load resource";

/// Visual style of overlay buttons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ButtonStyle {
    pub alpha: f64,
    pub hover_alpha: f64,
    pub bg_style: String,
    pub border_style: String,
    pub border_width: f64,
    pub icon_style: String,
    pub icon_font_family: String,
}

impl Default for ButtonStyle {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            hover_alpha: 0.7,
            bg_style: "#037BFF".to_string(),
            border_style: "#000000".to_string(),
            border_width: 0.0,
            icon_style: "#ffffff".to_string(),
            icon_font_family: "Material Icons".to_string(),
        }
    }
}

impl ButtonStyle {
    /// Fill opacity for the given hover state, clamped to `[0, 1]`.
    #[must_use]
    pub fn fill_alpha(&self, hovered: bool) -> f64 {
        let alpha = if hovered { self.hover_alpha } else { self.alpha };
        if alpha.is_nan() {
            return 1.0;
        }
        alpha.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerConfig {
    /// Fill style painted behind the resource every frame.
    pub background_style: String,
    /// Placeholder text while nothing is loaded; falls back to
    /// [`DEFAULT_LOADING_MESSAGE`].
    pub loading_message: Option<String>,
    /// Placeholder text once a load has failed.
    pub error_message: Option<String>,
    pub button_style: ButtonStyle,
    /// Oversampling factor used when rasterizing document pages.
    pub page_oversampling: f32,
    /// Maximum number of rasterized pages kept in memory; `0` is unbounded.
    pub cache_capacity: usize,
    /// Relative zoom change applied by zoom in/out.
    pub zoom_step: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            background_style: "#ECEFF2".to_string(),
            loading_message: None,
            error_message: None,
            button_style: ButtonStyle::default(),
            page_oversampling: 2.0,
            cache_capacity: 32,
            zoom_step: 0.1,
        }
    }
}

impl ViewerConfig {
    /// Load a configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn loading_message(&self) -> &str {
        self.loading_message.as_deref().unwrap_or(DEFAULT_LOADING_MESSAGE)
    }

    #[must_use]
    pub fn error_message(&self) -> &str {
        self.error_message.as_deref().unwrap_or(DEFAULT_ERROR_MESSAGE)
    }
}
