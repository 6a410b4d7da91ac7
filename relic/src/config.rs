//! Viewer configuration
//!
//! Every field has a default matching the stock page, so an empty JSON
//! object (or no configuration at all) yields the standard viewer.
//!
//! ```rust,ignore
//! let config = ViewerConfig::from_json(r#"{ "model_path": "romes_colosseum.glb" }"#)?;
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid viewer configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the 3D viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Model file, relative to the page (or working directory for native)
    pub model_path: String,
    /// Asset id used for the model in load commands and events
    pub asset_id: String,
    /// Number of points in the starfield
    pub star_count: usize,
    /// Fixed seed for the starfield; random when absent
    pub star_seed: Option<u64>,
    /// CSS selector of the element whose size drives the render surface
    pub container_selector: String,
    /// CSS selector of the render target canvas
    pub canvas_selector: String,
    /// Id of the loading indicator hidden once the model resolves
    pub loader_id: String,
    /// Scroll reveal settings for the same page
    pub reveal: RevealConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model_path: "model.glb".to_string(),
            asset_id: "subject".to_string(),
            star_count: 1000,
            star_seed: None,
            container_selector: ".model-container".to_string(),
            canvas_selector: "#model-canvas".to_string(),
            loader_id: "loader".to_string(),
            reveal: RevealConfig::default(),
        }
    }
}

impl ViewerConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// Configuration for the scroll reveal effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    /// CSS selector marking scroll sections
    pub selector: String,
    /// Fraction of a section that must be visible before it is revealed
    pub threshold: f64,
    /// Initial downward offset in CSS pixels
    pub offset_px: f32,
    /// CSS transition applied to sections
    pub transition: String,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            selector: ".scroll-section".to_string(),
            threshold: 0.2,
            offset_px: 50.0,
            transition: "all 0.8s ease-out".to_string(),
        }
    }
}

impl RevealConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Threshold clamped into the range the intersection observer accepts.
    pub fn clamped_threshold(&self) -> f64 {
        if self.threshold.is_nan() {
            return 0.0;
        }
        self.threshold.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = ViewerConfig::from_json("{}").unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.star_count, 1000);
    }

    #[test]
    fn test_partial_override() {
        let config =
            ViewerConfig::from_json(r#"{"model_path":"romes_colosseum.glb","star_seed":7}"#).unwrap();
        assert_eq!(config.model_path, "romes_colosseum.glb");
        assert_eq!(config.star_seed, Some(7));
        assert_eq!(config.canvas_selector, "#model-canvas");
    }

    #[test]
    fn test_reveal_settings_nested_in_viewer_config() {
        let config = ViewerConfig::from_json(r#"{"reveal":{"threshold":0.5}}"#).unwrap();
        assert_eq!(config.reveal.threshold, 0.5);
        assert_eq!(config.reveal.selector, ".scroll-section");
        assert_eq!(ViewerConfig::default().reveal, RevealConfig::default());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            ViewerConfig::from_json("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_reveal_threshold_clamped() {
        let config = RevealConfig { threshold: 1.7, ..Default::default() };
        assert_eq!(config.clamped_threshold(), 1.0);
        let config = RevealConfig { threshold: -0.5, ..Default::default() };
        assert_eq!(config.clamped_threshold(), 0.0);
        assert_eq!(RevealConfig::default().clamped_threshold(), 0.2);
    }
}
