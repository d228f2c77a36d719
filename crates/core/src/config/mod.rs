use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::artwork::ModuleOptions;
use crate::gallery::ArtworkKind;
use crate::{ExhibitError, Result};

/// Top-level configuration structure for an exhibition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExhibitConfig {
    #[serde(default = "default_container_id")]
    pub container_id: String,
    pub markers: Vec<MarkerConfig>,
}

/// One physical marker and the artwork it triggers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerConfig {
    pub marker_id: String,
    pub artwork: ArtworkKind,
    #[serde(default)]
    pub options: ModuleOptions,
}

fn default_container_id() -> String {
    "visualization-container".to_string()
}

impl Default for ExhibitConfig {
    fn default() -> Self {
        Self {
            container_id: default_container_id(),
            markers: vec![
                MarkerConfig::new(
                    "thermal",
                    ArtworkKind::Animated,
                    json!({ "duration_seconds": 3.0 }),
                ),
                MarkerConfig::new(
                    "soundscape",
                    ArtworkKind::Audio,
                    json!({ "audio_kind": "context" }),
                ),
                MarkerConfig::new(
                    "sculpture",
                    ArtworkKind::DataOverlay,
                    json!({
                        "datasets": ["temperature", "co2", "sea-level"],
                        "cycle_seconds": 4.0,
                    }),
                ),
            ],
        }
    }
}

impl MarkerConfig {
    pub fn new(
        marker_id: impl Into<String>,
        artwork: ArtworkKind,
        options: serde_json::Value,
    ) -> Self {
        Self {
            marker_id: marker_id.into(),
            artwork,
            options: options.as_object().cloned().unwrap_or_default(),
        }
    }
}

impl ExhibitConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Rejects duplicate marker ids. Blank ids are left for the registry to
    /// drop so one bad entry does not take the whole exhibition down.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for marker in &self.markers {
            if !marker.marker_id.trim().is_empty() && !seen.insert(marker.marker_id.as_str()) {
                return Err(ExhibitError::config(format!(
                    "marker `{}` is configured twice",
                    marker.marker_id
                )));
            }
        }
        Ok(())
    }
}
