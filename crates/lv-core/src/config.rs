//! Session configuration

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{CoreError, Result};
use crate::sync::ViewSyncSettings;

/// Tunables shared by every view in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Debounce window for brush previews, in milliseconds
    pub brush_preview_window_ms: u64,

    /// Reactive store key holding the active filter record
    pub filter_key: String,

    /// Reactive store key mirroring the hovered item (or null)
    pub hover_key: String,

    /// Sync settings for views that register without their own
    pub default_sync: ViewSyncSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            brush_preview_window_ms: 50,
            filter_key: "filters".to_string(),
            hover_key: "hovered".to_string(),
            default_sync: ViewSyncSettings::default(),
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: SessionConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading session config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing session config {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.brush_preview_window_ms == 0 {
            return Err(CoreError::Config(
                "brush_preview_window_ms must be greater than zero".to_string(),
            ));
        }
        if self.filter_key.is_empty() || self.hover_key.is_empty() {
            return Err(CoreError::Config("store keys must not be empty".to_string()));
        }
        if self.filter_key == self.hover_key {
            return Err(CoreError::Config(format!(
                "filter_key and hover_key must differ (both '{}')",
                self.filter_key
            )));
        }
        Ok(())
    }

    pub fn brush_preview_window(&self) -> Duration {
        Duration::from_millis(self.brush_preview_window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.brush_preview_window(), Duration::from_millis(50));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = SessionConfig::from_json(r#"{"brush_preview_window_ms": 120}"#).unwrap();
        assert_eq!(config.brush_preview_window_ms, 120);
        assert_eq!(config.filter_key, "filters");
        assert!(config.default_sync.sync_selection);
    }

    #[test]
    fn test_zero_window_rejected() {
        let result = SessionConfig::from_json(r#"{"brush_preview_window_ms": 0}"#);
        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[test]
    fn test_colliding_keys_rejected() {
        let result = SessionConfig::from_json(r#"{"filter_key": "x", "hover_key": "x"}"#);
        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let result = SessionConfig::from_json("{not json");
        assert!(matches!(result, Err(CoreError::ConfigParse(_))));
    }

    #[test]
    fn test_load_missing_file_has_context() {
        let err = SessionConfig::load("/nonexistent/linked-views.json").unwrap_err();
        assert!(err.to_string().contains("reading session config"));
    }
}
