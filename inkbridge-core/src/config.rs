//! Configuration for editor sessions and the round-trip converter

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{InkbridgeError, Result};

/// Image URL the ad sentinel expands to when no other URL is configured
pub const DEFAULT_AD_IMAGE_URL: &str = "https://images.ctfassets.net/srdmz6yont2x/3iXSFZjvoEjg7or343xHeH/e31d76e702ed5956fd21eeed97ddfa19/ad_placeholder.png?h=250";

/// HTML the write path substitutes for the widget's blank document
pub const DEFAULT_BLANK_PLACEHOLDER_HTML: &str = "<p><br>&nbsp;<br>&nbsp;<br></p>";

/// Main editor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Id of the entry field holding the Markdown body
    pub field_id: String,
    /// Locale code the body is read from and written to
    pub locale: String,
    /// Debounce quiet window in milliseconds
    pub quiet_window_ms: u64,
    /// Version slack used for the "recently published" flag
    pub publish_slack: u64,
    /// Whether each write checks the round trip and logs anomalies
    pub verify_round_trip: bool,
    /// Ad placeholder sentinel settings
    pub ad_placeholder: AdPlaceholderConfig,
    /// HTML converted instead of the widget's blank `<p><br></p>` state
    pub blank_placeholder_html: String,
    /// Extra URL schemes allowed in links, e.g. an internal `action` protocol
    pub allowed_protocols: Vec<String>,
    /// Undo history settings
    pub history: HistoryConfig,
}

impl EditorConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EditorConfig = serde_json::from_str(&content)?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.field_id.trim().is_empty() {
            return Err(InkbridgeError::config("field_id must not be empty"));
        }

        if self.locale.trim().is_empty() {
            return Err(InkbridgeError::config("locale must not be empty"));
        }

        if self.quiet_window_ms == 0 {
            return Err(InkbridgeError::config(
                "quiet_window_ms must be greater than zero",
            ));
        }

        if self.ad_placeholder.enabled && self.ad_placeholder.image_url.trim().is_empty() {
            return Err(InkbridgeError::config(
                "ad_placeholder.image_url is required when the placeholder is enabled",
            ));
        }

        for scheme in &self.allowed_protocols {
            let valid = scheme
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
            if !valid {
                return Err(InkbridgeError::config(format!(
                    "Invalid URL scheme in allowed_protocols: {:?}",
                    scheme
                )));
            }
        }

        if self.history.max_depth == 0 {
            return Err(InkbridgeError::config(
                "history.max_depth must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Debounce quiet window as a duration
    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.quiet_window_ms)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            field_id: "body".to_string(),
            locale: "en-US".to_string(),
            quiet_window_ms: 750,
            publish_slack: 2,
            verify_round_trip: true,
            ad_placeholder: AdPlaceholderConfig::default(),
            blank_placeholder_html: DEFAULT_BLANK_PLACEHOLDER_HTML.to_string(),
            allowed_protocols: Vec::new(),
            history: HistoryConfig::default(),
        }
    }
}

/// Ad placeholder sentinel settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdPlaceholderConfig {
    pub enabled: bool,
    /// Image shown in the editor where the ad will render
    pub image_url: String,
    pub alt: String,
}

impl Default for AdPlaceholderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            image_url: DEFAULT_AD_IMAGE_URL.to_string(),
            alt: "Ad Placeholder".to_string(),
        }
    }
}

/// Undo history settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of undo steps kept
    pub max_depth: usize,
    /// Changes closer together than this collapse into one undo step
    pub coalesce_window_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: 100,
            coalesce_window_ms: 1000,
        }
    }
}
