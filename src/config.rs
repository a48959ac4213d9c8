//! Converter settings, loadable from a YAML file.
//!
//! ```yaml
//! title-marker: "Rush:"
//! copyright-marker: Transcribed
//! suffix: tab
//! ```
//!
//! Every key is optional; missing keys keep their default.

use crate::error::BtabError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// A header line containing this marker becomes the title
    pub title_marker: String,
    /// A header line containing this marker becomes the copyright
    pub copyright_marker: String,
    /// Stripped from the copyright line
    pub copyright_prefix: String,
    /// A header line equal to this promotes the previous line to title
    pub title_trailer: String,
    /// Prepended to the copyright stored in the document
    pub copyright_label: String,
    /// Extension of tab files, with or without the leading dot
    pub suffix: String,
    pub log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title_marker: "Rush:".to_string(),
            copyright_marker: "Transcribed".to_string(),
            copyright_prefix: "Transcribed by".to_string(),
            title_trailer: "By Rush".to_string(),
            copyright_label: "Translation copyright: ".to_string(),
            suffix: "btab".to_string(),
            log_file: "app.log".to_string(),
        }
    }
}

impl Config {
    pub fn from_yaml(content: &str) -> Result<Self, BtabError> {
        // An empty document deserializes to unit, not to a map
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, BtabError> {
        let content = fs::read_to_string(path).map_err(|e| BtabError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Extension without its leading dot
    pub fn extension(&self) -> &str {
        self.suffix.trim_start_matches('.')
    }
}
