use std::collections::BTreeMap;

use thiserror::Error;

use crate::pattern::DEFAULT_PATTERN;

pub const DEFAULT_FOLDER: &str = "Resource_Downloads";

/// Keys understood by the settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingKey {
    DestinationFolder,
    MatchPattern,
}

impl SettingKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::DestinationFolder => "destination_folder",
            SettingKey::MatchPattern => "match_pattern",
        }
    }

    pub fn default_value(self) -> &'static str {
        match self {
            SettingKey::DestinationFolder => DEFAULT_FOLDER,
            SettingKey::MatchPattern => DEFAULT_PATTERN,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key/value port the host provides for user settings.
pub trait SettingsStore {
    fn get(&self, key: SettingKey) -> Option<String>;
    fn set(&mut self, key: SettingKey, value: &str) -> Result<(), SettingsError>;

    fn get_or_default(&self, key: SettingKey) -> String {
        self.get(key)
            .unwrap_or_else(|| key.default_value().to_string())
    }
}

/// In-process store; nothing survives the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySettings {
    values: BTreeMap<SettingKey, String>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: SettingKey) -> Option<String> {
        self.values.get(&key).cloned()
    }

    fn set(&mut self, key: SettingKey, value: &str) -> Result<(), SettingsError> {
        self.values.insert(key, value.to_string());
        Ok(())
    }
}

/// Strips path separators and surrounding whitespace from a folder name.
/// `None` means nothing usable was left.
pub fn sanitize_folder(input: &str) -> Option<String> {
    let cleaned: String = input.chars().filter(|c| !matches!(c, '/' | '\\')).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_keys_use_defaults() {
        let store = MemorySettings::new();
        assert_eq!(
            store.get_or_default(SettingKey::DestinationFolder),
            DEFAULT_FOLDER
        );
        assert_eq!(store.get_or_default(SettingKey::MatchPattern), DEFAULT_PATTERN);
    }

    #[test]
    fn folder_sanitizing_drops_separators() {
        assert_eq!(sanitize_folder(" my/im\\ages "), Some("myimages".to_string()));
        assert_eq!(sanitize_folder("//\\ "), None);
        assert_eq!(sanitize_folder(""), None);
    }
}
