use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use watcher_core::{SettingKey, SettingsError, SettingsStore};
use watcher_engine::AtomicFileWriter;
use watcher_logging::{watcher_debug, watcher_info, watcher_warn};

/// Settings kept in a RON map on disk, rewritten on every change.
pub struct RonSettingsStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl RonSettingsStore {
    /// Opens `path`. A missing or unreadable file starts empty, so every key
    /// falls back to its default.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = load_values(&path);
        Self { path, values }
    }

    fn save(&self) -> Result<(), SettingsError> {
        let content = ron::ser::to_string_pretty(&self.values, ron::ser::PrettyConfig::new())
            .map_err(|err| SettingsError::Unavailable(err.to_string()))?;

        let (dir, file_name) = split_path(&self.path)?;
        AtomicFileWriter::new(dir)
            .write(&file_name, content.as_bytes())
            .map_err(|err| SettingsError::Unavailable(err.to_string()))?;
        watcher_debug!("Saved settings to {:?}", self.path);
        Ok(())
    }
}

impl SettingsStore for RonSettingsStore {
    fn get(&self, key: SettingKey) -> Option<String> {
        self.values.get(key.as_str()).cloned()
    }

    fn set(&mut self, key: SettingKey, value: &str) -> Result<(), SettingsError> {
        self.values
            .insert(key.as_str().to_string(), value.to_string());
        self.save()
    }
}

fn load_values(path: &Path) -> BTreeMap<String, String> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(err) => {
            watcher_warn!("Failed to read settings from {:?}: {}", path, err);
            return BTreeMap::new();
        }
    };

    match ron::from_str(&content) {
        Ok(values) => {
            watcher_info!("Loaded settings from {:?}", path);
            values
        }
        Err(err) => {
            watcher_warn!("Failed to parse settings from {:?}: {}", path, err);
            BTreeMap::new()
        }
    }
}

fn split_path(path: &Path) -> Result<(PathBuf, String), SettingsError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| SettingsError::Unavailable(format!("bad settings path {:?}", path)))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, file_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use watcher_core::{DEFAULT_FOLDER, DEFAULT_PATTERN};

    #[test]
    fn values_survive_reopen() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("nested").join("settings.ron");

        let mut store = RonSettingsStore::open(&path);
        store.set(SettingKey::DestinationFolder, "Comics").unwrap();
        store
            .set(SettingKey::MatchPattern, r"/img\d+\.png/i")
            .unwrap();

        let reopened = RonSettingsStore::open(&path);
        assert_eq!(
            reopened.get(SettingKey::DestinationFolder).as_deref(),
            Some("Comics")
        );
        assert_eq!(
            reopened.get(SettingKey::MatchPattern).as_deref(),
            Some(r"/img\d+\.png/i")
        );
    }

    #[test]
    fn missing_file_yields_defaults() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = RonSettingsStore::open(temp.path().join("absent.ron"));
        assert_eq!(store.get(SettingKey::DestinationFolder), None);
        assert_eq!(
            store.get_or_default(SettingKey::DestinationFolder),
            DEFAULT_FOLDER
        );
        assert_eq!(store.get_or_default(SettingKey::MatchPattern), DEFAULT_PATTERN);
    }

    #[test]
    fn corrupt_file_is_ignored_and_replaced_on_write() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("settings.ron");
        fs::write(&path, "{ not ron").unwrap();

        let mut store = RonSettingsStore::open(&path);
        assert_eq!(store.get(SettingKey::MatchPattern), None);
        store.set(SettingKey::DestinationFolder, "Saved").unwrap();

        let reopened = RonSettingsStore::open(&path);
        assert_eq!(
            reopened.get(SettingKey::DestinationFolder).as_deref(),
            Some("Saved")
        );
    }

    #[test]
    fn bare_file_name_resolves_to_working_directory() {
        let (dir, name) = split_path(Path::new("settings.ron")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, "settings.ron");
    }
}
