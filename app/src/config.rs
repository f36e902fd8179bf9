//! JSON configuration store.
//!
//! User values are merged over the defaults, so a config file written by an
//! older version still gets every key.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use directories::{ProjectDirs, UserDirs};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use regionrec_ipc::{CaptureRegion, OutputFormat, RecordingSettings, MIN_REGION_SIZE};

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Platform config location, or `config.json` in the working directory.
pub fn default_config_path() -> PathBuf {
    ProjectDirs::from("", "", "regionrec")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// The user's desktop, falling back to the working directory.
fn default_output_dir() -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| dirs.desktop_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn defaults() -> Value {
    json!({
        "output_dir": default_output_dir(),
        "fps": 30,
        "output_format": "mp4",
        "region": null,
        "ui": {
            "theme": "light",
            "window_geometry": null,
            "window_visible": true
        },
        "hotkeys": {
            "toggle_recording": "ctrl+alt+r",
            "toggle_window": "ctrl+alt+s"
        }
    })
}

/// Merge `overlay` into `base`. Objects merge per key, anything else replaces.
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

pub struct ConfigStore {
    path: PathBuf,
    values: Value,
}

impl ConfigStore {
    /// Load the store at `path`. A missing, unreadable or malformed file
    /// yields the defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut values = defaults();

        match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(user) => {
                    merge(&mut values, user);
                    debug!(path = %path.display(), "Loaded config");
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Malformed config, using defaults"),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Unreadable config, using defaults"),
        }

        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn values(&self) -> &Value {
        &self.values
    }

    /// Look up a dotted key such as `hotkeys.toggle_recording`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        key.split('.')
            .try_fold(&self.values, |node, part| node.get(part))
    }

    /// Typed lookup; `None` if the key is missing or has the wrong shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Set a dotted key, creating intermediate objects as needed.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        if key.is_empty() {
            bail!("config key must not be empty");
        }

        let mut node = &mut self.values;
        let mut parts = key.split('.').peekable();
        while let Some(part) = parts.next() {
            let map = node
                .as_object_mut()
                .ok_or_else(|| anyhow!("cannot set {key}: parent of `{part}` is not an object"))?;
            if parts.peek().is_none() {
                map.insert(part.to_string(), value);
                return Ok(());
            }
            node = map
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        Ok(())
    }

    /// Remember the region and write the file.
    pub fn update_region(&mut self, region: CaptureRegion) -> Result<()> {
        self.set("region", serde_json::to_value(region)?)?;
        self.save()
    }

    /// Write the store as pretty JSON.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, text).with_context(|| format!("writing {}", self.path.display()))?;
        info!(path = %self.path.display(), "Config saved");
        Ok(())
    }

    /// Recording settings from `region`, `fps`, `output_format` and `output_dir`.
    pub fn settings(&self) -> Result<RecordingSettings> {
        let region = self
            .get_as::<CaptureRegion>("region")
            .ok_or_else(|| anyhow!("no capture region configured"))?;
        if !region.meets_minimum() {
            bail!("configured region {region} is smaller than {MIN_REGION_SIZE}x{MIN_REGION_SIZE}");
        }
        let fps = self
            .get_as::<u32>("fps")
            .ok_or_else(|| anyhow!("config value `fps` must be a positive integer"))?;
        let format = self
            .get_as::<String>("output_format")
            .ok_or_else(|| anyhow!("config value `output_format` must be a string"))?
            .parse::<OutputFormat>()?;
        let output_dir = self
            .get_as::<PathBuf>("output_dir")
            .unwrap_or_else(default_output_dir);

        Ok(RecordingSettings::new(region, output_dir)
            .with_fps(fps)
            .with_format(format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(text: &str) -> (tempfile::TempDir, ConfigStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, text).unwrap();
        let store = ConfigStore::load(&path);
        (dir, store)
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(dir.path().join("absent.json"));
        assert_eq!(store.get_as::<u32>("fps"), Some(30));
        assert_eq!(store.get_as::<String>("output_format").as_deref(), Some("mp4"));
        assert_eq!(
            store.get_as::<String>("hotkeys.toggle_recording").as_deref(),
            Some("ctrl+alt+r")
        );
        assert!(store.get("region").unwrap().is_null());
    }

    #[test]
    fn test_user_values_merge_over_defaults() {
        let (_dir, store) = store_with(r#"{"fps": 15, "hotkeys": {"toggle_window": "f9"}}"#);
        assert_eq!(store.get_as::<u32>("fps"), Some(15));
        assert_eq!(store.get_as::<String>("hotkeys.toggle_window").as_deref(), Some("f9"));
        // Sibling defaults inside a merged object survive.
        assert_eq!(
            store.get_as::<String>("hotkeys.toggle_recording").as_deref(),
            Some("ctrl+alt+r")
        );
        assert_eq!(store.get_as::<String>("ui.theme").as_deref(), Some("light"));
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let (_dir, store) = store_with("{not json");
        assert_eq!(store.get_as::<u32>("fps"), Some(30));
    }

    #[test]
    fn test_dotted_set_creates_objects() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConfigStore::load(dir.path().join(CONFIG_FILE_NAME));
        store.set("ui.window_visible", json!(false)).unwrap();
        store.set("extra.nested.value", json!(3)).unwrap();
        assert_eq!(store.get("ui.window_visible"), Some(&json!(false)));
        assert_eq!(store.get_as::<u32>("extra.nested.value"), Some(3));
        assert!(store.get("ui.missing").is_none());

        // `fps` is a number, so it cannot hold children.
        assert!(store.set("fps.inner", json!(1)).is_err());
        assert!(store.set("", json!(1)).is_err());
    }

    #[test]
    fn test_update_region_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut store = ConfigStore::load(&path);
        store
            .update_region(CaptureRegion::new(5, 6, 320, 240).unwrap())
            .unwrap();

        let reloaded = ConfigStore::load(&path);
        assert_eq!(reloaded.get("region"), Some(&json!([5, 6, 320, 240])));
    }

    #[test]
    fn test_settings_require_region() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(dir.path().join(CONFIG_FILE_NAME));
        assert!(store.settings().is_err());
    }

    #[test]
    fn test_settings_from_config() {
        let (dir, store) = store_with(
            r#"{"region": [0, 0, 640, 480], "fps": 24, "output_format": "gif", "output_dir": "out"}"#,
        );
        let settings = store.settings().unwrap();
        assert_eq!(settings.region, CaptureRegion::new(0, 0, 640, 480).unwrap());
        assert_eq!(settings.fps, 24);
        assert_eq!(settings.output_format, OutputFormat::Gif);
        assert_eq!(settings.output_dir, PathBuf::from("out"));
        drop(dir);
    }

    #[test]
    fn test_settings_reject_tiny_region() {
        let (_dir, store) = store_with(r#"{"region": [0, 0, 4, 4]}"#);
        assert!(store.settings().is_err());
    }

    #[test]
    fn test_settings_reject_unknown_format() {
        let (_dir, store) = store_with(r#"{"region": [0, 0, 64, 48], "output_format": "avi"}"#);
        assert!(store.settings().is_err());
    }
}
