// Runtime settings: where downloads land and whether metadata sidecars are
// written. Persisted as JSON in the user's config directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{Error, Result};
use crate::transfer::TransferOptions;

const APP_DIR: &str = "onedrive-cli";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Default local destination; prompted for when absent.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default = "Settings::default_store_metadata")]
    pub store_metadata: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            output_dir: None,
            store_metadata: Self::default_store_metadata(),
        }
    }
}

impl Settings {
    fn default_store_metadata() -> bool {
        true
    }

    /// `<config dir>/onedrive-cli/settings.json`, or `./settings.json`
    /// when the platform has no config directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(SETTINGS_FILE)
    }

    /// Load settings; a missing file gives defaults, a broken one is
    /// reported and also gives defaults.
    pub fn load(path: &Path) -> Settings {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Settings::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read settings, using defaults");
                return Settings::default();
            }
        };
        match serde_json::from_str(&text) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid settings file, using defaults");
                Settings::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Error::local_io(parent, e))?;
            }
        }
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Malformed(format!("cannot serialise settings: {e}")))?;
        fs::write(path, text).map_err(|e| Error::local_io(path, e))
    }

    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions {
            store_metadata: self.store_metadata,
        }
    }
}
