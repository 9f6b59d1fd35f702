//! Application configuration.
//!
//! Values are layered: built-in defaults, then `config.toml` in the user's
//! config directory, then `RAILWAY_*` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{save::SaveManager, train::ClassSpec};

/// Directory under `~/.config` holding the config file.
pub const CONFIG_DIR: &str = "railway";
/// Config file name.
pub const CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "RAILWAY";

const DEFAULT_CONFIG: &str = r#"# Railway reservation settings.

# Password for the admin screens (all bookings, add train, configure seats).
admin_password = "admin123"

# Save reservations automatically when leaving the application.
autosave = true

# Where reservations.json is kept. Defaults to the platform data directory.
# data_dir = "/path/to/data"

# Class set accepted for bookings, with the seat count new trains start with.
[[classes]]
name = "AC"
seats = 20

[[classes]]
name = "Sleeper"
seats = 50
"#;

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the reservations snapshot.
    pub data_dir: PathBuf,
    /// Password guarding admin screens.
    pub admin_password: String,
    /// Save on exit.
    pub autosave: bool,
    /// Bookable classes and their default seat counts.
    pub classes: Vec<ClassSpec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: SaveManager::default_root(),
            admin_password: "admin123".to_string(),
            autosave: true,
            classes: ClassSpec::defaults(),
        }
    }
}

impl AppConfig {
    /// Load from the default config path and environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from a specific file (which may be missing) and environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        let config: AppConfig = settings
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.classes.is_empty() {
            bail!("at least one seat class must be configured");
        }
        for (index, spec) in self.classes.iter().enumerate() {
            if spec.name.trim().is_empty() {
                bail!("seat class #{} has an empty name", index + 1);
            }
            if spec.seats == 0 {
                bail!("seat class '{}' must have at least one seat", spec.name);
            }
            if self.classes[..index]
                .iter()
                .any(|other| other.name.eq_ignore_ascii_case(&spec.name))
            {
                bail!("seat class '{}' is configured twice", spec.name);
            }
        }
        Ok(())
    }

    /// Snapshot store rooted at [`AppConfig::data_dir`].
    pub fn save_manager(&self) -> SaveManager {
        SaveManager::new(&self.data_dir)
    }

    /// Whether `input` matches the admin password.
    pub fn verify_admin(&self, input: &str) -> bool {
        input.trim() == self.admin_password
    }
}

/// Default location of the config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join(CONFIG_FILE)
}

/// Write the default config file if none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write default config {}", path.display()))?;
    info!(path = %path.display(), "Wrote default configuration");
    Ok(())
}
