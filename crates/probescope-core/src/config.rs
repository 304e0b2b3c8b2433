//! Process-scoped configuration loaded from JSON files.
//!
//! Everything lives under one root directory (default `$HOME/.probescope`):
//!
//! ```text
//! preferences.json
//! movement_keybinds.json
//! static_keybinds.json
//! custom_user_mesh_transformations.json
//! experiments/  exports/  custom_user_meshes/  meshes/
//! ```
//!
//! A missing file is created with defaults on first load. [`Config`] is passed
//! around explicitly; [`Config::reload`] re-reads every file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::keybinds::{MovementKeybinds, StaticKeybinds};
use crate::options::{default_root, MeshTransformRegistry, Preferences, ProbeGeometryTable};

/// Locations of the configuration files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub root: PathBuf,
}

impl ConfigPaths {
    /// Paths under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn preferences(&self) -> PathBuf {
        self.root.join("preferences.json")
    }

    #[must_use]
    pub fn movement_keybinds(&self) -> PathBuf {
        self.root.join("movement_keybinds.json")
    }

    #[must_use]
    pub fn static_keybinds(&self) -> PathBuf {
        self.root.join("static_keybinds.json")
    }

    #[must_use]
    pub fn mesh_transforms(&self) -> PathBuf {
        self.root.join("custom_user_mesh_transformations.json")
    }
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::new(default_root())
    }
}

/// Reads `path` as JSON, or writes `T::default()` there and returns it.
pub fn load_or_create<T>(path: &Path) -> Result<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    if path.exists() {
        let text = fs::read_to_string(path)?;
        let value = serde_json::from_str(&text)?;
        log::debug!("loaded {}", path.display());
        return Ok(value);
    }
    let value = T::default();
    write_json(path, &value)?;
    log::info!("created default {}", path.display());
    Ok(value)
}

/// Writes `value` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// All user configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub paths: ConfigPaths,
    pub preferences: Preferences,
    pub movement_keybinds: MovementKeybinds,
    pub static_keybinds: StaticKeybinds,
    pub mesh_transforms: MeshTransformRegistry,
    /// Builtin shank layouts. Not user-editable.
    pub probe_geometries: ProbeGeometryTable,
}

impl Config {
    /// Loads every file under `paths.root`, creating missing ones.
    pub fn load(paths: ConfigPaths) -> Result<Self> {
        let prefs_path = paths.preferences();
        let preferences = if prefs_path.exists() {
            load_or_create(&prefs_path)?
        } else {
            let prefs = Preferences::with_root(&paths.root);
            write_json(&prefs_path, &prefs)?;
            log::info!("created default {}", prefs_path.display());
            prefs
        };
        let movement_keybinds: MovementKeybinds = load_or_create(&paths.movement_keybinds())?;
        movement_keybinds.validate()?;
        let config = Self {
            static_keybinds: load_or_create(&paths.static_keybinds())?,
            mesh_transforms: load_or_create(&paths.mesh_transforms())?,
            probe_geometries: ProbeGeometryTable::default(),
            movement_keybinds,
            preferences,
            paths,
        };
        config.ensure_dirs()?;
        log::info!("configuration loaded from {}", config.paths.root.display());
        Ok(config)
    }

    /// Defaults rooted at `root`, without touching the filesystem.
    #[must_use]
    pub fn defaults(root: &Path) -> Self {
        Self {
            paths: ConfigPaths::new(root),
            preferences: Preferences::with_root(root),
            movement_keybinds: MovementKeybinds::default(),
            static_keybinds: StaticKeybinds::default(),
            mesh_transforms: MeshTransformRegistry::default(),
            probe_geometries: ProbeGeometryTable::default(),
        }
    }

    /// Re-reads every file. On error the current values are kept.
    pub fn reload(&mut self) -> Result<()> {
        *self = Self::load(self.paths.clone())?;
        Ok(())
    }

    /// Creates the data directories named in the preferences.
    pub fn ensure_dirs(&self) -> Result<()> {
        let p = &self.preferences;
        for dir in [&p.default_save_dir, &p.export_dir, &p.user_mesh_dir] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
