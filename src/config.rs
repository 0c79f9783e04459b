//! Engine location configuration
//!
//! Where the IPhreeqc shared library and the thermodynamic database live.
//! Values come from JSON (the same way host bindings hand structured options
//! across) with environment overrides on top.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const ENV_LIBRARY: &str = "IPHREEQC_LIBRARY";
pub const ENV_DATABASE: &str = "PHREEQC_DATABASE";
pub const ENV_DATABASE_DIR: &str = "PHREEQC_DATABASE_DIR";

pub const DEFAULT_DATABASE: &str = "phreeqc.dat";

/// Platform file name of the IPhreeqc shared library
pub fn default_library_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "IPhreeqc.dll"
    } else if cfg!(target_os = "macos") {
        "libiphreeqc.dylib"
    } else {
        "libiphreeqc.so"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhreeqcConfig {
    /// Shared library path; `None` lets the system loader search for
    /// [`default_library_name`]
    pub library: Option<PathBuf>,
    /// Database file name, or a full path
    pub database: String,
    /// Directory `database` is resolved against
    pub database_directory: Option<PathBuf>,
}

impl Default for PhreeqcConfig {
    fn default() -> Self {
        Self {
            library: None,
            database: DEFAULT_DATABASE.to_string(),
            database_directory: None,
        }
    }
}

impl PhreeqcConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Defaults with process environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (keyed by the `ENV_*` names); empty
    /// values are ignored
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(lib) = get(ENV_LIBRARY) {
            self.library = Some(PathBuf::from(lib));
        }
        if let Some(db) = get(ENV_DATABASE) {
            self.database = db;
        }
        if let Some(dir) = get(ENV_DATABASE_DIR) {
            self.database_directory = Some(PathBuf::from(dir));
        }
        self
    }

    pub fn with_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.library = Some(path.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_database_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.database_directory = Some(dir.into());
        self
    }

    pub fn library_path(&self) -> PathBuf {
        self.library
            .clone()
            .unwrap_or_else(|| PathBuf::from(default_library_name()))
    }

    /// `database_directory/database`, or `database` alone when no directory
    /// is set or `database` is already absolute
    pub fn database_path(&self) -> PathBuf {
        let db = Path::new(&self.database);
        match &self.database_directory {
            Some(dir) if !db.is_absolute() => dir.join(db),
            _ => db.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PhreeqcConfig::default();
        assert_eq!(config.database, "phreeqc.dat");
        assert_eq!(config.database_path(), PathBuf::from("phreeqc.dat"));
        assert_eq!(config.library_path(), PathBuf::from(default_library_name()));
    }

    #[test]
    fn test_from_json_partial() {
        let config = PhreeqcConfig::from_json(r#"{"database_directory": "/opt/phreeqc/database"}"#).unwrap();
        assert_eq!(config.database, "phreeqc.dat");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/opt/phreeqc/database/phreeqc.dat")
        );
    }

    #[test]
    fn test_from_json_rejects_unknown() {
        assert!(PhreeqcConfig::from_json(r#"{"databse": "x"}"#).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = PhreeqcConfig::default().with_overrides(|key| match key {
            ENV_LIBRARY => Some("/usr/local/lib/libiphreeqc.so".to_string()),
            ENV_DATABASE => Some("wateq4f.dat".to_string()),
            ENV_DATABASE_DIR => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.library_path(), PathBuf::from("/usr/local/lib/libiphreeqc.so"));
        assert_eq!(config.database, "wateq4f.dat");
        assert_eq!(config.database_directory, None);
    }

    #[test]
    #[cfg(unix)]
    fn test_absolute_database_ignores_directory() {
        let config = PhreeqcConfig::default()
            .with_database("/data/llnl.dat")
            .with_database_directory("/elsewhere");
        assert_eq!(config.database_path(), PathBuf::from("/data/llnl.dat"));
    }

    #[test]
    fn test_json_round_trip() {
        let config = PhreeqcConfig::default().with_library("lib/libiphreeqc.so");
        let back = PhreeqcConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
