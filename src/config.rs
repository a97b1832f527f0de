//! Settings file, `<config dir>/snipkeep/config.toml`.
//!
//! ```toml
//! data_dir = "/home/me/.local/share/snipkeep"
//! snapshots = true
//! snapshot_keep = 5
//! backup_keep = 10
//! log_level = "info"
//! ```
//!
//! Every key is optional. A missing file means defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::backup;
use crate::error::{Error, Result};
use crate::manager::ManagerOptions;
use crate::snapshot;
use crate::store::DB_FILE_NAME;

pub const APP_NAME: &str = "snipkeep";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `snippets.db` and `backups/`.
    pub data_dir: PathBuf,
    /// Take before/after snapshots around every change.
    pub snapshots: bool,
    pub snapshot_keep: usize,
    pub backup_keep: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: default_data_dir(),
            snapshots: true,
            snapshot_keep: snapshot::DEFAULT_KEEP,
            backup_keep: 10,
            log_level: "info".to_string(),
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Platform data directory, or `./snipkeep-data` when there is no home.
pub fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("snipkeep-data"))
}

pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

impl Config {
    /// Reads `path`, or the default location when `None`. A missing default
    /// file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match default_config_path() {
                Some(path) => (path, false),
                None => return Ok(Config::default()),
            },
        };

        if !path.is_file() {
            if explicit {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::Config("data_dir must not be empty".to_string()));
        }
        if self.snapshot_keep == 0 {
            return Err(Error::Config("snapshot_keep must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn with_data_dir(mut self, data_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = data_dir {
            self.data_dir = dir;
        }
        self
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn backups_dir(&self) -> PathBuf {
        backup::default_dir(&self.db_path())
    }

    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            snapshots: self.snapshots,
            snapshot_keep: self.snapshot_keep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.snapshot_keep, 5);
        assert!(config.snapshots);
    }

    #[test]
    fn partial_file_overrides_some_keys() {
        let config = Config::parse("data_dir = \"/tmp/snips\"\nsnapshots = false\n").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/snips"));
        assert!(!config.snapshots);
        assert_eq!(config.backup_keep, 10);
        assert_eq!(config.db_path(), PathBuf::from("/tmp/snips/snippets.db"));
        assert_eq!(config.backups_dir(), PathBuf::from("/tmp/snips/backups"));
    }

    #[test]
    fn bad_values_are_config_errors() {
        assert!(matches!(Config::parse("snapshot_keep = 0"), Err(Error::Config(_))));
        assert!(matches!(Config::parse("snapshot_keep = \"x\""), Err(Error::Config(_))));
    }

    #[test]
    fn explicit_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn load_reads_file_and_cli_dir_wins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "data_dir = \"/from/file\"\nsnapshot_keep = 2\n").unwrap();

        let config = Config::load(Some(&path))
            .unwrap()
            .with_data_dir(Some(dir.path().to_path_buf()));
        assert_eq!(config.data_dir, dir.path());
        assert_eq!(config.manager_options().snapshot_keep, 2);
    }
}
