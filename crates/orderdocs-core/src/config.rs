//! Configuration loading for orderdocs.

use crate::convert::{CommandConverter, Converter, PassthroughConverter};
use crate::error::{Error, Result};
use crate::ingest::{UploadLimits, DEFAULT_MAX_UPLOAD_BYTES};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DATABASE_ENV: &str = "ORDERDOCS_DATABASE";
pub const BLOB_ROOT_ENV: &str = "ORDERDOCS_BLOB_ROOT";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    pub storage: Option<StorageConfig>,
    pub upload: Option<UploadConfig>,
    pub conversion: Option<ConversionConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct StorageConfig {
    pub database: Option<PathBuf>,
    pub blob_root: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct UploadConfig {
    pub max_bytes: Option<u64>,
    pub allow_duplicate: Option<bool>,
    pub allowed_extensions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConversionConfig {
    /// argv of a program reading the source on stdin and writing PDF to stdout
    pub command: Option<Vec<String>>,
}

/// Concrete storage locations after applying overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub database: PathBuf,
    pub blob_root: PathBuf,
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "orderdocs")
        .ok_or_else(|| Error::Config("could not determine data directory".to_string()))
}

impl Config {
    /// Resolve storage paths: explicit value, then environment, then config, then default
    pub fn storage_paths(
        &self,
        database: Option<PathBuf>,
        blob_root: Option<PathBuf>,
    ) -> Result<StoragePaths> {
        self.storage_paths_with_env(database, blob_root, |key| std::env::var_os(key).map(PathBuf::from))
    }

    fn storage_paths_with_env(
        &self,
        database: Option<PathBuf>,
        blob_root: Option<PathBuf>,
        env: impl Fn(&str) -> Option<PathBuf>,
    ) -> Result<StoragePaths> {
        let storage = self.storage.as_ref();
        let database = database
            .or_else(|| env(DATABASE_ENV))
            .or_else(|| storage.and_then(|s| s.database.clone()));
        let blob_root = blob_root
            .or_else(|| env(BLOB_ROOT_ENV))
            .or_else(|| storage.and_then(|s| s.blob_root.clone()));

        let (database, blob_root) = match (database, blob_root) {
            (Some(database), Some(blob_root)) => (database, blob_root),
            (database, blob_root) => {
                let dirs = project_dirs()?;
                let data = dirs.data_dir();
                (
                    database.unwrap_or_else(|| data.join("orderdocs.db")),
                    blob_root.unwrap_or_else(|| data.join("blobs")),
                )
            }
        };
        Ok(StoragePaths {
            database,
            blob_root,
        })
    }

    pub fn upload_limits(&self) -> UploadLimits {
        let upload = self.upload.as_ref();
        let defaults = UploadLimits::default();
        UploadLimits {
            max_bytes: upload
                .and_then(|u| u.max_bytes)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            allowed_extensions: upload
                .and_then(|u| u.allowed_extensions.clone())
                .map(|exts| {
                    exts.into_iter()
                        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                        .collect()
                })
                .unwrap_or(defaults.allowed_extensions),
        }
    }

    /// Default for uploads that do not say; duplicates are allowed unless configured otherwise
    pub fn allow_duplicate(&self) -> bool {
        self.upload
            .as_ref()
            .and_then(|u| u.allow_duplicate)
            .unwrap_or(true)
    }

    /// Configured converter, or passthrough for PDF-only setups
    pub fn converter(&self) -> Result<Box<dyn Converter>> {
        match self.conversion.as_ref().and_then(|c| c.command.as_ref()) {
            Some(argv) => Ok(Box::new(CommandConverter::from_argv(argv)?)),
            None => Ok(Box::new(PassthroughConverter)),
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let config: Config = toml::from_str(&contents).map_err(|e| {
        Error::Config(format!(
            "failed to parse {} as TOML: {e}",
            path.display()
        ))
    })?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<PathBuf> {
        None
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        let limits = config.upload_limits();
        assert_eq!(limits.max_bytes, 16 * 1024 * 1024);
        assert_eq!(limits.allowed_extensions, vec!["svg", "pdf"]);
        assert!(config.allow_duplicate());
    }

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            database = "/srv/orderdocs/orderdocs.db"
            blob_root = "/srv/orderdocs/blobs"

            [upload]
            max_bytes = 1024
            allow_duplicate = false
            allowed_extensions = [".SVG"]

            [conversion]
            command = ["rsvg-convert", "-f", "pdf"]
            "#,
        )
        .unwrap();

        let paths = config.storage_paths_with_env(None, None, no_env).unwrap();
        assert_eq!(paths.database, PathBuf::from("/srv/orderdocs/orderdocs.db"));
        assert_eq!(paths.blob_root, PathBuf::from("/srv/orderdocs/blobs"));
        assert_eq!(config.upload_limits().max_bytes, 1024);
        assert_eq!(config.upload_limits().allowed_extensions, vec!["svg"]);
        assert!(!config.allow_duplicate());
        assert!(config.converter().is_ok());
    }

    #[test]
    fn test_override_precedence() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            database = "/from/config.db"
            blob_root = "/from/config/blobs"
            "#,
        )
        .unwrap();
        let env = |key: &str| (key == DATABASE_ENV).then(|| PathBuf::from("/from/env.db"));

        let paths = config.storage_paths_with_env(None, None, env).unwrap();
        assert_eq!(paths.database, PathBuf::from("/from/env.db"));
        assert_eq!(paths.blob_root, PathBuf::from("/from/config/blobs"));

        let paths = config
            .storage_paths_with_env(Some(PathBuf::from("/from/flag.db")), None, env)
            .unwrap();
        assert_eq!(paths.database, PathBuf::from("/from/flag.db"));
    }

    #[test]
    fn test_empty_conversion_command_is_rejected() {
        let config: Config = toml::from_str("[conversion]\ncommand = []\n").unwrap();
        assert!(matches!(config.converter(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert!(config.storage.is_none());
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[upload\nmax_bytes = ").unwrap();
        assert!(matches!(load_config(&path), Err(Error::Config(_))));
    }
}
