use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "todo-tui";
pub const API_URL_ENV: &str = "TODO_API_URL";
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

// Optional settings from config.toml
#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub data_dir: PathBuf,
}

impl Config {
    /// Loads the config file, then applies the environment and the command line on top.
    pub fn load(config_path: Option<&Path>, cli_api_url: Option<String>) -> Result<Config, ConfigError> {
        let file = match config_path {
            Some(path) => read_file_config(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => read_file_config(&path)?,
                _ => FileConfig::default(),
            },
        };
        let env_api_url = std::env::var(API_URL_ENV).ok();
        let default_data_dir = dirs::data_dir().map(|dir| dir.join(APP_NAME));
        Config::resolve(file, env_api_url, cli_api_url, default_data_dir)
    }

    pub fn resolve(
        file: FileConfig,
        env_api_url: Option<String>,
        cli_api_url: Option<String>,
        default_data_dir: Option<PathBuf>,
    ) -> Result<Config, ConfigError> {
        let api_url = [cli_api_url, env_api_url, file.api_url]
            .into_iter()
            .flatten()
            .map(|url| url.trim().to_string())
            .find(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let data_dir = file
            .data_dir
            .or(default_data_dir)
            .ok_or(ConfigError::NoDataDir)?;

        Ok(Config {
            api_url: api_url.trim_end_matches('/').to_string(),
            data_dir,
        })
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.toml"))
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_dir() -> Option<PathBuf> {
        Some(PathBuf::from("/tmp/todo-tui"))
    }

    #[test]
    fn test_defaults_to_local_backend() {
        let config = Config::resolve(FileConfig::default(), None, None, data_dir()).unwrap();
        assert_eq!(config.api_url, "http://localhost:8080");
        assert_eq!(config.session_path(), PathBuf::from("/tmp/todo-tui/session.json"));
    }

    #[test]
    fn test_precedence_cli_env_file() {
        let file = FileConfig {
            api_url: Some("http://file:1".to_string()),
            data_dir: None,
        };
        let config = Config::resolve(
            file,
            Some("http://env:2".to_string()),
            Some("http://cli:3/".to_string()),
            data_dir(),
        )
        .unwrap();
        assert_eq!(config.api_url, "http://cli:3");

        let file = FileConfig {
            api_url: Some("http://file:1".to_string()),
            data_dir: None,
        };
        let config = Config::resolve(file, Some("".to_string()), None, data_dir()).unwrap();
        assert_eq!(config.api_url, "http://file:1");
    }

    #[test]
    fn test_file_data_dir_wins() {
        let file = FileConfig {
            api_url: None,
            data_dir: Some(PathBuf::from("/srv/todo")),
        };
        let config = Config::resolve(file, None, None, data_dir()).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/todo"));
    }

    #[test]
    fn test_missing_data_dir_is_an_error() {
        let result = Config::resolve(FileConfig::default(), None, None, None);
        assert!(matches!(result, Err(ConfigError::NoDataDir)));
    }

    #[test]
    fn test_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_url = \"https://tasks.example.com\"\n").unwrap();
        let file = read_file_config(&path).unwrap();
        assert_eq!(file.api_url.as_deref(), Some("https://tasks.example.com"));

        fs::write(&path, "api_url = [").unwrap();
        assert!(matches!(read_file_config(&path), Err(ConfigError::Parse { .. })));
    }
}
