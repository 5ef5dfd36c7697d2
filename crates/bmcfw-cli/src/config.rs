//! Configuration file handling for bmcfw

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default controller URL
    pub server: Option<String>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// Login user when no token is given
    pub username: Option<String>,
    /// Accept self-signed controller certificates
    pub insecure: Option<bool>,
    /// Device YAML file with endpoint and timeout overrides
    pub device: Option<PathBuf>,
    /// Where applied firmware records are kept
    pub state_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("bmcfw");

        Ok(config_dir.join("config.toml"))
    }

    /// Get the default state file path
    pub fn default_state_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .context("Could not determine data directory")?
            .join("bmcfw");

        Ok(data_dir.join("state.json"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(&self, args: ArgOverrides<'_>) -> Result<MergedConfig> {
        let state_file = match args.state_file.or(self.state_file.as_deref()) {
            Some(path) => path.to_path_buf(),
            None => Self::default_state_path()?,
        };

        Ok(MergedConfig {
            server: args
                .server
                .map(String::from)
                .or_else(|| self.server.clone())
                .unwrap_or_else(|| "https://localhost".to_string()),
            output: args
                .output
                .map(String::from)
                .or_else(|| self.output.clone())
                .unwrap_or_else(|| "table".to_string()),
            no_color: args.no_color || self.no_color.unwrap_or(false),
            username: args
                .username
                .map(String::from)
                .or_else(|| self.username.clone()),
            insecure: args.insecure || self.insecure.unwrap_or(false),
            device: args
                .device
                .map(Path::to_path_buf)
                .or_else(|| self.device.clone()),
            state_file,
        })
    }
}

/// Values given on the command line
#[derive(Debug, Default, Clone, Copy)]
pub struct ArgOverrides<'a> {
    pub server: Option<&'a str>,
    pub output: Option<&'a str>,
    pub no_color: bool,
    pub username: Option<&'a str>,
    pub insecure: bool,
    pub device: Option<&'a Path>,
    pub state_file: Option<&'a Path>,
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub server: String,
    pub output: String,
    pub no_color: bool,
    pub username: Option<String>,
    pub insecure: bool,
    pub device: Option<PathBuf>,
    pub state_file: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
server = "https://10.0.0.5"
username = "admin"
insecure = true
state_file = "/var/lib/bmcfw/state.json"
"#,
        )
        .unwrap();

        assert_eq!(config.server.as_deref(), Some("https://10.0.0.5"));
        assert_eq!(config.insecure, Some(true));
        assert_eq!(config.device, None);
    }

    #[test]
    fn test_args_override_file() {
        let config = Config {
            server: Some("https://10.0.0.5".into()),
            username: Some("admin".into()),
            state_file: Some("/var/lib/bmcfw/state.json".into()),
            ..Default::default()
        };

        let merged = config
            .merge_with_args(ArgOverrides {
                server: Some("https://10.0.0.6"),
                output: Some("json"),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(merged.server, "https://10.0.0.6");
        assert_eq!(merged.output, "json");
        assert_eq!(merged.username.as_deref(), Some("admin"));
        assert!(!merged.insecure);
        assert_eq!(
            merged.state_file,
            PathBuf::from("/var/lib/bmcfw/state.json")
        );
    }

    #[test]
    fn test_load_from_missing_file() {
        assert!(Config::load_from(Path::new("/nonexistent/bmcfw.toml")).is_err());
    }
}
