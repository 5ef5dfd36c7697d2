//! Device configuration with YAML support

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Connection and endpoint configuration for one management controller
///
/// Can be loaded from YAML, JSON, or constructed programmatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Connection settings
    pub connection: ConnectionConfig,

    /// Endpoint paths (discovery overrides)
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Re-read the inventory after a successful upload to pick up the
    /// identifier of a freshly created record
    #[serde(default)]
    pub reresolve_after_upload: bool,
}

/// Connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Base URL of the controller, e.g. `https://10.0.0.5`
    pub base_url: String,

    /// Header carrying the session token (default: X-Auth-Token)
    #[serde(default = "default_auth_header")]
    pub auth_header: String,

    /// Accept self-signed controller certificates
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_auth_header() -> String {
    "X-Auth-Token".to_string()
}

/// Endpoint paths configuration
///
/// The update service, inventory and push URI are normally discovered from
/// the service root. Setting them here skips discovery, which helps with
/// controllers that publish incomplete service documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Service root path
    #[serde(default = "default_service_root")]
    pub service_root: String,

    /// Session collection for login
    #[serde(default = "default_sessions_path")]
    pub sessions: String,

    /// Update service document (overrides discovery)
    #[serde(default)]
    pub update_service: Option<String>,

    /// Firmware inventory collection (overrides discovery)
    #[serde(default)]
    pub firmware_inventory: Option<String>,

    /// Multipart push URI (overrides discovery)
    #[serde(default)]
    pub push_uri: Option<String>,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            service_root: default_service_root(),
            sessions: default_sessions_path(),
            update_service: None,
            firmware_inventory: None,
            push_uri: None,
        }
    }
}

fn default_service_root() -> String {
    "/redfish/v1".to_string()
}

fn default_sessions_path() -> String {
    "/redfish/v1/SessionService/Sessions".to_string()
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// General request timeout in milliseconds (default: 30s)
    #[serde(default = "default_request_timeout")]
    pub request_ms: u64,

    /// Connect timeout in milliseconds (default: 10s)
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Firmware upload timeout in milliseconds (default: 10 minutes)
    #[serde(default = "default_upload_timeout")]
    pub upload_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            request_ms: default_request_timeout(),
            connect_ms: default_connect_timeout(),
            upload_ms: default_upload_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_connect_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_upload_timeout() -> u64 {
    600_000 // 10 minutes
}

impl DeviceConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize configuration to YAML
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Create a builder for programmatic configuration
    pub fn builder(base_url: impl Into<String>) -> DeviceConfigBuilder {
        DeviceConfigBuilder::new(base_url)
    }
}

/// Builder for DeviceConfig
pub struct DeviceConfigBuilder {
    config: DeviceConfig,
}

impl DeviceConfigBuilder {
    /// Create a new builder with the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            config: DeviceConfig {
                connection: ConnectionConfig {
                    base_url: base_url.into(),
                    auth_header: default_auth_header(),
                    accept_invalid_certs: false,
                },
                endpoints: EndpointsConfig::default(),
                timeouts: TimeoutsConfig::default(),
                reresolve_after_upload: false,
            },
        }
    }

    /// Set the session token header name
    pub fn auth_header(mut self, header: impl Into<String>) -> Self {
        self.config.connection.auth_header = header.into();
        self
    }

    /// Accept self-signed certificates
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.config.connection.accept_invalid_certs = accept;
        self
    }

    /// Set the service root path
    pub fn service_root(mut self, path: impl Into<String>) -> Self {
        self.config.endpoints.service_root = path.into();
        self
    }

    /// Set the firmware inventory path, bypassing discovery
    pub fn firmware_inventory(mut self, path: impl Into<String>) -> Self {
        self.config.endpoints.firmware_inventory = Some(path.into());
        self
    }

    /// Set the push URI, bypassing discovery
    pub fn push_uri(mut self, path: impl Into<String>) -> Self {
        self.config.endpoints.push_uri = Some(path.into());
        self
    }

    /// Set request timeout in milliseconds
    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.request_ms = ms;
        self
    }

    /// Set upload timeout in milliseconds
    pub fn upload_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.upload_ms = ms;
        self
    }

    /// Re-read inventory after upload
    pub fn reresolve_after_upload(mut self, enabled: bool) -> Self {
        self.config.reresolve_after_upload = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> DeviceConfig {
        self.config
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
connection:
  base_url: "https://10.0.0.5"
  accept_invalid_certs: true

endpoints:
  push_uri: "/redfish/v1/UpdateService/upload"

timeouts:
  upload_ms: 900000
"#;

        let config = DeviceConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.connection.base_url, "https://10.0.0.5");
        assert_eq!(config.connection.auth_header, "X-Auth-Token");
        assert!(config.connection.accept_invalid_certs);
        assert_eq!(config.endpoints.service_root, "/redfish/v1");
        assert_eq!(
            config.endpoints.push_uri.as_deref(),
            Some("/redfish/v1/UpdateService/upload")
        );
        assert_eq!(config.endpoints.firmware_inventory, None);
        assert_eq!(config.timeouts.upload_ms, 900_000);
        assert_eq!(config.timeouts.request_ms, 30_000);
        assert!(!config.reresolve_after_upload);
    }

    #[test]
    fn test_json_parsing() {
        let json = r#"{"connection": {"base_url": "http://bmc"}, "reresolve_after_upload": true}"#;
        let config = DeviceConfig::from_json(json).unwrap();
        assert_eq!(config.connection.base_url, "http://bmc");
        assert!(config.reresolve_after_upload);
    }

    #[test]
    fn test_missing_base_url_is_rejected() {
        let yaml = "endpoints:\n  service_root: /redfish/v1\n";
        assert!(matches!(
            DeviceConfig::from_yaml(yaml),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_builder() {
        let config = DeviceConfig::builder("http://localhost:8000")
            .auth_header("X-Session-Token")
            .firmware_inventory("/redfish/v1/UpdateService/SoftwareInventory")
            .upload_timeout_ms(120_000)
            .reresolve_after_upload(true)
            .build();

        assert_eq!(config.connection.auth_header, "X-Session-Token");
        assert_eq!(
            config.endpoints.firmware_inventory.as_deref(),
            Some("/redfish/v1/UpdateService/SoftwareInventory")
        );
        assert_eq!(config.timeouts.upload_ms, 120_000);
        assert!(config.reresolve_after_upload);
    }

    #[test]
    fn test_to_yaml() {
        let config = DeviceConfig::builder("http://localhost:8000").build();
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("base_url"));
        assert!(yaml.contains("X-Auth-Token"));
    }
}
