//! Client configuration and device credentials

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::OnvifError;

/// Default device service path, relative to the device address
pub const DEFAULT_DEVICE_SERVICE_PATH: &str = "/onvif/device_service";

/// Transport and addressing settings shared by every session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Per-request timeout; expiry is reported as a transport error
    pub timeout_secs: u64,
    /// Path of the device service on the device address
    pub device_service_path: String,
    /// User-Agent sent on every request, including digest retries
    pub user_agent: String,
    /// URL scheme used to reach the device service
    pub scheme: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            device_service_path: DEFAULT_DEVICE_SERVICE_PATH.to_string(),
            user_agent: concat!("onvif-client/", env!("CARGO_PKG_VERSION")).to_string(),
            scheme: "http".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load config from a TOML file; absent keys take their defaults
    pub fn load_from(path: &Path) -> Result<Self, OnvifError> {
        if !path.exists() {
            return Err(OnvifError::Config(format!(
                "config file not found at {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| OnvifError::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| OnvifError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save config to a TOML file
    pub fn save_to(&self, path: &Path) -> Result<(), OnvifError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| OnvifError::Config(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| OnvifError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `{scheme}://{address}{device_service_path}`
    pub fn device_service_url(&self, address: &str) -> String {
        format!("{}://{}{}", self.scheme, address, self.device_service_path)
    }
}

/// Credentials for one device, fixed for the lifetime of its session
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceCredentials {
    pub username: String,
    pub password: String,
    /// Host or `host:port` of the device
    pub address: String,
}

impl DeviceCredentials {
    pub fn new(username: &str, password: &str, address: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            address: address.to_string(),
        }
    }
}

impl std::fmt::Debug for DeviceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("address", &self.address)
            .finish()
    }
}
