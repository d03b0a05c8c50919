//! Configuration handling for the speech client.
//!
//! Settings come from `speech-config.yml`, credentials for the SAT authority
//! from a separate secrets file, and a handful of `VREX_*` environment
//! variables override the file.

use serde::{Deserialize, Serialize};
use speech_auth::{AuthConfig, AuthError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read
    #[error("Unable to read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid YAML for the expected shape
    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: serde_yaml::Error,
    },

    /// Required setting absent
    #[error("Missing configuration: {0}")]
    Missing(String),

    /// Setting present but unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Initial credential fetch failed
    #[error("Authentication setup failed: {0}")]
    Auth(#[from] AuthError),
}

/// Root of `speech-config.yml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfiguration {
    /// Server connection
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Credential handling
    #[serde(default)]
    pub auth: AuthSettings,
    /// Application id sent with every connection
    #[serde(default)]
    pub app_id: Option<String>,
    /// Default device id
    #[serde(default)]
    pub device_id: Option<String>,
    /// Default account id
    #[serde(default)]
    pub account_id: Option<String>,
    /// Default customer id
    #[serde(default)]
    pub customer_id: Option<String>,
}

/// `connection` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Websocket endpoint
    #[serde(default)]
    pub websocket: WebsocketConfig,
}

/// `connection.websocket` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsocketConfig {
    /// Endpoint URL (`ws://` or `wss://`)
    #[serde(default)]
    pub url: Option<String>,
    /// Protocol version
    #[serde(default = "default_version")]
    pub version: u32,
}

impl Default for WebsocketConfig {
    fn default() -> Self {
        Self {
            url: None,
            version: default_version(),
        }
    }
}

/// `logging` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Whether to install a subscriber
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// TRACE, DEBUG, INFO, WARN or ERROR
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: default_log_level(),
        }
    }
}

/// `auth` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSettings {
    /// Whether connections carry a SAT
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minutes between token refreshes
    #[serde(default)]
    pub renew_interval: Option<u64>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            renew_interval: None,
        }
    }
}

fn default_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl SpeechConfiguration {
    /// Load configuration from file, then apply environment overrides
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let path = config_path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        info!("Loaded configuration from {:?}", path);

        config.apply_environment_overrides();
        Ok(config)
    }

    /// Apply `VREX_*` environment variable overrides
    pub fn apply_environment_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("VREX_WS_URL") {
            info!("Websocket URL overridden by environment: {}", url);
            self.connection.websocket.url = Some(url);
        }
        if let Some(app_id) = lookup("VREX_APP_ID") {
            info!("App id overridden by environment: {}", app_id);
            self.app_id = Some(app_id);
        }
        if let Some(device_id) = lookup("VREX_DEVICE_ID") {
            debug!("Device id overridden by environment");
            self.device_id = Some(device_id);
        }
        if let Some(account_id) = lookup("VREX_ACCOUNT_ID") {
            debug!("Account id overridden by environment");
            self.account_id = Some(account_id);
        }
        if let Some(customer_id) = lookup("VREX_CUSTOMER_ID") {
            debug!("Customer id overridden by environment");
            self.customer_id = Some(customer_id);
        }
        if let Some(enabled) = lookup("VREX_AUTH_ENABLED") {
            self.auth.enabled = enabled.trim().eq_ignore_ascii_case("true");
            info!("Auth enabled overridden by environment: {}", self.auth.enabled);
        }
        if let Some(level) = lookup("VREX_LOG_LEVEL") {
            self.logging.log_level = level;
        }
    }

    /// Check the settings every session needs
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_id().is_none() {
            return Err(ConfigError::Missing(
                "No appId specified in speech-config.yml".to_string(),
            ));
        }
        match self.websocket_url() {
            None => Err(ConfigError::Missing(
                "No connection.websocket.url specified in speech-config.yml".to_string(),
            )),
            Some(url) if !(url.starts_with("ws://") || url.starts_with("wss://")) => Err(
                ConfigError::Invalid(format!("websocket url {} is not ws:// or wss://", url)),
            ),
            Some(_) => Ok(()),
        }
    }

    /// Trimmed app id, `None` when blank
    pub fn app_id(&self) -> Option<String> {
        trim_id(&self.app_id)
    }

    /// Trimmed device id
    pub fn device_id(&self) -> Option<String> {
        trim_id(&self.device_id)
    }

    /// Trimmed account id
    pub fn account_id(&self) -> Option<String> {
        trim_id(&self.account_id)
    }

    /// Trimmed customer id
    pub fn customer_id(&self) -> Option<String> {
        trim_id(&self.customer_id)
    }

    /// Websocket URL, `None` when blank
    pub fn websocket_url(&self) -> Option<String> {
        trim_id(&self.connection.websocket.url)
    }

    /// Token refresh interval
    ///
    /// Configured in minutes; values too large to count in seconds saturate.
    pub fn renew_interval(&self) -> Option<Duration> {
        self.auth
            .renew_interval
            .map(|minutes| Duration::from_secs(minutes.saturating_mul(60)))
    }
}

fn trim_id(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Contents of the secrets file
#[derive(Clone, Default, Deserialize)]
pub struct SecretsConfig {
    /// SAT client id
    #[serde(rename = "auth.clientId", default)]
    pub client_id: Option<String>,
    /// SAT client secret
    #[serde(rename = "auth.secret", default)]
    pub secret: Option<String>,
    /// SAT endpoint
    #[serde(rename = "auth.endpoint", default)]
    pub endpoint: Option<String>,
}

impl SecretsConfig {
    /// Load the secrets file
    pub fn load_from_file<P: AsRef<Path>>(secrets_path: P) -> Result<Self, ConfigError> {
        let path = secrets_path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Credentials for a SAT authority refreshing every `renew_interval`
    pub fn into_auth_config(self, renew_interval: Duration) -> Result<AuthConfig, ConfigError> {
        match (self.client_id, self.secret, self.endpoint) {
            (Some(client_id), Some(secret), Some(endpoint)) => Ok(AuthConfig {
                endpoint,
                client_id,
                secret,
                renew_interval,
            }),
            _ => Err(ConfigError::Missing(
                "auth.endpoint, auth.clientId or auth.secret in the secrets file".to_string(),
            )),
        }
    }
}

impl fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretsConfig")
            .field("client_id", &self.client_id)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config: SpeechConfiguration = serde_yaml::from_str("appId: app").unwrap();
        assert_eq!(config.connection.websocket.version, 1);
        assert!(config.logging.enabled);
        assert_eq!(config.logging.log_level, "INFO");
        assert!(config.auth.enabled);
        assert!(config.renew_interval().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let file = write_temp(
            r#"
connection:
  websocket:
    url: wss://speech.example.com/ws
    version: 2
logging:
  enabled: false
  logLevel: debug
auth:
  enabled: true
  renewInterval: 30
appId: "  my-app  "
deviceId: " dev-1 "
accountId: acct-1
"#,
        );

        let config = SpeechConfiguration::load_from_file(file.path()).unwrap();
        assert_eq!(config.websocket_url().as_deref(), Some("wss://speech.example.com/ws"));
        assert_eq!(config.connection.websocket.version, 2);
        assert!(!config.logging.enabled);
        assert_eq!(config.renew_interval(), Some(Duration::from_secs(1800)));
        assert_eq!(config.app_id().as_deref(), Some("my-app"));
        assert_eq!(config.device_id().as_deref(), Some("dev-1"));
        assert_eq!(config.customer_id(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_huge_renew_interval_saturates() {
        let config: SpeechConfiguration =
            serde_yaml::from_str(&format!("auth:\n  renewInterval: {}\n", u64::MAX)).unwrap();
        assert_eq!(config.renew_interval(), Some(Duration::from_secs(u64::MAX)));
    }

    #[test]
    fn test_missing_file_and_bad_yaml() {
        assert!(matches!(
            SpeechConfiguration::load_from_file("/nonexistent/speech-config.yml"),
            Err(ConfigError::Io { .. })
        ));

        let file = write_temp("connection: [unclosed");
        assert!(matches!(
            SpeechConfiguration::load_from_file(file.path()),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn test_validate() {
        let mut config: SpeechConfiguration =
            serde_yaml::from_str("appId: '   '\nconnection: {websocket: {url: 'ws://x'}}").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Missing(msg)) if msg.contains("appId")));

        config.app_id = Some("app".to_string());
        config.connection.websocket.url = Some("http://x".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.connection.websocket.url = None;
        assert!(matches!(config.validate(), Err(ConfigError::Missing(msg)) if msg.contains("url")));
    }

    #[test]
    fn test_overrides() {
        let mut config: SpeechConfiguration =
            serde_yaml::from_str("appId: file-app\ndeviceId: file-dev").unwrap();
        let env: HashMap<&str, &str> = [
            ("VREX_WS_URL", "ws://localhost:9000/ws"),
            ("VREX_DEVICE_ID", "env-dev"),
            ("VREX_AUTH_ENABLED", "FALSE"),
            ("VREX_LOG_LEVEL", "warn"),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.app_id().as_deref(), Some("file-app"));
        assert_eq!(config.device_id().as_deref(), Some("env-dev"));
        assert_eq!(config.websocket_url().as_deref(), Some("ws://localhost:9000/ws"));
        assert!(!config.auth.enabled);
        assert_eq!(config.logging.log_level, "warn");
    }

    #[test]
    fn test_secrets() {
        let file = write_temp(
            "auth.clientId: client\nauth.secret: s3cret\nauth.endpoint: https://sat.example.com/token\n",
        );
        let secrets = SecretsConfig::load_from_file(file.path()).unwrap();
        assert!(!format!("{:?}", secrets).contains("s3cret"));

        let auth = secrets.into_auth_config(Duration::from_secs(60)).unwrap();
        assert_eq!(auth.client_id, "client");
        assert_eq!(auth.endpoint, "https://sat.example.com/token");

        let partial = write_temp("auth.clientId: client\n");
        let secrets = SecretsConfig::load_from_file(partial.path()).unwrap();
        assert!(matches!(
            secrets.into_auth_config(Duration::from_secs(60)),
            Err(ConfigError::Missing(_))
        ));
    }
}
