//! Application bootstrap.
//!
//! [`SpeechApplication`] loads the configuration, installs logging and sets up
//! credentials once per process. The resulting [`SpeechConfigurationManager`]
//! hands out sessions that share its identity and authority. Trx values are
//! unique across the whole process, whichever manager created the session.

use speech_auth::{SatAuthority, TokenAuthority};
use speech_session::{SessionConfig, SessionError, SpeechSession};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, SecretsConfig, SpeechConfiguration};
use crate::logging::init_logging;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "speech-config.yml";

/// Default secrets file, relative to the working directory
pub const DEFAULT_SECRETS_FILE: &str = "speech-secrets.yml";

/// Builder for a configured speech client
pub struct SpeechApplication {
    config_file: PathBuf,
    secrets_file: PathBuf,
    authority: Option<Arc<dyn TokenAuthority>>,
    install_logging: bool,
}

impl Default for SpeechApplication {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechApplication {
    /// Builder reading the default files
    pub fn new() -> Self {
        Self {
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            secrets_file: PathBuf::from(DEFAULT_SECRETS_FILE),
            authority: None,
            install_logging: true,
        }
    }

    /// Read settings from `path`
    pub fn with_config_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config_file = path.as_ref().to_path_buf();
        self
    }

    /// Read SAT credentials from `path`
    pub fn with_secrets_file(mut self, path: impl AsRef<Path>) -> Self {
        self.secrets_file = path.as_ref().to_path_buf();
        self
    }

    /// Use `authority` instead of building one from the secrets file
    pub fn with_authority(mut self, authority: Arc<dyn TokenAuthority>) -> Self {
        self.authority = Some(authority);
        self
    }

    /// Leave the global subscriber alone
    pub fn without_logging(mut self) -> Self {
        self.install_logging = false;
        self
    }

    /// Load everything and fetch the first token
    ///
    /// Any failure here is fatal for the client: no session can be created
    /// without a valid configuration and, when auth is enabled, a token.
    pub async fn init(self) -> Result<SpeechConfigurationManager, ConfigError> {
        let configuration = SpeechConfiguration::load_from_file(&self.config_file)?;

        if self.install_logging {
            init_logging(&configuration.logging)?;
        }
        configuration.validate()?;

        let authority = if configuration.auth.enabled {
            let renew_interval = configuration.renew_interval().ok_or_else(|| {
                ConfigError::Missing(
                    "auth.renewInterval is required when auth is enabled".to_string(),
                )
            })?;

            let authority = match self.authority {
                Some(authority) => authority,
                None => {
                    let secrets = SecretsConfig::load_from_file(&self.secrets_file)?;
                    let auth_config = secrets.into_auth_config(renew_interval)?;
                    Arc::new(SatAuthority::new(auth_config)?) as Arc<dyn TokenAuthority>
                }
            };

            authority.fetch_initial().await?;
            if !authority.schedule_refresh(renew_interval) {
                warn!("Token refresh was not scheduled; the initial token will not be renewed");
            }
            info!("Authentication enabled, refreshing every {:?}", renew_interval);
            Some(authority)
        } else {
            if self.authority.is_some() {
                warn!("A token authority was provided but auth is disabled; ignoring it");
            }
            None
        };

        debug!("Speech client configured for app {:?}", configuration.app_id());
        Ok(SpeechConfigurationManager {
            configuration,
            authority,
        })
    }
}

/// Validated client configuration
#[derive(Debug)]
pub struct SpeechConfigurationManager {
    configuration: SpeechConfiguration,
    authority: Option<Arc<dyn TokenAuthority>>,
}

impl SpeechConfigurationManager {
    /// Loaded settings
    pub fn configuration(&self) -> &SpeechConfiguration {
        &self.configuration
    }

    /// Application id
    pub fn app_id(&self) -> Option<String> {
        self.configuration.app_id()
    }

    /// Default device id
    pub fn device_id(&self) -> Option<String> {
        self.configuration.device_id()
    }

    /// Default account id
    pub fn account_id(&self) -> Option<String> {
        self.configuration.account_id()
    }

    /// Default customer id
    pub fn customer_id(&self) -> Option<String> {
        self.configuration.customer_id()
    }

    /// Whether sessions carry a token
    pub fn auth_is_enabled(&self) -> bool {
        self.authority.is_some()
    }

    /// Token source, when auth is enabled
    pub fn authority(&self) -> Option<&Arc<dyn TokenAuthority>> {
        self.authority.as_ref()
    }

    /// Session settings derived from this configuration
    pub fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new(
            self.configuration.websocket_url().unwrap_or_default(),
            self.app_id().unwrap_or_default(),
        )
        .with_identity(self.device_id(), self.account_id(), self.customer_id());
        config.protocol_version = self.configuration.connection.websocket.version;
        if let Some(authority) = &self.authority {
            config = config.with_authority(authority.clone());
        }
        config
    }

    /// Create a session claiming `trx`
    pub fn new_session(&self, trx: impl Into<String>) -> Result<SpeechSession, SessionError> {
        SpeechSession::new(trx, &self.session_config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speech_auth::FixedAuthority;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const NO_AUTH: &str = r#"
connection:
  websocket:
    url: ws://127.0.0.1:9/speech
    version: 2
auth:
  enabled: false
appId: app-1
deviceId: dev-1
accountId: acct-1
"#;

    #[tokio::test]
    async fn test_init_without_auth() {
        let config = write_temp(NO_AUTH);
        let manager = SpeechApplication::new()
            .with_config_file(config.path())
            .without_logging()
            .with_authority(Arc::new(FixedAuthority::new("ignored")))
            .init()
            .await
            .unwrap();

        assert!(!manager.auth_is_enabled());
        assert_eq!(manager.app_id().as_deref(), Some("app-1"));

        let session_config = manager.session_config();
        assert_eq!(session_config.protocol_version, 2);
        assert_eq!(session_config.device_id.as_deref(), Some("dev-1"));
        assert!(!session_config.auth_enabled);
    }

    #[tokio::test]
    async fn test_trx_unique_across_managers() {
        let config = write_temp(NO_AUTH);
        let first_manager = SpeechApplication::new()
            .with_config_file(config.path())
            .without_logging()
            .init()
            .await
            .unwrap();
        let second_manager = SpeechApplication::new()
            .with_config_file(config.path())
            .without_logging()
            .init()
            .await
            .unwrap();

        let first = first_manager.new_session("trx-shared").unwrap();
        assert!(matches!(
            first_manager.new_session("trx-shared"),
            Err(SessionError::DuplicateSession(_))
        ));
        assert!(matches!(
            second_manager.new_session("trx-shared"),
            Err(SessionError::DuplicateSession(_))
        ));
        drop(first);
        assert!(second_manager.new_session("trx-shared").is_ok());
    }

    #[tokio::test]
    async fn test_missing_app_id() {
        let config = write_temp("connection: {websocket: {url: 'ws://x'}}\nauth: {enabled: false}\n");
        let result = SpeechApplication::new()
            .with_config_file(config.path())
            .without_logging()
            .init()
            .await;
        assert!(matches!(result, Err(ConfigError::Missing(msg)) if msg.contains("appId")));
    }

    #[tokio::test]
    async fn test_auth_requires_renew_interval() {
        let config = write_temp("connection: {websocket: {url: 'ws://x'}}\nappId: app\n");
        let result = SpeechApplication::new()
            .with_config_file(config.path())
            .without_logging()
            .with_authority(Arc::new(FixedAuthority::new("tok")))
            .init()
            .await;
        assert!(matches!(result, Err(ConfigError::Missing(msg)) if msg.contains("renewInterval")));
    }

    #[tokio::test]
    async fn test_supplied_authority_is_fetched() {
        let config =
            write_temp("connection: {websocket: {url: 'ws://x'}}\nappId: app\nauth: {renewInterval: 5}\n");
        let authority = Arc::new(FixedAuthority::new("tok"));
        let manager = SpeechApplication::new()
            .with_config_file(config.path())
            .without_logging()
            .with_authority(authority.clone())
            .init()
            .await
            .unwrap();

        assert!(manager.auth_is_enabled());
        assert_eq!(authority.fetch_count(), 1);
        assert_eq!(manager.authority().and_then(|a| a.token()).as_deref(), Some("tok"));
        assert!(manager.session_config().auth_enabled);
    }

    #[tokio::test]
    async fn test_huge_renew_interval_does_not_panic() {
        let config = write_temp(&format!(
            "connection: {{websocket: {{url: 'ws://x'}}}}\nappId: app\nauth: {{renewInterval: {}}}\n",
            u64::MAX
        ));
        let authority = Arc::new(FixedAuthority::new("tok"));
        let manager = SpeechApplication::new()
            .with_config_file(config.path())
            .without_logging()
            .with_authority(authority.clone())
            .init()
            .await
            .unwrap();

        assert_eq!(authority.fetch_count(), 1);
        assert_eq!(manager.authority().and_then(|a| a.token()).as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_sat_authority_from_secrets() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("X-Client-Id", "client"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "sat-1"})))
            .mount(&server)
            .await;

        let config =
            write_temp("connection: {websocket: {url: 'ws://x'}}\nappId: app\nauth: {renewInterval: 60}\n");
        let secrets = write_temp(&format!(
            "auth.clientId: client\nauth.secret: secret\nauth.endpoint: {}/token\n",
            server.uri()
        ));

        let manager = SpeechApplication::new()
            .with_config_file(config.path())
            .with_secrets_file(secrets.path())
            .without_logging()
            .init()
            .await
            .unwrap();

        assert_eq!(manager.authority().and_then(|a| a.token()).as_deref(), Some("sat-1"));
    }

    #[tokio::test]
    async fn test_failed_initial_fetch_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let config =
            write_temp("connection: {websocket: {url: 'ws://x'}}\nappId: app\nauth: {renewInterval: 60}\n");
        let secrets = write_temp(&format!(
            "auth.clientId: client\nauth.secret: secret\nauth.endpoint: {}/token\n",
            server.uri()
        ));

        let result = SpeechApplication::new()
            .with_config_file(config.path())
            .with_secrets_file(secrets.path())
            .without_logging()
            .init()
            .await;
        assert!(matches!(result, Err(ConfigError::Auth(_))));
    }
}
