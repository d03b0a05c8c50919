//! Session coordinator.
//!
//! A [`SpeechSession`] is configured with an init payload, an input source and
//! an observer, then started once. Starting validates everything that can be
//! checked locally, so configuration and credential problems surface as a
//! synchronous error before any network activity. After that the session runs
//! on its listener and sender tasks and reports only through the observer.

use speech_auth::{AuthError, TokenAuthority};
use speech_wire::{ContextMessage, InitPayload, CONTEXT_CAPABILITY};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

use crate::error::SessionError;
use crate::input::InputSource;
use crate::listener::ConnectionListener;
use crate::observer::{NoopObserver, SpeechResultObserver};
use crate::registry::{SessionRegistry, TrxGuard};
use crate::sender::{
    ContextSupplier, MessageSender, SendTimeouts, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_LISTENING_TIMEOUT,
};
use crate::shared::SessionShared;
use crate::state::SessionState;
use crate::transport::build_uri;

/// Create a fresh transaction id
pub fn generate_trx() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Connection and identity settings shared by sessions
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Websocket endpoint
    pub ws_url: String,
    /// Protocol version, sent as `version=v<N>`
    pub protocol_version: u32,
    /// Application id, sent as `id`
    pub app_id: String,
    /// Device id used when the init payload has none
    pub device_id: Option<String>,
    /// Account id used when the init payload has none
    pub account_id: Option<String>,
    /// Customer id used when the init payload has none
    pub customer_id: Option<String>,
    /// Wait for the connection before init
    pub connect_timeout: Duration,
    /// Wait for `listening` before context and input
    pub listening_timeout: Duration,
    /// Whether a bearer token is required
    pub auth_enabled: bool,
    /// Token source when auth is enabled
    pub authority: Option<Arc<dyn TokenAuthority>>,
    /// Live trx values; the process-wide registry unless replaced
    pub registry: Arc<SessionRegistry>,
}

impl SessionConfig {
    /// Config with auth disabled and default timeouts
    pub fn new(ws_url: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            protocol_version: 1,
            app_id: app_id.into(),
            device_id: None,
            account_id: None,
            customer_id: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            listening_timeout: DEFAULT_LISTENING_TIMEOUT,
            auth_enabled: false,
            authority: None,
            registry: SessionRegistry::global(),
        }
    }

    /// Require tokens from `authority`
    pub fn with_authority(mut self, authority: Arc<dyn TokenAuthority>) -> Self {
        self.auth_enabled = true;
        self.authority = Some(authority);
        self
    }

    /// Fallback identity
    pub fn with_identity(
        mut self,
        device_id: Option<String>,
        account_id: Option<String>,
        customer_id: Option<String>,
    ) -> Self {
        self.device_id = device_id;
        self.account_id = account_id;
        self.customer_id = customer_id;
        self
    }

    fn timeouts(&self) -> SendTimeouts {
        SendTimeouts {
            connect: self.connect_timeout,
            listening: self.listening_timeout,
        }
    }
}

/// One speech interaction
pub struct SpeechSession {
    trx: String,
    config: SessionConfig,
    guard: Option<TrxGuard>,
    init: Option<InitPayload>,
    input: Option<InputSource>,
    context: Option<ContextSupplier>,
    observer: Arc<dyn SpeechResultObserver>,
    shared: Arc<SessionShared>,
}

impl SpeechSession {
    /// Create a session, claiming `trx` until the session ends
    pub fn new(trx: impl Into<String>, config: &SessionConfig) -> Result<Self, SessionError> {
        let trx = trx.into();
        let guard = config.registry.register(&trx)?;
        Ok(Self {
            shared: Arc::new(SessionShared::new(trx.clone())),
            trx,
            config: config.clone(),
            guard: Some(guard),
            init: None,
            input: None,
            context: None,
            observer: Arc::new(NoopObserver),
        })
    }

    /// Transaction id
    pub fn trx(&self) -> &str {
        &self.trx
    }

    /// Current lifecycle stage
    pub fn state(&self) -> SessionState {
        self.shared.state.get()
    }

    /// Set the init payload
    pub fn with_init(mut self, payload: InitPayload) -> Self {
        self.init = Some(payload);
        self
    }

    /// Set the input source
    pub fn with_audio(mut self, source: InputSource) -> Self {
        self.input = Some(source);
        self
    }

    /// Set the event observer
    pub fn with_observer(mut self, observer: Arc<dyn SpeechResultObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Send `message` as context after init
    pub fn with_context(self, message: ContextMessage) -> Self {
        self.with_context_supplier(move || Ok(message))
    }

    /// Send the result of `supplier` as context after init
    ///
    /// The supplier runs on the blocking pool once the session has started.
    pub fn with_context_supplier<F>(mut self, supplier: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<ContextMessage> + Send + 'static,
    {
        self.context = Some(Box::new(supplier));
        self
    }

    /// Start the session
    ///
    /// Returns once all sends are queued; the conversation continues on
    /// background tasks. Must be called within a Tokio runtime.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.guard.is_none() {
            return Err(SessionError::Configuration(format!(
                "session {} was already started",
                self.trx
            )));
        }

        let runtime = Handle::try_current().map_err(|_| {
            SessionError::Configuration("a session must be started within a Tokio runtime".to_string())
        })?;

        let payload = self.prepare_init()?;
        let token = self.resolve_token()?;
        let uri = build_uri(
            &self.config.ws_url,
            self.config.protocol_version,
            &self.trx,
            &self.config.app_id,
            token.as_deref(),
        )?;

        let (Some(guard), Some(input)) = (self.guard.take(), self.input.take()) else {
            return Err(SessionError::Configuration(format!(
                "No input provided. Unable to start session {}",
                self.trx
            )));
        };

        let sender = Arc::new(MessageSender::spawn(
            &runtime,
            self.shared.clone(),
            self.config.timeouts(),
        ));
        ConnectionListener::new(self.shared.clone(), uri).start(
            &runtime,
            sender.clone(),
            self.observer.clone(),
            guard,
        );

        sender.send_init(payload);
        if let Some(supplier) = self.context.take() {
            sender.send_context(supplier);
        }
        sender.handle_input(input);

        info!(trx = %self.trx, "Speech session started");
        Ok(())
    }

    fn prepare_init(&self) -> Result<InitPayload, SessionError> {
        let mut payload = self.init.clone().ok_or_else(|| {
            SessionError::Configuration("No init payload provided. Unable to start session".to_string())
        })?;
        let input = self.input.as_ref().ok_or_else(|| {
            SessionError::Configuration("No input provided. Unable to start session".to_string())
        })?;

        if self.config.app_id.trim().is_empty() {
            return Err(SessionError::Configuration("No appId configured".to_string()));
        }

        if self.context.is_some() {
            payload.add_capability(CONTEXT_CAPABILITY);
        } else {
            payload.remove_capability(CONTEXT_CAPABILITY);
        }

        if payload.device_id().is_none() {
            let device_id = configured(&self.config.device_id).ok_or_else(|| {
                SessionError::Configuration("No deviceId provided. Unable to start session".to_string())
            })?;
            payload = payload.with_device_id(device_id);
        }
        if payload.account_id().is_none() {
            let account_id = configured(&self.config.account_id).ok_or_else(|| {
                SessionError::Configuration("No accountId provided. Unable to start session".to_string())
            })?;
            payload = payload.with_account_id(account_id);
        }
        if payload.customer_id().is_none() {
            if let Some(customer_id) = configured(&self.config.customer_id) {
                payload = payload.with_customer_id(customer_id);
            }
        }
        payload.refresh_ids();

        if let InputSource::Text(text) = input {
            payload.set_text(text.clone());
        }
        Ok(payload)
    }

    fn resolve_token(&self) -> Result<Option<String>, SessionError> {
        if !self.config.auth_enabled {
            return Ok(None);
        }
        let authority = self.config.authority.as_ref().ok_or_else(|| {
            SessionError::Configuration("auth is enabled but no token authority is configured".to_string())
        })?;
        authority
            .token()
            .map(Some)
            .ok_or(SessionError::Auth(AuthError::NotFetched))
    }
}

impl fmt::Debug for SpeechSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechSession")
            .field("trx", &self.trx)
            .field("state", &self.state())
            .field("input", &self.input)
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

fn configured(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
