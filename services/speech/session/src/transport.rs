//! Websocket transport plumbing.
//!
//! [`Connection`] is the write half of an open websocket, set once when the
//! connect completes and shared by the listener and the sender.

use bytes::Bytes;
use futures::{Sink, SinkExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::debug;
use url::Url;

use crate::error::SessionError;

type WsSink = Pin<Box<dyn Sink<Message, Error = tungstenite::Error> + Send>>;

const OWN_PARAMS: [&str; 4] = ["version", "trx", "id", "sat"];

/// Write half of an open websocket
pub struct Connection {
    sink: Mutex<WsSink>,
    open: AtomicBool,
}

impl Connection {
    /// Wrap the sink of a freshly opened websocket
    pub fn new<S>(sink: S) -> Self
    where
        S: Sink<Message, Error = tungstenite::Error> + Send + 'static,
    {
        Self {
            sink: Mutex::new(Box::pin(sink)),
            open: AtomicBool::new(true),
        }
    }

    /// Whether the socket is still usable for writes
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Record that the socket is gone
    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Send a text frame
    pub async fn send_text(&self, text: String) -> Result<(), SessionError> {
        self.send(Message::Text(text)).await
    }

    /// Send a binary frame
    pub async fn send_binary(&self, data: Bytes) -> Result<(), SessionError> {
        self.send(Message::Binary(data.to_vec())).await
    }

    async fn send(&self, message: Message) -> Result<(), SessionError> {
        if !self.is_open() {
            return Err(SessionError::Transport("connection closed".to_string()));
        }
        let mut sink = self.sink.lock().await;
        sink.send(message).await.map_err(|e| {
            self.mark_closed();
            SessionError::from(e)
        })
    }

    /// Close the socket; errors are ignored
    pub async fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            let mut sink = self.sink.lock().await;
            if let Err(e) = sink.close().await {
                debug!("Websocket close failed: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("open", &self.is_open())
            .finish()
    }
}

/// Build the connection URI for one session
///
/// Query parameters `version`, `trx`, `id` and, with auth, `sat` replace any
/// of the same name already present in `base`.
pub fn build_uri(
    base: &str,
    version: u32,
    trx: &str,
    app_id: &str,
    token: Option<&str>,
) -> Result<Url, SessionError> {
    let mut url = Url::parse(base)?;
    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(SessionError::Configuration(format!(
                "unsupported websocket scheme {}",
                other
            )))
        }
    }

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !OWN_PARAMS.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    {
        let mut query = url.query_pairs_mut();
        query.clear();
        query.extend_pairs(retained);
        query
            .append_pair("version", &format!("v{}", version))
            .append_pair("trx", trx)
            .append_pair("id", app_id);
        if let Some(token) = token {
            query.append_pair("sat", token);
        }
    }
    Ok(url)
}
