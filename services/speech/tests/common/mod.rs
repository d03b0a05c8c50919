//! In-process speech server and recording observer for scenario tests.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use vrex_speech::{InitPayload, SessionConfig, SessionError, SpeechResultObserver, VrexResponse};

/// Upper bound for anything a scenario waits on
pub const WAIT: Duration = Duration::from_secs(5);

/// Frame seen by the server, or a marker the handler inserted
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(Value),
    Binary(usize),
    Marker(&'static str),
}

/// Everything one accepted connection saw
#[derive(Debug, Clone, Default)]
pub struct ConnectionLog {
    pub uri: String,
    pub frames: Vec<Frame>,
}

impl ConnectionLog {
    /// `msgType` for text frames, `bin:<len>` for binary frames
    pub fn kinds(&self) -> Vec<String> {
        self.frames
            .iter()
            .map(|frame| match frame {
                Frame::Text(value) => value["msgType"].as_str().unwrap_or("?").to_string(),
                Frame::Binary(len) => format!("bin:{}", len),
                Frame::Marker(name) => name.to_string(),
            })
            .collect()
    }

    /// First text frame of the given type
    pub fn text(&self, msg_type: &str) -> Option<&Value> {
        self.frames.iter().find_map(|frame| match frame {
            Frame::Text(value) if value["msgType"] == msg_type => Some(value),
            _ => None,
        })
    }
}

/// Server side of one websocket
pub struct ServerConn {
    ws: WebSocketStream<TcpStream>,
    log: Arc<Mutex<ConnectionLog>>,
    trx: String,
}

impl ServerConn {
    /// Trx of the last text frame received
    pub fn trx(&self) -> String {
        self.trx.clone()
    }

    /// Next text or binary frame, `None` once the client is gone
    pub async fn recv(&mut self) -> Option<Frame> {
        while let Some(Ok(message)) = self.ws.next().await {
            let frame = match message {
                Message::Text(text) => match serde_json::from_str::<Value>(&text) {
                    Ok(value) => {
                        if let Some(trx) = value["trx"].as_str() {
                            self.trx = trx.to_string();
                        }
                        Frame::Text(value)
                    }
                    Err(_) => Frame::Text(Value::String(text)),
                },
                Message::Binary(data) => Frame::Binary(data.len()),
                _ => continue,
            };
            self.log.lock().unwrap().frames.push(frame.clone());
            return Some(frame);
        }
        None
    }

    /// Receive until a text frame of `msg_type` arrives
    pub async fn recv_until(&mut self, msg_type: &str) -> Option<Value> {
        loop {
            if let Frame::Text(value) = self.recv().await? {
                if value["msgType"] == msg_type {
                    return Some(value);
                }
            }
        }
    }

    /// Receive until the first binary frame
    pub async fn recv_binary(&mut self) -> Option<usize> {
        loop {
            if let Frame::Binary(len) = self.recv().await? {
                return Some(len);
            }
        }
    }

    /// Record whatever arrives within `window`
    pub async fn idle(&mut self, window: Duration) {
        let _ = tokio::time::timeout(window, async {
            while self.recv().await.is_some() {}
        })
        .await;
    }

    pub fn mark(&self, name: &'static str) {
        self.log.lock().unwrap().frames.push(Frame::Marker(name));
    }

    pub async fn send(&mut self, msg_type: &str, payload: Option<Value>) {
        let mut envelope = json!({
            "msgType": msg_type,
            "trx": self.trx,
            "created": 1_700_000_000_000i64,
        });
        if let Some(payload) = payload {
            envelope["msgPayload"] = payload;
        }
        self.send_raw(envelope.to_string()).await;
    }

    pub async fn send_raw(&mut self, text: String) {
        let _ = self.ws.send(Message::Text(text)).await;
    }

    /// Announce the close, close the socket and record what is still in flight
    pub async fn finish(mut self, return_code: i32) {
        self.send("closeConnection", Some(json!({"returnCode": return_code})))
            .await;
        let _ = self.ws.close(None).await;
        while self.recv().await.is_some() {}
    }
}

/// Websocket server running a handler per accepted connection
pub struct MockSpeechServer {
    pub url: String,
    logs: Arc<Mutex<Vec<Arc<Mutex<ConnectionLog>>>>>,
    finished: watch::Receiver<usize>,
    task: JoinHandle<()>,
}

impl MockSpeechServer {
    pub async fn start<F, Fut>(handler: F) -> Self
    where
        F: Fn(ServerConn) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/speech", listener.local_addr().unwrap());
        let logs: Arc<Mutex<Vec<Arc<Mutex<ConnectionLog>>>>> = Arc::new(Mutex::new(Vec::new()));
        let (finished_tx, finished) = watch::channel(0usize);
        let finished_tx = Arc::new(finished_tx);
        let handler = Arc::new(handler);

        let accepted = logs.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let log = Arc::new(Mutex::new(ConnectionLog::default()));
                accepted.lock().unwrap().push(log.clone());
                let handler = handler.clone();
                let finished_tx = finished_tx.clone();

                tokio::spawn(async move {
                    let uri_log = log.clone();
                    let callback = move |request: &Request, response: Response| {
                        uri_log.lock().unwrap().uri = request.uri().to_string();
                        Ok::<Response, ErrorResponse>(response)
                    };
                    if let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await {
                        handler(ServerConn {
                            ws,
                            log,
                            trx: String::new(),
                        })
                        .await;
                    }
                    finished_tx.send_modify(|count| *count += 1);
                });
            }
        });

        Self {
            url,
            logs,
            finished,
            task,
        }
    }

    /// Connections accepted so far
    pub fn accepted(&self) -> usize {
        self.logs.lock().unwrap().len()
    }

    pub fn log(&self, index: usize) -> ConnectionLog {
        self.logs.lock().unwrap()[index].lock().unwrap().clone()
    }

    /// Wait until `count` handlers have returned
    pub async fn wait_finished(&self, count: usize) {
        let mut finished = self.finished.clone();
        tokio::time::timeout(WAIT, finished.wait_for(|done| *done >= count))
            .await
            .expect("server handlers did not finish")
            .expect("server stopped");
    }
}

impl Drop for MockSpeechServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Observer recording callbacks as short strings
pub struct Recorder {
    events: Mutex<Vec<String>>,
    changed: watch::Sender<usize>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        let (changed, _) = watch::channel(0usize);
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            changed,
        })
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
        self.changed.send_modify(|count| *count += 1);
    }

    /// Wait until `event` has been recorded
    pub async fn wait_for(&self, event: &str) {
        let mut changed = self.changed.subscribe();
        tokio::time::timeout(
            WAIT,
            changed.wait_for(|_| self.events().iter().any(|seen| seen == event)),
        )
        .await
        .unwrap_or_else(|_| panic!("no {:?} event, saw {:?}", event, self.events()))
        .expect("recorder dropped");
    }

    /// Wait for the terminal callback and return every event
    pub async fn wait_terminal(&self) -> Vec<String> {
        let mut changed = self.changed.subscribe();
        tokio::time::timeout(
            WAIT,
            changed.wait_for(|_| {
                self.events()
                    .iter()
                    .any(|seen| seen.starts_with("close") || seen == "error")
            }),
        )
        .await
        .unwrap_or_else(|_| panic!("session did not end, saw {:?}", self.events()))
        .expect("recorder dropped");
        self.events()
    }
}

impl SpeechResultObserver for Recorder {
    fn on_listening(&self) {
        self.push("listening".to_string());
    }

    fn on_partial_transcription_received(&self, text: &str) {
        self.push(format!("partial:{}", text));
    }

    fn on_final_transcription_received(&self, text: &str) {
        self.push(format!("final:{}", text));
    }

    fn on_wake_up_word_verification_success(&self, confidence: Option<i32>) {
        self.push(format!("wuw:pass:{}", confidence.unwrap_or_default()));
    }

    fn on_wake_up_word_verification_failure(&self, confidence: Option<i32>) {
        self.push(format!("wuw:fail:{}", confidence.unwrap_or_default()));
    }

    fn on_final_response_success(&self, _result: &VrexResponse) {
        self.push("response:ok".to_string());
    }

    fn on_final_response_failure(&self, result: &VrexResponse) {
        self.push(format!("response:fail:{}", result.return_code));
    }

    fn on_close_connection(&self, result: Option<&VrexResponse>) {
        match result {
            Some(response) => self.push(format!("close:{}", response.return_code)),
            None => self.push("close:none".to_string()),
        }
    }

    fn on_error(&self, _cause: &SessionError) {
        self.push("error".to_string());
    }
}

/// Session settings with a complete identity
pub fn session_config(url: &str) -> SessionConfig {
    SessionConfig::new(url, "test-app").with_identity(
        Some("dev-1".to_string()),
        Some("acct-1".to_string()),
        None,
    )
}

/// Push-to-talk init payload
pub fn ptt_init() -> InitPayload {
    InitPayload::from_value(json!({"roles": ["PTT"], "capabilities": []})).unwrap()
}
