//! Ordered outbound writes for one session.
//!
//! Every write goes through a single worker task that drains a queue of
//! [`SendTask`]s, so frames leave in submission order: init, context, input
//! frames, end of stream. Shutting the sender down drops the in-flight task
//! and everything still queued.

use speech_wire::{ContextMessage, EndOfStream, Envelope, InitPayload, MessageType};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::input::InputSource;
use crate::shared::SessionShared;
use crate::state::SessionState;

/// Default wait for the connection before sending init
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Default wait for `listening` before sending messages or input
pub const DEFAULT_LISTENING_TIMEOUT: Duration = Duration::from_millis(3000);

/// Producer of a context message, run on the blocking pool
pub type ContextSupplier = Box<dyn FnOnce() -> anyhow::Result<ContextMessage> + Send + 'static>;

/// Bounded waits applied by the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendTimeouts {
    /// Wait for the connection before init
    pub connect: Duration,
    /// Wait for `listening` before messages and input
    pub listening: Duration,
}

impl Default for SendTimeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            listening: DEFAULT_LISTENING_TIMEOUT,
        }
    }
}

/// Unit of work for the send worker
pub enum SendTask {
    /// Init frame, gated on the connection
    Init(InitPayload),
    /// Ad hoc control frame, gated on readiness
    Message(Envelope),
    /// Context produced by a supplier, gated on readiness
    Context(ContextSupplier),
    /// Input streamed as binary frames, gated on readiness
    Input(InputSource),
}

impl fmt::Debug for SendTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendTask::Init(_) => f.write_str("Init"),
            SendTask::Message(envelope) => write!(f, "Message({})", envelope.msg_type),
            SendTask::Context(_) => f.write_str("Context"),
            SendTask::Input(source) => write!(f, "Input({:?})", source),
        }
    }
}

/// Outbound side of a session
pub struct MessageSender {
    shared: Arc<SessionShared>,
    tasks: mpsc::UnboundedSender<SendTask>,
    shutdown: watch::Sender<bool>,
}

impl MessageSender {
    /// Start the send worker on `runtime`
    pub fn spawn(runtime: &Handle, shared: Arc<SessionShared>, timeouts: SendTimeouts) -> Self {
        let (tasks, rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        runtime.spawn(run_worker(shared.clone(), timeouts, rx, shutdown_rx));
        Self {
            shared,
            tasks,
            shutdown,
        }
    }

    /// Queue the init frame
    pub fn send_init(&self, payload: InitPayload) {
        self.submit(SendTask::Init(payload));
    }

    /// Queue an ad hoc control frame
    pub fn send_message(&self, envelope: Envelope) {
        self.submit(SendTask::Message(envelope));
    }

    /// Queue a context message produced by `supplier`
    pub fn send_context(&self, supplier: ContextSupplier) {
        self.submit(SendTask::Context(supplier));
    }

    /// Queue the session input
    pub fn handle_input(&self, source: InputSource) {
        self.submit(SendTask::Input(source));
    }

    /// Stop all outbound sending; later calls do nothing
    pub fn shutdown(&self) {
        let first = self.shutdown.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        });
        if first {
            info!(trx = %self.shared.trx, "Stopping outbound sends");
        }
    }

    /// Whether [`shutdown`](Self::shutdown) was called
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn submit(&self, task: SendTask) {
        if self.is_shut_down() {
            debug!(trx = %self.shared.trx, "Sender stopped, dropping {:?}", task);
            return;
        }
        if let Err(e) = self.tasks.send(task) {
            debug!(trx = %self.shared.trx, "Send worker gone, dropping {:?}", e.0);
        }
    }
}

impl fmt::Debug for MessageSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageSender")
            .field("trx", &self.shared.trx)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

async fn run_worker(
    shared: Arc<SessionShared>,
    timeouts: SendTimeouts,
    mut tasks: mpsc::UnboundedReceiver<SendTask>,
    mut shutdown: watch::Receiver<bool>,
) {
    let work = async {
        while let Some(task) = tasks.recv().await {
            execute(&shared, timeouts, task).await;
        }
    };

    tokio::select! {
        _ = work => debug!(trx = %shared.trx, "Send queue drained"),
        _ = shutdown.wait_for(|stopped| *stopped) => {
            debug!(trx = %shared.trx, "Send worker interrupted")
        }
    }
}

async fn execute(shared: &SessionShared, timeouts: SendTimeouts, task: SendTask) {
    match task {
        SendTask::Init(payload) => {
            if !shared.connected.wait(timeouts.connect).await {
                warn!(
                    trx = %shared.trx,
                    "Connection not established within {:?}, init not sent",
                    timeouts.connect
                );
                return;
            }
            match Envelope::with_payload(&shared.trx, MessageType::Init, &payload) {
                Ok(envelope) => {
                    if send_envelope(shared, envelope).await {
                        shared.state.advance(SessionState::AwaitingReadiness);
                    }
                }
                Err(e) => error!(trx = %shared.trx, "Failed to build init message: {}", e),
            }
        }
        SendTask::Message(envelope) => {
            if wait_listening(shared, timeouts, &envelope.msg_type).await {
                send_envelope(shared, envelope).await;
            }
        }
        SendTask::Context(supplier) => {
            let message = match tokio::task::spawn_blocking(supplier).await {
                Ok(Ok(message)) => message,
                Ok(Err(e)) => {
                    error!(trx = %shared.trx, "Context supplier failed: {:#}", e);
                    return;
                }
                Err(e) => {
                    error!(trx = %shared.trx, "Context supplier panicked: {}", e);
                    return;
                }
            };
            match Envelope::with_payload(&shared.trx, MessageType::Context, &message) {
                Ok(envelope) => {
                    if wait_listening(shared, timeouts, &envelope.msg_type).await {
                        send_envelope(shared, envelope).await;
                    }
                }
                Err(e) => error!(trx = %shared.trx, "Failed to build context message: {}", e),
            }
        }
        SendTask::Input(source) => stream_input(shared, timeouts, source).await,
    }
}

async fn wait_listening(shared: &SessionShared, timeouts: SendTimeouts, what: &str) -> bool {
    if shared.listening.wait(timeouts.listening).await {
        return true;
    }
    warn!(
        trx = %shared.trx,
        "Server not listening within {:?}, {} not sent",
        timeouts.listening, what
    );
    false
}

async fn send_envelope(shared: &SessionShared, envelope: Envelope) -> bool {
    let Some(connection) = shared.open_connection() else {
        debug!(trx = %shared.trx, "Connection closed, {} not sent", envelope.msg_type);
        return false;
    };
    let text = match shared.codec.encode(&envelope) {
        Ok(text) => text,
        Err(e) => {
            error!(trx = %shared.trx, "Failed to encode {} message: {}", envelope.msg_type, e);
            return false;
        }
    };
    debug!(trx = %shared.trx, "Sending message: {}", text);
    match connection.send_text(text).await {
        Ok(()) => {
            info!(trx = %shared.trx, "{} message sent", envelope.msg_type);
            true
        }
        Err(e) => {
            error!(trx = %shared.trx, "Error sending {} message: {}", envelope.msg_type, e);
            false
        }
    }
}

async fn stream_input(shared: &SessionShared, timeouts: SendTimeouts, mut source: InputSource) {
    if !source.is_stream() {
        debug!(trx = %shared.trx, "Text input travels with init, nothing to stream");
        return;
    }
    if !wait_listening(shared, timeouts, "audio").await {
        return;
    }
    let Some(connection) = shared.connection.get().cloned() else {
        return;
    };

    info!(trx = %shared.trx, "Streaming audio...");
    let mut frames = 0usize;
    loop {
        if !connection.is_open() {
            info!(trx = %shared.trx, "Connection closed after {} audio frames", frames);
            return;
        }
        match source.next_chunk().await {
            Ok(Some(chunk)) => {
                if let Err(e) = connection.send_binary(chunk).await {
                    error!(trx = %shared.trx, "Error sending audio: {}", e);
                    return;
                }
                if frames == 0 {
                    shared.state.advance(SessionState::Streaming);
                }
                frames += 1;
            }
            Ok(None) => break,
            Err(e) => {
                error!(trx = %shared.trx, "Error reading audio: {}", e);
                return;
            }
        }
    }

    debug!(trx = %shared.trx, "Audio exhausted after {} frames", frames);
    match Envelope::with_payload(&shared.trx, MessageType::EndOfStream, &EndOfStream::normal()) {
        Ok(envelope) => {
            send_envelope(shared, envelope).await;
        }
        Err(e) => error!(trx = %shared.trx, "Failed to build endOfStream message: {}", e),
    }
}
