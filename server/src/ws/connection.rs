use axum::extract::ws::Message;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Why an outbound frame could not be queued for a connection.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SendError {
    #[error("connection is closed")]
    Closed,
    #[error("outbound queue is full")]
    QueueFull,
}

#[derive(Debug)]
struct Inner {
    id: Uuid,
    tx: mpsc::Sender<Message>,
    /// Identities this connection registered under via `init` frames.
    identities: Mutex<Vec<String>>,
}

/// Cloneable handle to one live WebSocket connection.
///
/// The writer task owns the receiving half of the bounded outbound queue.
/// Once it exits (socket closed or send failure) the receiver is dropped and
/// the handle reports itself closed.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    inner: Arc<Inner>,
}

impl ConnectionHandle {
    /// Create a handle and the receiver its writer task should drain.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                tx,
                identities: Mutex::new(Vec::new()),
            }),
        };
        (handle, rx)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Queue a frame without waiting. A full queue drops the new frame.
    pub fn send(&self, msg: Message) -> Result<(), SendError> {
        self.inner.tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Queue a text frame.
    pub fn send_text(&self, text: String) -> Result<(), SendError> {
        self.send(Message::Text(text.into()))
    }

    pub fn is_open(&self) -> bool {
        !self.inner.tx.is_closed()
    }

    /// Identities this handle is (or was) registered under.
    pub fn identities(&self) -> Vec<String> {
        match self.inner.identities.lock() {
            Ok(ids) => ids.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn bind_identity(&self, identity: &str) {
        let mut ids = match self.inner.identities.lock() {
            Ok(ids) => ids,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !ids.iter().any(|id| id == identity) {
            ids.push(identity.to_string());
        }
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ConnectionHandle {}

impl Hash for ConnectionHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}
