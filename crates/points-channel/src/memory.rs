//! In-memory connector for driving channels without a network.
//!
//! [`memory_pair`] returns a [`MemoryConnector`] to hand to a channel and a
//! [`MemoryServer`] that receives one [`MemoryPeer`] per accepted connection.
//! The peer sees everything the client sends and can push messages, inject
//! transport errors, or hang up.

use crate::error::ChannelError;
use crate::transport::{Connector, Transport};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

type ServerFrame = Result<String, ChannelError>;

/// Create a connected connector/server pair.
pub fn memory_pair() -> (MemoryConnector, MemoryServer) {
    let (peers_tx, peers_rx) = mpsc::unbounded_channel();

    let connector = MemoryConnector {
        inner: Arc::new(Inner {
            peers: peers_tx,
            attempts: AtomicUsize::new(0),
            refusing: AtomicBool::new(false),
            urls: Mutex::new(Vec::new()),
        }),
    };

    (connector, MemoryServer { peers: peers_rx })
}

struct Inner {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    attempts: AtomicUsize,
    refusing: AtomicBool,
    urls: Mutex<Vec<String>>,
}

#[derive(Clone)]
pub struct MemoryConnector {
    inner: Arc<Inner>,
}

impl MemoryConnector {
    /// Connection attempts so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// URLs passed to every connection attempt, in order.
    pub fn urls(&self) -> Vec<String> {
        self.inner
            .urls
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }

    /// Refuse (or stop refusing) new connections.
    pub fn set_refusing(&self, refusing: bool) {
        self.inner.refusing.store(refusing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, ChannelError> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut urls) = self.inner.urls.lock() {
            urls.push(url.to_string());
        }

        if self.inner.refusing.load(Ordering::SeqCst) {
            return Err(ChannelError::Connect("connection refused".into()));
        }

        let (to_server_tx, to_server_rx) = mpsc::unbounded_channel();
        let (to_client_tx, to_client_rx) = mpsc::unbounded_channel();

        self.inner
            .peers
            .send(MemoryPeer {
                received: to_server_rx,
                outbound: Some(to_client_tx),
            })
            .map_err(|_| ChannelError::Connect("server is gone".into()))?;

        Ok(Box::new(MemoryTransport {
            to_server: Some(to_server_tx),
            from_server: to_client_rx,
        }))
    }
}

/// Accepts connections made through the paired [`MemoryConnector`].
pub struct MemoryServer {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryServer {
    /// Wait for the next connection.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.recv().await
    }

    /// Take a connection if one is already pending.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.peers.try_recv().ok()
    }
}

/// Server side of one in-memory connection.
pub struct MemoryPeer {
    received: mpsc::UnboundedReceiver<String>,
    outbound: Option<mpsc::UnboundedSender<ServerFrame>>,
}

impl MemoryPeer {
    /// Next message sent by the client; `None` once the client closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.received.recv().await
    }

    /// Push a text message to the client.
    pub fn push(&self, text: impl Into<String>) {
        if let Some(outbound) = &self.outbound {
            let _ = outbound.send(Ok(text.into()));
        }
    }

    /// Deliver a transport error to the client and drop the connection.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if let Some(outbound) = self.outbound.take() {
            let _ = outbound.send(Err(ChannelError::Transport(reason.into())));
        }
    }

    /// Close the connection from the server side.
    pub fn hang_up(&mut self) {
        self.outbound = None;
    }
}

struct MemoryTransport {
    to_server: Option<mpsc::UnboundedSender<String>>,
    from_server: mpsc::UnboundedReceiver<ServerFrame>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, text: String) -> Result<(), ChannelError> {
        let to_server = self.to_server.as_ref().ok_or(ChannelError::Closed)?;
        to_server
            .send(text)
            .map_err(|_| ChannelError::Transport("peer hung up".into()))
    }

    async fn next_message(&mut self) -> Option<Result<String, ChannelError>> {
        self.from_server.recv().await
    }

    async fn close(&mut self) {
        self.to_server = None;
        self.from_server.close();
    }
}
