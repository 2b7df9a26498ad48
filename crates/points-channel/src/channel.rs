//! Live-update channel with fixed-interval reconnection.

use crate::message::{InboundMessage, OutboundMessage};
use crate::transport::{Connector, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Delay between losing a connection and the next attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Delay between opening a channel and its first connection attempt.
pub const DEFAULT_OPEN_DELAY: Duration = Duration::from_millis(100);

/// Connection state of a [`LiveUpdateChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Channel configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Push endpoint URL.
    pub url: String,
    /// Wait before each reconnection attempt.
    pub reconnect_delay: Duration,
    /// Wait before the very first connection attempt.
    pub open_delay: Duration,
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            open_delay: DEFAULT_OPEN_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }
}

/// Answers whether the owner of a channel still wants it connected.
///
/// Queried each time a connection is lost, right before deciding whether to
/// schedule another attempt.
pub trait Liveness: Send + Sync + 'static {
    fn is_live(&self) -> bool;
}

impl<F> Liveness for F
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    fn is_live(&self) -> bool {
        self()
    }
}

type UpdateFn = Box<dyn Fn(u64) + Send + Sync>;

/// Push channel bound to a single customer code.
///
/// A spawned task owns the connection and is the only writer of the channel
/// state; every `points_update` it receives is handed to the update callback
/// in arrival order. Dropping the handle closes the channel.
pub struct LiveUpdateChannel {
    customer_code: String,
    state: watch::Receiver<ChannelState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl LiveUpdateChannel {
    /// Open a channel for `customer_code`.
    ///
    /// Must be called from within a tokio runtime. Returns immediately; the
    /// first connection attempt happens after `config.open_delay`.
    pub fn open<L, F>(
        customer_code: impl Into<String>,
        config: ChannelConfig,
        connector: Arc<dyn Connector>,
        liveness: L,
        on_update: F,
    ) -> Self
    where
        L: Liveness,
        F: Fn(u64) + Send + Sync + 'static,
    {
        let customer_code = customer_code.into();
        let (state_tx, state_rx) = watch::channel(ChannelState::Disconnected);
        let cancel = CancellationToken::new();

        let worker = Worker {
            customer_code: customer_code.clone(),
            config,
            connector,
            liveness: Box::new(liveness),
            on_update: Box::new(on_update),
            state: state_tx,
            cancel: cancel.clone(),
        };

        info!(customer_code = %customer_code, url = %worker.config.url, "Opening push channel");
        let task = tokio::spawn(worker.run());

        Self {
            customer_code,
            state: state_rx,
            cancel,
            task: Some(task),
        }
    }

    pub fn customer_code(&self) -> &str {
        &self.customer_code
    }

    /// Current connection state.
    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Watch connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    /// Close the channel.
    ///
    /// Cancels any pending reconnection and terminates the transport. Does not
    /// wait for the connection task; use [`LiveUpdateChannel::shutdown`] for that.
    pub fn close(&mut self) {
        if !self.cancel.is_cancelled() {
            debug!(customer_code = %self.customer_code, "Closing push channel");
            self.cancel.cancel();
        }
    }

    /// Close the channel and wait until the transport has been released.
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Push channel task ended abnormally");
            }
        }
    }
}

impl Drop for LiveUpdateChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum ConnectionEnd {
    Lost,
    Cancelled,
}

struct Worker {
    customer_code: String,
    config: ChannelConfig,
    connector: Arc<dyn Connector>,
    liveness: Box<dyn Liveness>,
    on_update: UpdateFn,
    state: watch::Sender<ChannelState>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        if !self.config.open_delay.is_zero() {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.set_state(ChannelState::Disconnected);
                    return;
                }
                _ = sleep(self.config.open_delay) => {}
            }
        }

        loop {
            self.set_state(ChannelState::Connecting);

            let connected = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.connector.connect(&self.config.url) => result,
            };

            match connected {
                Ok(transport) => {
                    if let ConnectionEnd::Cancelled = self.serve(transport).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!(customer_code = %self.customer_code, error = %e, "Push channel connect failed");
                }
            }

            if self.cancel.is_cancelled() {
                break;
            }
            if !self.liveness.is_live() {
                info!(customer_code = %self.customer_code, "Owner no longer active, not reconnecting");
                break;
            }

            self.set_state(ChannelState::Reconnecting);
            info!(
                customer_code = %self.customer_code,
                delay = ?self.config.reconnect_delay,
                "Push channel lost, reconnecting"
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = sleep(self.config.reconnect_delay) => {}
            }
        }

        self.set_state(ChannelState::Disconnected);
        debug!(customer_code = %self.customer_code, "Push channel task finished");
    }

    async fn serve(&self, mut transport: Box<dyn Transport>) -> ConnectionEnd {
        self.set_state(ChannelState::Connected);
        info!(customer_code = %self.customer_code, "Push channel connected");

        let handshake = OutboundMessage::register(self.customer_code.as_str()).encode();
        let sent = match handshake {
            Ok(text) => transport.send(text).await,
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            warn!(customer_code = %self.customer_code, error = %e, "Push channel handshake failed");
            transport.close().await;
            return ConnectionEnd::Lost;
        }

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                next = transport.next_message() => Some(next),
            };

            match next {
                None => {
                    transport.close().await;
                    return ConnectionEnd::Cancelled;
                }
                Some(Some(Ok(text))) => self.handle_message(&text),
                Some(Some(Err(e))) => {
                    warn!(customer_code = %self.customer_code, error = %e, "Push channel transport error");
                    transport.close().await;
                    return ConnectionEnd::Lost;
                }
                Some(None) => {
                    info!(customer_code = %self.customer_code, "Push channel closed by peer");
                    return ConnectionEnd::Lost;
                }
            }
        }
    }

    fn handle_message(&self, text: &str) {
        match InboundMessage::decode(text) {
            Ok(Some(InboundMessage::PointsUpdate { points })) => {
                debug!(customer_code = %self.customer_code, points, "Points update received");
                (self.on_update)(points);
            }
            Ok(None) => debug!(message = %text, "Ignoring push message of unknown type"),
            Err(e) => warn!(error = %e, "Dropping undecodable push message"),
        }
    }

    fn set_state(&self, state: ChannelState) {
        self.state.send_replace(state);
    }
}
