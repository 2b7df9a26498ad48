//! Registration session state machine.

use crate::registrar::Registrar;
use points_channel::{ChannelConfig, ChannelState, Connector, LiveUpdateChannel};
use registration_client::{RegistrationError, RegistrationInput, RegistrationResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Where a session is in the registration flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Submitting,
    Active,
    Error,
}

/// Drives one trainer registration from submission to reset.
///
/// While `Active` the session owns exactly one [`LiveUpdateChannel`] bound to
/// the issued customer code. The channel task is the sole writer of the point
/// balance; the session only holds the read side. Every path that leaves
/// `Active` goes through the same teardown, which also runs on drop.
pub struct RegistrationSession {
    registrar: Arc<dyn Registrar>,
    connector: Arc<dyn Connector>,
    channel_config: ChannelConfig,
    state: watch::Sender<SessionState>,
    form: RegistrationInput,
    result: Option<RegistrationResult>,
    error: Option<String>,
    balance: Option<watch::Receiver<u64>>,
    channel: Option<LiveUpdateChannel>,
    // Liveness flag of the current Active episode, consulted by its channel
    live: Arc<AtomicBool>,
}

impl RegistrationSession {
    pub fn new(
        registrar: Arc<dyn Registrar>,
        connector: Arc<dyn Connector>,
        channel_config: ChannelConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);

        Self {
            registrar,
            connector,
            channel_config,
            state,
            form: RegistrationInput::default(),
            result: None,
            error: None,
            balance: None,
            channel: None,
            live: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions, `Submitting` included.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Input of the current or last submission; empty after a reset.
    pub fn form(&self) -> &RegistrationInput {
        &self.form
    }

    /// Text of the last submission failure.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn result(&self) -> Option<&RegistrationResult> {
        self.result.as_ref()
    }

    /// Identifier to render as a scannable code.
    pub fn customer_code(&self) -> Option<&str> {
        self.result.as_ref().map(|r| r.customer_code.as_str())
    }

    /// Current point balance while active.
    pub fn points(&self) -> Option<u64> {
        self.balance.as_ref().map(|rx| *rx.borrow())
    }

    /// Watch the point balance while active.
    pub fn watch_points(&self) -> Option<watch::Receiver<u64>> {
        self.balance.clone()
    }

    pub fn channel_state(&self) -> Option<ChannelState> {
        self.channel.as_ref().map(LiveUpdateChannel::state)
    }

    /// Watch the push channel's connection state while active.
    pub fn watch_channel_state(&self) -> Option<watch::Receiver<ChannelState>> {
        self.channel.as_ref().map(LiveUpdateChannel::subscribe_state)
    }

    /// Submit a registration.
    ///
    /// On success the session becomes `Active`, the balance is seeded with the
    /// registration's point total and a push channel is opened for the new
    /// customer code. On failure the session becomes `Error` and keeps the
    /// failure text for display. Calling this while already active closes the
    /// existing channel first.
    pub async fn submit(
        &mut self,
        input: RegistrationInput,
    ) -> Result<&RegistrationResult, RegistrationError> {
        if self.channel.is_some() {
            warn!("Submit while a registration is active; closing its channel");
            self.teardown();
        }

        self.result = None;
        self.balance = None;
        self.error = None;
        self.form = input;
        self.set_state(SessionState::Submitting);

        match self.registrar.register(&self.form).await {
            Ok(result) => {
                self.activate(&result);
                self.set_state(SessionState::Active);
                info!(
                    customer_code = %result.customer_code,
                    points = result.total_points,
                    "Registration active"
                );
                Ok(self.result.insert(result))
            }
            Err(e) => {
                warn!(error = %e, "Registration failed");
                self.error = Some(e.to_string());
                self.set_state(SessionState::Error);
                Err(e)
            }
        }
    }

    /// Return to `Idle`, closing the channel and clearing everything.
    ///
    /// No-op when already idle.
    pub fn reset(&mut self) {
        if self.state() == SessionState::Idle {
            return;
        }

        self.teardown();
        self.clear();
        info!("Session reset");
    }

    /// Reset and wait for the push connection to be released.
    pub async fn shutdown(mut self) {
        self.live.store(false, Ordering::Release);
        if let Some(channel) = self.channel.take() {
            channel.shutdown().await;
        }
        self.clear();
    }

    fn activate(&mut self, result: &RegistrationResult) {
        let (balance_tx, balance_rx) = watch::channel(result.total_points);

        let live = Arc::new(AtomicBool::new(true));
        let flag = live.clone();

        let channel = LiveUpdateChannel::open(
            result.customer_code.clone(),
            self.channel_config.clone(),
            self.connector.clone(),
            move || flag.load(Ordering::Acquire),
            move |points| {
                balance_tx.send_replace(points);
            },
        );

        self.live = live;
        self.balance = Some(balance_rx);
        self.channel = Some(channel);
    }

    fn teardown(&mut self) {
        self.live.store(false, Ordering::Release);
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
    }

    fn clear(&mut self) {
        self.result = None;
        self.balance = None;
        self.error = None;
        self.form = RegistrationInput::default();
        self.set_state(SessionState::Idle);
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }
}

impl Drop for RegistrationSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
