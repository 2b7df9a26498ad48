//! Trainer registration session.
//!
//! Orchestrates submission through a [`Registrar`] and, once registered, keeps
//! the point balance live through a push channel keyed by the customer code:
//!
//! ```text
//! Idle ──submit──▶ Submitting ──ok──▶ Active ──reset──▶ Idle
//!                      │
//!                      └──err──▶ Error ──submit──▶ Submitting
//! ```

mod registrar;
mod session;

pub use registrar::Registrar;
pub use session::{RegistrationSession, SessionState};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use points_channel::memory::{memory_pair, MemoryConnector, MemoryPeer, MemoryServer};
    use points_channel::{ChannelConfig, ChannelState, DEFAULT_RECONNECT_DELAY};
    use registration_client::{RegistrationError, RegistrationInput, RegistrationResult};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    mock! {
        pub Registrar {}

        #[async_trait]
        impl Registrar for Registrar {
            async fn register(
                &self,
                input: &RegistrationInput,
            ) -> Result<RegistrationResult, RegistrationError>;
        }
    }

    const URL: &str = "ws://points.test/";

    fn ash() -> RegistrationInput {
        RegistrationInput::new("Ash", "ash@x.com", "555")
    }

    fn registered(code: &str, points: u64) -> RegistrationResult {
        RegistrationResult {
            customer_code: code.to_string(),
            wallet_url: "https://wallet/x".to_string(),
            total_points: points,
        }
    }

    fn create_session(registrar: MockRegistrar) -> (RegistrationSession, MemoryConnector, MemoryServer) {
        let (connector, server) = memory_pair();
        let session = RegistrationSession::new(
            Arc::new(registrar),
            Arc::new(connector.clone()),
            ChannelConfig::new(URL),
        );
        (session, connector, server)
    }

    fn registrar_returning(code: &'static str, points: u64) -> MockRegistrar {
        let mut registrar = MockRegistrar::new();
        registrar
            .expect_register()
            .returning(move |_| Ok(registered(code, points)));
        registrar
    }

    async fn accept_with_handshake(server: &mut MemoryServer, code: &str) -> MemoryPeer {
        let mut peer = server.accept().await.expect("connection");
        let handshake: serde_json::Value =
            serde_json::from_str(&peer.recv().await.expect("handshake")).unwrap();
        assert_eq!(
            handshake,
            serde_json::json!({"type": "register", "customerCode": code})
        );
        peer
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_while_idle_is_noop() {
        let (mut session, connector, _server) = create_session(MockRegistrar::new());
        let mut states = session.subscribe();

        session.reset();
        session.reset();

        assert_eq!(session.state(), SessionState::Idle);
        assert!(!states.has_changed().unwrap());
        assert!(session.result().is_none());
        assert!(session.points().is_none());
        assert_eq!(connector.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_success_activates_and_handshakes() {
        let mut registrar = MockRegistrar::new();
        registrar
            .expect_register()
            .withf(|input| input.name == "Ash" && input.email == "ash@x.com" && input.phone == "555")
            .times(1)
            .returning(|_| Ok(registered("TR-001", 0)));
        let (mut session, connector, mut server) = create_session(registrar);

        let result = session.submit(ash()).await.unwrap();
        assert_eq!(result.customer_code, "TR-001");

        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.points(), Some(0));
        assert_eq!(session.customer_code(), Some("TR-001"));
        assert_eq!(session.form(), &ash());
        assert!(session.error().is_none());

        let _peer = accept_with_handshake(&mut server, "TR-001").await;
        assert_eq!(session.channel_state(), Some(ChannelState::Connected));
        assert_eq!(connector.urls(), vec![URL.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_balance_seeded_before_any_push() {
        let (mut session, connector, _server) = create_session(registrar_returning("TR-010", 120));

        session.submit(ash()).await.unwrap();

        // The channel has not even attempted to connect yet
        assert_eq!(connector.attempts(), 0);
        assert_eq!(session.points(), Some(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_wallet_link_enters_error_without_channel() {
        let mut registrar = MockRegistrar::new();
        registrar
            .expect_register()
            .returning(|_| Err(RegistrationError::MissingWalletLink));
        let (mut session, connector, _server) = create_session(registrar);

        let err = session.submit(ash()).await.unwrap_err();

        assert!(matches!(err, RegistrationError::MissingWalletLink));
        assert_eq!(session.state(), SessionState::Error);
        assert_eq!(session.error(), Some(err.to_string().as_str()));
        assert!(session.result().is_none());
        assert!(session.points().is_none());
        assert!(session.channel_state().is_none());

        sleep(Duration::from_secs(10)).await;
        assert_eq!(connector.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_points_update_replaces_balance() {
        let (mut session, _connector, mut server) = create_session(registrar_returning("TR-001", 0));
        session.submit(ash()).await.unwrap();

        let peer = accept_with_handshake(&mut server, "TR-001").await;
        let mut points = session.watch_points().unwrap();

        peer.push(r#"{"type":"points_update","points":50}"#);
        points.wait_for(|p| *p == 50).await.unwrap();

        assert_eq!(session.points(), Some(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_points_update_wins() {
        let (mut session, _connector, mut server) = create_session(registrar_returning("TR-001", 0));
        session.submit(ash()).await.unwrap();

        let peer = accept_with_handshake(&mut server, "TR-001").await;
        let mut points = session.watch_points().unwrap();

        for value in [10, 200, 35, 90] {
            peer.push(format!(r#"{{"type":"points_update","points":{}}}"#, value));
        }
        peer.push(r#"{"type":"points_update","points":"oops"}"#);
        peer.push(r#"{"type":"points_update","points":7}"#);

        points.wait_for(|p| *p == 7).await.unwrap();
        assert_eq!(session.points(), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_close_reconnects_after_delay() {
        let (mut session, connector, mut server) = create_session(registrar_returning("TR-001", 0));
        session.submit(ash()).await.unwrap();

        let mut peer = accept_with_handshake(&mut server, "TR-001").await;
        let lost_at = Instant::now();
        peer.hang_up();

        let peer = accept_with_handshake(&mut server, "TR-001").await;
        assert!(lost_at.elapsed() >= DEFAULT_RECONNECT_DELAY);
        assert_eq!(connector.attempts(), 2);
        assert_eq!(session.state(), SessionState::Active);

        // Updates keep flowing on the new connection
        let mut points = session.watch_points().unwrap();
        peer.push(r#"{"type":"points_update","points":15}"#);
        points.wait_for(|p| *p == 15).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_closes_channel_for_good() {
        let (mut session, connector, mut server) = create_session(registrar_returning("TR-001", 40));
        session.submit(ash()).await.unwrap();
        let mut peer = accept_with_handshake(&mut server, "TR-001").await;

        session.reset();

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.form(), &RegistrationInput::default());
        assert!(session.result().is_none());
        assert!(session.points().is_none());
        assert!(session.error().is_none());
        assert!(session.channel_state().is_none());

        assert_eq!(peer.recv().await, None);
        sleep(DEFAULT_RECONNECT_DELAY * 3).await;
        assert_eq!(connector.attempts(), 1);
        assert!(server.try_accept().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_reconnect_wait() {
        let (mut session, connector, mut server) = create_session(registrar_returning("TR-001", 0));
        session.submit(ash()).await.unwrap();
        let mut peer = accept_with_handshake(&mut server, "TR-001").await;

        let mut channel_state = session.watch_channel_state().unwrap();
        peer.hang_up();
        channel_state
            .wait_for(|s| *s == ChannelState::Reconnecting)
            .await
            .unwrap();

        session.reset();

        sleep(DEFAULT_RECONNECT_DELAY * 2).await;
        assert_eq!(connector.attempts(), 1);
        assert!(server.try_accept().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubmit_after_error_clears_error() {
        let mut registrar = MockRegistrar::new();
        let mut seq = mockall::Sequence::new();
        registrar
            .expect_register()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(RegistrationError::Rejected("Email already registered".into())));
        registrar
            .expect_register()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(registered("TR-002", 5)));
        let (mut session, _connector, mut server) = create_session(registrar);

        assert!(session.submit(ash()).await.is_err());
        assert_eq!(session.state(), SessionState::Error);
        assert_eq!(session.error(), Some("Email already registered"));

        let retry = RegistrationInput::new("Ash", "ash+1@x.com", "555");
        session.submit(retry.clone()).await.unwrap();

        assert_eq!(session.state(), SessionState::Active);
        assert!(session.error().is_none());
        assert_eq!(session.form(), &retry);
        let _peer = accept_with_handshake(&mut server, "TR-002").await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_from_error_returns_to_idle() {
        let mut registrar = MockRegistrar::new();
        registrar
            .expect_register()
            .returning(|_| Err(RegistrationError::Rejected("nope".into())));
        let (mut session, _connector, _server) = create_session(registrar);

        let _ = session.submit(ash()).await;
        session.reset();

        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.error().is_none());
        assert_eq!(session.form(), &RegistrationInput::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_while_active_replaces_channel() {
        let mut registrar = MockRegistrar::new();
        let mut seq = mockall::Sequence::new();
        registrar
            .expect_register()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(registered("TR-001", 0)));
        registrar
            .expect_register()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(registered("TR-002", 10)));
        let (mut session, connector, mut server) = create_session(registrar);

        session.submit(ash()).await.unwrap();
        let mut first = accept_with_handshake(&mut server, "TR-001").await;

        session.submit(ash()).await.unwrap();
        assert_eq!(first.recv().await, None);

        let _second = accept_with_handshake(&mut server, "TR-002").await;
        assert_eq!(session.customer_code(), Some("TR-002"));
        assert_eq!(session.points(), Some(10));

        // The first channel never comes back
        sleep(DEFAULT_RECONNECT_DELAY * 3).await;
        assert_eq!(connector.attempts(), 2);
        assert!(server.try_accept().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_closes_channel() {
        let (mut session, connector, mut server) = create_session(registrar_returning("TR-001", 0));
        session.submit(ash()).await.unwrap();
        let mut peer = accept_with_handshake(&mut server, "TR-001").await;

        drop(session);

        assert_eq!(peer.recv().await, None);
        sleep(DEFAULT_RECONNECT_DELAY * 2).await;
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_connection() {
        let (mut session, _connector, mut server) = create_session(registrar_returning("TR-001", 0));
        session.submit(ash()).await.unwrap();
        let mut peer = accept_with_handshake(&mut server, "TR-001").await;

        session.shutdown().await;

        // Already closed by the time shutdown returns
        assert!(matches!(
            tokio::time::timeout(Duration::ZERO, peer.recv()).await,
            Ok(None)
        ));
    }
}
