//! Broker session lifecycle
//!
//! The session manager owns the application-level broker connection layered
//! on an established link. A connect call is exactly one handshake; pacing
//! and indefinite retry are the supervisor's policy. Failed handshakes are
//! classified through the broker's numeric status table so a remote operator
//! can tell a credentials problem from a flaky network without a debugger.

pub mod rumqtt;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

/// Broker status classification.
///
/// The numeric codes are the broker client's wire-visible status values and
/// must be preserved verbatim for compatibility with deployed tooling:
/// negative codes are transport-level outcomes, positive codes are CONNACK
/// refusals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerStatus {
    ConnectionTimeout,
    ConnectionLost,
    ConnectFailed,
    DisconnectedCleanly,
    BadProtocolVersion,
    BadClientId,
    ServerUnavailable,
    BadCredentials,
    Unauthorized,
    Unknown(i16),
}

impl BrokerStatus {
    /// Classify a raw broker status code.
    pub fn from_code(code: i16) -> Self {
        match code {
            -4 => BrokerStatus::ConnectionTimeout,
            -3 => BrokerStatus::ConnectionLost,
            -2 => BrokerStatus::ConnectFailed,
            -1 => BrokerStatus::DisconnectedCleanly,
            1 => BrokerStatus::BadProtocolVersion,
            2 => BrokerStatus::BadClientId,
            3 => BrokerStatus::ServerUnavailable,
            4 => BrokerStatus::BadCredentials,
            5 => BrokerStatus::Unauthorized,
            other => BrokerStatus::Unknown(other),
        }
    }

    /// The raw status code this classification came from.
    pub fn code(&self) -> i16 {
        match self {
            BrokerStatus::ConnectionTimeout => -4,
            BrokerStatus::ConnectionLost => -3,
            BrokerStatus::ConnectFailed => -2,
            BrokerStatus::DisconnectedCleanly => -1,
            BrokerStatus::BadProtocolVersion => 1,
            BrokerStatus::BadClientId => 2,
            BrokerStatus::ServerUnavailable => 3,
            BrokerStatus::BadCredentials => 4,
            BrokerStatus::Unauthorized => 5,
            BrokerStatus::Unknown(code) => *code,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BrokerStatus::ConnectionTimeout => "connection-timeout",
            BrokerStatus::ConnectionLost => "connection-lost",
            BrokerStatus::ConnectFailed => "connect-failed",
            BrokerStatus::DisconnectedCleanly => "disconnected-cleanly",
            BrokerStatus::BadProtocolVersion => "bad-protocol-version",
            BrokerStatus::BadClientId => "bad-client-id",
            BrokerStatus::ServerUnavailable => "server-unavailable",
            BrokerStatus::BadCredentials => "bad-credentials",
            BrokerStatus::Unauthorized => "unauthorized",
            BrokerStatus::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for BrokerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Session connect errors
#[derive(Debug, Error)]
#[error("broker connect failed: {status} (code {code})", status = .status, code = .status.code())]
pub struct SessionError {
    pub status: BrokerStatus,
}

/// Publish errors; reported, never retried within the same cycle
#[derive(Debug, Error)]
#[error("publish to '{topic}' failed: {status}")]
pub struct PublishError {
    pub topic: String,
    pub status: BrokerStatus,
}

/// Session connection state.
///
/// `last_failure` is meaningful only while `connected` is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionState {
    pub connected: bool,
    pub last_failure: Option<i16>,
}

/// External broker client collaborator.
///
/// Mirrors the primitives of a small embedded MQTT client: one-shot connect,
/// numeric status, fire-and-forget publish. Endpoint and credentials are
/// fixed at construction.
#[async_trait]
pub trait BrokerClient: Send {
    /// Attempt one broker handshake. The numeric status behind a `false` is
    /// read back through [`BrokerClient::state`].
    async fn connect(&mut self) -> bool;

    /// Raw broker status code (0 while connected).
    fn state(&self) -> i16;

    /// Cheap, non-blocking connection probe.
    fn is_connected(&self) -> bool;

    /// Publish a payload; `false` on any failure.
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> bool;
}

/// Owns the broker-session lifecycle for the agent.
pub struct SessionManager<B> {
    broker: B,
    state: SessionState,
}

impl<B: BrokerClient> SessionManager<B> {
    pub fn new(broker: B) -> Self {
        Self {
            broker,
            state: SessionState::default(),
        }
    }

    /// Attempt one broker handshake over the already-established link.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        if self.broker.connect().await {
            self.state = SessionState {
                connected: true,
                last_failure: None,
            };
            info!("broker session established");
            return Ok(());
        }

        let code = self.broker.state();
        let status = BrokerStatus::from_code(code);
        self.state = SessionState {
            connected: false,
            last_failure: Some(code),
        };
        warn!(code, status = %status, "broker handshake refused");
        Err(SessionError { status })
    }

    /// Cheap, non-blocking status probe.
    pub fn is_connected(&self) -> bool {
        self.broker.is_connected()
    }

    /// Publish one payload. Failures are classified and returned, not
    /// retried; the next sample cycle attempts again naturally.
    pub async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        if self.broker.publish(topic, payload).await {
            return Ok(());
        }
        let status = BrokerStatus::from_code(self.broker.state());
        Err(PublishError {
            topic: topic.to_string(),
            status,
        })
    }

    /// Outcome of the most recent handshake. For a live connectivity probe
    /// use [`SessionManager::is_connected`].
    pub fn state(&self) -> SessionState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::MockBrokerClient;

    #[test]
    fn test_status_table_is_verbatim() {
        let table = [
            (-4, BrokerStatus::ConnectionTimeout, "connection-timeout"),
            (-3, BrokerStatus::ConnectionLost, "connection-lost"),
            (-2, BrokerStatus::ConnectFailed, "connect-failed"),
            (-1, BrokerStatus::DisconnectedCleanly, "disconnected-cleanly"),
            (1, BrokerStatus::BadProtocolVersion, "bad-protocol-version"),
            (2, BrokerStatus::BadClientId, "bad-client-id"),
            (3, BrokerStatus::ServerUnavailable, "server-unavailable"),
            (4, BrokerStatus::BadCredentials, "bad-credentials"),
            (5, BrokerStatus::Unauthorized, "unauthorized"),
        ];
        for (code, status, label) in table {
            assert_eq!(BrokerStatus::from_code(code), status);
            assert_eq!(status.code(), code);
            assert_eq!(status.to_string(), label);
        }
    }

    #[test]
    fn test_unlisted_codes_map_to_unknown() {
        for code in [0, 6, -5, 42, i16::MIN] {
            let status = BrokerStatus::from_code(code);
            assert_eq!(status, BrokerStatus::Unknown(code));
            assert_eq!(status.code(), code);
            assert_eq!(status.to_string(), "unknown");
        }
    }

    #[tokio::test]
    async fn test_connect_success_updates_state() {
        let broker = MockBrokerClient::new();
        let mut session = SessionManager::new(broker);

        session.connect().await.expect("handshake should succeed");
        assert!(session.is_connected());
        assert_eq!(
            session.state(),
            SessionState {
                connected: true,
                last_failure: None
            }
        );
    }

    #[tokio::test]
    async fn test_connect_failure_is_classified() {
        let broker = MockBrokerClient::refusing_with(4);
        let mut session = SessionManager::new(broker);

        let err = session.connect().await.expect_err("handshake refused");
        assert_eq!(err.status, BrokerStatus::BadCredentials);
        assert_eq!(
            session.state(),
            SessionState {
                connected: false,
                last_failure: Some(4)
            }
        );
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_publish_failure_carries_topic_and_status() {
        let broker = MockBrokerClient::new();
        let handle = broker.clone();
        let mut session = SessionManager::new(broker);
        session.connect().await.unwrap();

        handle.drop_session(-3);
        let err = session
            .publish("garage_sensor", b"{}")
            .await
            .expect_err("publish should fail");
        assert_eq!(err.topic, "garage_sensor");
        assert_eq!(err.status, BrokerStatus::ConnectionLost);
    }

    #[tokio::test]
    async fn test_publish_records_payloads() {
        let broker = MockBrokerClient::new();
        let handle = broker.clone();
        let mut session = SessionManager::new(broker);
        session.connect().await.unwrap();

        session.publish("garage_sensor", b"hello").await.unwrap();
        let published = handle.published().await;
        assert_eq!(
            published,
            vec![("garage_sensor".to_string(), b"hello".to_vec())]
        );
    }
}
