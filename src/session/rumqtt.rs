//! rumqttc-backed broker client
//!
//! One connect call performs one handshake: a fresh client and event loop
//! are created, the event loop is driven to the first CONNACK (or failure),
//! and the outcome is mapped onto the numeric status table in
//! [`super::BrokerStatus`]. After a successful handshake a background driver
//! keeps servicing the event loop for keepalive and records connection loss;
//! it never reconnects on its own - recovery sequencing belongs to the
//! supervisor.

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, ConnectionError, Event, MqttOptions, Packet, QoS};
use std::sync::atomic::{AtomicBool, AtomicI16, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BrokerClient, BrokerStatus};
use crate::config::MqttSection;

/// Raw status code while the session is healthy.
const STATUS_CONNECTED: i16 = 0;

/// Wall-clock budget for one handshake, TCP connect included.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RumqttBroker {
    options: MqttOptions,
    client: Option<AsyncClient>,
    connected: Arc<AtomicBool>,
    status: Arc<AtomicI16>,
    driver: Option<JoinHandle<()>>,
    shutdown: Option<watch::Sender<bool>>,
}

impl RumqttBroker {
    pub fn new(config: &MqttSection, username: Option<String>, password: Option<String>) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(60));
        if let Some(username) = username {
            options.set_credentials(username, password.unwrap_or_default());
        }

        Self {
            options,
            client: None,
            connected: Arc::new(AtomicBool::new(false)),
            status: Arc::new(AtomicI16::new(BrokerStatus::DisconnectedCleanly.code())),
            driver: None,
            shutdown: None,
        }
    }

    /// Stop the previous episode's driver task, if any.
    fn teardown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        self.client = None;
        self.connected.store(false, Ordering::SeqCst);
    }

    fn spawn_driver(&mut self, mut event_loop: rumqttc::EventLoop) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let connected = self.connected.clone();
        let status = self.status.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            debug!("broker driver shutting down");
                            break;
                        }
                    }
                    event = event_loop.poll() => {
                        match event {
                            Ok(event) => {
                                debug!(?event, "broker event");
                            }
                            Err(e) => {
                                warn!(error = %e, "broker connection lost");
                                connected.store(false, Ordering::SeqCst);
                                status.store(
                                    BrokerStatus::ConnectionLost.code(),
                                    Ordering::SeqCst,
                                );
                                break;
                            }
                        }
                    }
                }
            }
        });

        self.shutdown = Some(shutdown_tx);
        self.driver = Some(handle);
    }
}

#[async_trait]
impl BrokerClient for RumqttBroker {
    async fn connect(&mut self) -> bool {
        self.teardown();

        let (client, mut event_loop) = AsyncClient::new(self.options.clone(), 10);

        // Drive the fresh event loop to its first CONNACK or failure.
        let handshake = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => return Ok(ack.code),
                    Ok(_) => continue,
                    Err(e) => return Err(e),
                }
            }
        })
        .await;

        let status = match handshake {
            Ok(Ok(ConnectReturnCode::Success)) => {
                info!(
                    host = %self.options.broker_address().0,
                    port = self.options.broker_address().1,
                    "broker handshake accepted"
                );
                self.client = Some(client);
                self.connected.store(true, Ordering::SeqCst);
                self.status.store(STATUS_CONNECTED, Ordering::SeqCst);
                self.spawn_driver(event_loop);
                return true;
            }
            Ok(Ok(refusal)) => map_connack_refusal(refusal),
            Ok(Err(e)) => map_connection_error(&e),
            Err(_) => BrokerStatus::ConnectionTimeout,
        };

        self.status.store(status.code(), Ordering::SeqCst);
        false
    }

    fn state(&self) -> i16 {
        self.status.load(Ordering::SeqCst)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        if !self.is_connected() {
            return false;
        }
        match &self.client {
            Some(client) => client
                .publish(topic, QoS::AtMostOnce, false, payload.to_vec())
                .await
                .is_ok(),
            None => false,
        }
    }
}

impl Drop for RumqttBroker {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Map a CONNACK refusal onto the numeric status table.
fn map_connack_refusal(code: ConnectReturnCode) -> BrokerStatus {
    match code {
        ConnectReturnCode::RefusedProtocolVersion => BrokerStatus::BadProtocolVersion,
        ConnectReturnCode::BadClientId => BrokerStatus::BadClientId,
        ConnectReturnCode::ServiceUnavailable => BrokerStatus::ServerUnavailable,
        ConnectReturnCode::BadUserNamePassword => BrokerStatus::BadCredentials,
        ConnectReturnCode::NotAuthorized => BrokerStatus::Unauthorized,
        ConnectReturnCode::Success => BrokerStatus::Unknown(0),
    }
}

/// Map a transport-level handshake failure onto the numeric status table.
fn map_connection_error(error: &ConnectionError) -> BrokerStatus {
    match error {
        ConnectionError::ConnectionRefused(code) => map_connack_refusal(*code),
        _ => BrokerStatus::ConnectFailed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_section() -> MqttSection {
        MqttSection {
            host: "localhost".to_string(),
            port: 1883,
            topic: "garage_sensor".to_string(),
            client_id: "garage-esp32".to_string(),
            username_env: None,
            password_env: None,
            session_retry_ms: 5000,
        }
    }

    #[test]
    fn test_connack_refusal_mapping() {
        assert_eq!(
            map_connack_refusal(ConnectReturnCode::RefusedProtocolVersion),
            BrokerStatus::BadProtocolVersion
        );
        assert_eq!(
            map_connack_refusal(ConnectReturnCode::BadClientId),
            BrokerStatus::BadClientId
        );
        assert_eq!(
            map_connack_refusal(ConnectReturnCode::ServiceUnavailable),
            BrokerStatus::ServerUnavailable
        );
        assert_eq!(
            map_connack_refusal(ConnectReturnCode::BadUserNamePassword),
            BrokerStatus::BadCredentials
        );
        assert_eq!(
            map_connack_refusal(ConnectReturnCode::NotAuthorized),
            BrokerStatus::Unauthorized
        );
    }

    #[test]
    fn test_new_broker_starts_cleanly_disconnected() {
        let broker = RumqttBroker::new(&test_section(), None, None);
        assert!(!broker.is_connected());
        assert_eq!(
            BrokerStatus::from_code(broker.state()),
            BrokerStatus::DisconnectedCleanly
        );
    }

    #[tokio::test]
    async fn test_publish_without_session_fails() {
        let mut broker = RumqttBroker::new(&test_section(), None, None);
        assert!(!broker.publish("garage_sensor", b"{}").await);
    }
}
