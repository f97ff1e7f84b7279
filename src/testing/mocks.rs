//! Mock implementations for testing
//!
//! Provides mock LinkDriver, BrokerClient, and DistanceSensor implementations
//! to enable comprehensive testing without radios, brokers, or hardware.
//! Mocks are cheaply cloneable; clones share state so a test can keep a
//! handle while the supervisor owns the mock.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicI16, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::link::{LinkDriver, LinkError};
use crate::sensor::{DistanceSensor, SensorError};
use crate::session::BrokerClient;

pub type PublishedMessage = (String, Vec<u8>);

/// Mock link driver for testing
#[derive(Clone)]
pub struct MockLinkDriver {
    begin_calls: Arc<AtomicU32>,
    /// Number of begin() calls that never come up
    fail_first: Arc<AtomicU32>,
    up: Arc<AtomicBool>,
    rssi: Arc<AtomicI32>,
    last_password: Arc<Mutex<Option<String>>>,
    connect_instants: Arc<Mutex<Vec<tokio::time::Instant>>>,
}

impl MockLinkDriver {
    /// Driver whose first begin() immediately associates.
    pub fn new() -> Self {
        Self::failing_first(0)
    }

    /// Driver that never associates.
    pub fn never_up() -> Self {
        Self::failing_first(u32::MAX)
    }

    /// Driver whose first `n` begin() calls never associate; the next one
    /// comes up immediately.
    pub fn failing_first(n: u32) -> Self {
        Self {
            begin_calls: Arc::new(AtomicU32::new(0)),
            fail_first: Arc::new(AtomicU32::new(n)),
            up: Arc::new(AtomicBool::new(false)),
            rssi: Arc::new(AtomicI32::new(-68)),
            last_password: Arc::new(Mutex::new(None)),
            connect_instants: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn begin_calls(&self) -> u32 {
        self.begin_calls.load(Ordering::SeqCst)
    }

    pub fn set_rssi(&self, rssi_dbm: i32) {
        self.rssi.store(rssi_dbm, Ordering::SeqCst);
    }

    /// Simulate mid-run link loss.
    pub fn drop_link(&self) {
        self.up.store(false, Ordering::SeqCst);
        // Further begin() calls associate again unless scripted otherwise.
    }

    pub fn last_password(&self) -> Option<String> {
        self.last_password
            .try_lock()
            .expect("mock not contended")
            .clone()
    }

    /// Paused-clock timestamps of every begin() call.
    pub async fn begin_instants(&self) -> Vec<tokio::time::Instant> {
        self.connect_instants.lock().await.clone()
    }
}

impl Default for MockLinkDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkDriver for MockLinkDriver {
    async fn begin(&mut self, _ssid: &str, password: Option<&str>) -> Result<(), LinkError> {
        let call = self.begin_calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_password.lock().await = password.map(str::to_string);
        self.connect_instants
            .lock()
            .await
            .push(tokio::time::Instant::now());
        let remaining_failures = self.fail_first.load(Ordering::SeqCst);
        self.up
            .store(call > remaining_failures, Ordering::SeqCst);
        Ok(())
    }

    fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        Some(Ipv4Addr::new(192, 168, 1, 77))
    }

    fn hardware_id(&self) -> [u8; 6] {
        [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x0f]
    }

    fn signal_strength(&self) -> i32 {
        self.rssi.load(Ordering::SeqCst)
    }
}

/// Mock broker client for testing
#[derive(Clone)]
pub struct MockBrokerClient {
    connect_calls: Arc<AtomicU32>,
    /// Number of connect() calls refused before one is accepted
    fail_first: Arc<AtomicU32>,
    /// Status code reported while refusing
    refusal_code: Arc<AtomicI16>,
    connected: Arc<AtomicBool>,
    status: Arc<AtomicI16>,
    fail_publishes: Arc<AtomicBool>,
    published: Arc<Mutex<Vec<PublishedMessage>>>,
    connect_instants: Arc<Mutex<Vec<tokio::time::Instant>>>,
}

impl MockBrokerClient {
    /// Broker that accepts the first handshake.
    pub fn new() -> Self {
        Self::failing_first(0, -2)
    }

    /// Broker that always refuses with the given status code.
    pub fn refusing_with(code: i16) -> Self {
        Self::failing_first(u32::MAX, code)
    }

    /// Broker refusing the first `n` handshakes with `code`, then accepting.
    pub fn failing_first(n: u32, code: i16) -> Self {
        Self {
            connect_calls: Arc::new(AtomicU32::new(0)),
            fail_first: Arc::new(AtomicU32::new(n)),
            refusal_code: Arc::new(AtomicI16::new(code)),
            connected: Arc::new(AtomicBool::new(false)),
            status: Arc::new(AtomicI16::new(-1)),
            fail_publishes: Arc::new(AtomicBool::new(false)),
            published: Arc::new(Mutex::new(Vec::new())),
            connect_instants: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Simulate mid-run session loss with the given status code.
    pub fn drop_session(&self, code: i16) {
        self.connected.store(false, Ordering::SeqCst);
        self.status.store(code, Ordering::SeqCst);
    }

    /// Make publishes fail while the session still reports connected.
    pub fn set_publish_failures(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().await.clone()
    }

    /// Paused-clock timestamps of every connect() call.
    pub async fn connect_instants(&self) -> Vec<tokio::time::Instant> {
        self.connect_instants.lock().await.clone()
    }
}

impl Default for MockBrokerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerClient for MockBrokerClient {
    async fn connect(&mut self) -> bool {
        let call = self.connect_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.connect_instants
            .lock()
            .await
            .push(tokio::time::Instant::now());
        if call > self.fail_first.load(Ordering::SeqCst) {
            self.connected.store(true, Ordering::SeqCst);
            self.status.store(0, Ordering::SeqCst);
            true
        } else {
            self.connected.store(false, Ordering::SeqCst);
            self.status
                .store(self.refusal_code.load(Ordering::SeqCst), Ordering::SeqCst);
            false
        }
    }

    fn state(&self) -> i16 {
        self.status.load(Ordering::SeqCst)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        if !self.is_connected() || self.fail_publishes.load(Ordering::SeqCst) {
            return false;
        }
        self.published
            .lock()
            .await
            .push((topic.to_string(), payload.to_vec()));
        true
    }
}

/// Mock distance sensor for testing
#[derive(Clone)]
pub struct MockSensor {
    /// Scripted measurements consumed in order; the last one repeats
    script: Arc<Mutex<VecDeque<Result<f64, String>>>>,
    fallback: f64,
    measure_calls: Arc<AtomicU32>,
}

impl MockSensor {
    /// Sensor that always reports the same distance.
    pub fn constant(cm: f64) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: cm,
            measure_calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Sensor that replays the scripted results, then repeats the fallback.
    pub fn scripted(script: Vec<Result<f64, String>>, fallback: f64) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            fallback,
            measure_calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn measure_calls(&self) -> u32 {
        self.measure_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DistanceSensor for MockSensor {
    async fn measure(&mut self) -> Result<f64, SensorError> {
        self.measure_calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().await.pop_front() {
            Some(Ok(cm)) => Ok(cm),
            Some(Err(fault)) => Err(SensorError::Fault(fault)),
            None => Ok(self.fallback),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_link_driver_fails_then_succeeds() {
        let mut driver = MockLinkDriver::failing_first(2);
        driver.begin("x", None).await.unwrap();
        assert!(!driver.is_up());
        driver.begin("x", None).await.unwrap();
        assert!(!driver.is_up());
        driver.begin("x", None).await.unwrap();
        assert!(driver.is_up());
        assert_eq!(driver.begin_calls(), 3);
    }

    #[tokio::test]
    async fn test_broker_refusal_script() {
        let mut broker = MockBrokerClient::failing_first(1, 3);
        assert!(!broker.connect().await);
        assert_eq!(broker.state(), 3);
        assert!(broker.connect().await);
        assert_eq!(broker.state(), 0);
        assert!(broker.is_connected());
    }

    #[tokio::test]
    async fn test_sensor_script_then_fallback() {
        let mut sensor =
            MockSensor::scripted(vec![Ok(10.0), Err("no echo".to_string())], 42.0);
        assert_eq!(sensor.measure().await.unwrap(), 10.0);
        assert!(sensor.measure().await.is_err());
        assert_eq!(sensor.measure().await.unwrap(), 42.0);
        assert_eq!(sensor.measure_calls(), 3);
    }
}
