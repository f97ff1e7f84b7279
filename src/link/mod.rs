//! Network link lifecycle
//!
//! The link manager owns one network connection episode at a time: it asks
//! the driver to join, polls status at a fixed cadence until the join
//! completes or the poll budget runs out, and produces a structured identity
//! report for the episode. It never retries across calls - indefinite retry
//! is the supervisor's policy, not the manager's.

pub mod host;
pub mod signal;

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{AuthMode, WifiSection};

pub use signal::SignalQuality;

/// Identity report for one connection episode.
///
/// Populated by a successful [`LinkManager::connect`]; read-only until the
/// next reconnect attempt replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkState {
    pub ssid: String,
    pub address: Ipv4Addr,
    pub hardware_id: [u8; 6],
    pub signal_strength: i32,
    pub connected: bool,
}

impl LinkState {
    /// Quality tier derived from the episode's signal strength.
    pub fn quality(&self) -> SignalQuality {
        SignalQuality::classify(self.signal_strength)
    }

    /// Colon-separated rendering of the hardware id.
    pub fn hardware_id_string(&self) -> String {
        let id = &self.hardware_id;
        format!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            id[0], id[1], id[2], id[3], id[4], id[5]
        )
    }
}

/// Link manager errors
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("link join did not complete within {polls} polls ({waited:?})")]
    Timeout { polls: u32, waited: Duration },
    #[error("link driver error: {0}")]
    Driver(String),
}

/// External network-link collaborator.
///
/// Mirrors the primitives a station-mode radio stack exposes: start a join,
/// report association status, and describe the association once up.
#[async_trait]
pub trait LinkDriver: Send {
    /// Begin joining the named network. Returns once the join is initiated;
    /// completion is observed through [`LinkDriver::is_up`].
    async fn begin(&mut self, ssid: &str, password: Option<&str>) -> Result<(), LinkError>;

    /// Cheap, non-blocking association probe.
    fn is_up(&self) -> bool;

    /// IPv4 address of the association, once up.
    fn local_address(&self) -> Option<Ipv4Addr>;

    /// Stable hardware identifier of the interface.
    fn hardware_id(&self) -> [u8; 6];

    /// Current signal strength in dBm.
    fn signal_strength(&self) -> i32;
}

/// Poll cadence for one connect call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between status polls
    pub interval: Duration,
    /// Status polls before the call gives up
    pub max_polls: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            max_polls: 20,
        }
    }
}

impl PollPolicy {
    pub fn from_config(wifi: &WifiSection) -> Self {
        Self {
            interval: Duration::from_millis(wifi.connect_poll_ms),
            max_polls: wifi.connect_poll_limit,
        }
    }

    /// Total time one connect call can block.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_polls
    }
}

/// Owns the network-link lifecycle for the agent.
pub struct LinkManager<D> {
    driver: D,
    ssid: String,
    auth_mode: AuthMode,
    password: Option<String>,
    policy: PollPolicy,
    state: Option<LinkState>,
}

impl<D: LinkDriver> LinkManager<D> {
    pub fn new(
        driver: D,
        ssid: String,
        auth_mode: AuthMode,
        password: Option<String>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            driver,
            ssid,
            auth_mode,
            password,
            policy,
            state: None,
        }
    }

    /// Attempt one bounded connect: initiate the join, then poll status at
    /// the policy cadence until the link is up or the poll budget runs out.
    ///
    /// On success the manager holds the episode's [`LinkState`] and logs the
    /// identity report. On timeout the caller decides whether to try again.
    pub async fn connect(&mut self) -> Result<&LinkState, LinkError> {
        self.state = None;
        info!(ssid = %self.ssid, auth_mode = %self.auth_mode, "joining network");
        let password = match self.auth_mode {
            AuthMode::Open => None,
            _ => self.password.as_deref(),
        };
        self.driver.begin(&self.ssid, password).await?;

        for poll in 1..=self.policy.max_polls {
            if self.driver.is_up() {
                let state = self.build_state();
                info!(
                    ssid = %state.ssid,
                    address = %state.address,
                    hardware_id = %state.hardware_id_string(),
                    signal_dbm = state.signal_strength,
                    quality = %state.quality(),
                    "link established"
                );
                self.state = Some(state);
                return Ok(self.state.as_ref().expect("state just stored"));
            }
            debug!(poll, max_polls = self.policy.max_polls, "link not up yet");
            tokio::time::sleep(self.policy.interval).await;
        }

        warn!(
            ssid = %self.ssid,
            waited = ?self.policy.budget(),
            "link join timed out"
        );
        Err(LinkError::Timeout {
            polls: self.policy.max_polls,
            waited: self.policy.budget(),
        })
    }

    /// Cheap, non-blocking status probe.
    pub fn is_connected(&self) -> bool {
        self.driver.is_up()
    }

    /// Identity report of the current episode, if one is established.
    pub fn state(&self) -> Option<&LinkState> {
        self.state.as_ref()
    }

    fn build_state(&self) -> LinkState {
        LinkState {
            ssid: self.ssid.clone(),
            address: self
                .driver
                .local_address()
                .unwrap_or(Ipv4Addr::UNSPECIFIED),
            hardware_id: self.driver.hardware_id(),
            signal_strength: self.driver.signal_strength(),
            connected: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::MockLinkDriver;

    fn manager(driver: MockLinkDriver) -> LinkManager<MockLinkDriver> {
        LinkManager::new(
            driver,
            "garage".to_string(),
            AuthMode::Open,
            None,
            PollPolicy::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_populates_state() {
        let driver = MockLinkDriver::new();
        let mut link = manager(driver.clone());

        let state = link.connect().await.expect("connect should succeed");
        assert!(state.connected);
        assert_eq!(state.ssid, "garage");
        assert_eq!(state.address, Ipv4Addr::new(192, 168, 1, 77));
        assert_eq!(state.hardware_id_string(), "aa:bb:cc:dd:ee:0f");
        assert_eq!(state.quality(), SignalQuality::VeryGood);
        assert_eq!(driver.begin_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_times_out_after_poll_budget() {
        let driver = MockLinkDriver::never_up();
        let mut link = manager(driver.clone());

        let started = tokio::time::Instant::now();
        let err = link.connect().await.expect_err("driver never comes up");
        assert!(matches!(err, LinkError::Timeout { polls: 20, .. }));
        // 20 polls at 500 ms each.
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        assert!(!link.is_connected());
        assert!(link.state().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manager_does_not_retry_across_calls() {
        let driver = MockLinkDriver::never_up();
        let mut link = manager(driver.clone());

        let _ = link.connect().await;
        let _ = link.connect().await;
        // One begin per connect call; retry belongs to the caller.
        assert_eq!(driver.begin_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_auth_sends_no_password() {
        let driver = MockLinkDriver::new();
        let mut link = LinkManager::new(
            driver.clone(),
            "garage".to_string(),
            AuthMode::Open,
            Some("ignored".to_string()),
            PollPolicy::default(),
        );
        link.connect().await.unwrap();
        assert_eq!(driver.last_password(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wpa_psk_sends_password() {
        let driver = MockLinkDriver::new();
        let mut link = LinkManager::new(
            driver.clone(),
            "garage".to_string(),
            AuthMode::WpaPsk,
            Some("hunter2".to_string()),
            PollPolicy::default(),
        );
        link.connect().await.unwrap();
        assert_eq!(driver.last_password(), Some("hunter2".to_string()));
    }
}
