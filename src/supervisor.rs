//! Connectivity supervisor - the agent's state machine
//!
//! Runs the startup sequence and the steady-state telemetry loop on a single
//! logical thread of control: establish the link, establish the broker
//! session on top of it, then cycle sample -> encode -> publish, re-running
//! the recovery sequences whenever a health check fails. There is no
//! terminal state; the only exit is process death.
//!
//! Retry pacing is expressed as [`RetryPolicy`] values rather than bare
//! loops so the policies stay swappable and testable against a paused clock.

use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::link::{LinkDriver, LinkManager};
use crate::sensor::{guard_measurement, DistanceSensor};
use crate::session::{BrokerClient, SessionManager};
use crate::telemetry::{encode, TelemetryRecord};

/// Supervisor states.
///
/// One publish attempt is the transient sub-step of a `Ready` cycle; it has
/// no state of its own because the cycle never yields control mid-publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Booting,
    LinkDown,
    LinkUpSessionDown,
    Ready,
}

/// Retry pacing for one recovery sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempt cap; `None` retries forever
    pub max_attempts: Option<u32>,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn unbounded(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            delay,
        }
    }

    pub const fn bounded(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            delay,
        }
    }

    /// Whether another attempt is allowed after `attempts` failures.
    pub fn allows_another(&self, attempts: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts < max,
            None => true,
        }
    }
}

/// Pacing configuration for the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorPolicy {
    /// Link recovery: retry forever, back-to-back (each attempt already
    /// blocks for the manager's poll budget)
    pub link_retry: RetryPolicy,
    /// Session recovery: retry forever at a fixed 5 s cadence
    pub session_retry: RetryPolicy,
    /// Delay applied after each Ready-state publish cycle
    pub cycle_delay: Duration,
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self {
            link_retry: RetryPolicy::unbounded(Duration::ZERO),
            session_retry: RetryPolicy::unbounded(Duration::from_millis(5000)),
            cycle_delay: Duration::from_millis(1000),
        }
    }
}

impl SupervisorPolicy {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            link_retry: RetryPolicy::unbounded(Duration::ZERO),
            session_retry: RetryPolicy::unbounded(Duration::from_millis(
                config.mqtt.session_retry_ms,
            )),
            cycle_delay: Duration::from_millis(config.telemetry.cycle_ms),
        }
    }
}

/// The orchestrator: owns the managers, the sensor, and the current state.
pub struct Supervisor<D, B, S> {
    link: LinkManager<D>,
    session: SessionManager<B>,
    sensor: S,
    device_name: String,
    topic: String,
    policy: SupervisorPolicy,
    state: SupervisorState,
}

impl<D, B, S> Supervisor<D, B, S>
where
    D: LinkDriver,
    B: BrokerClient,
    S: DistanceSensor,
{
    pub fn new(
        link: LinkManager<D>,
        session: SessionManager<B>,
        sensor: S,
        device_name: String,
        topic: String,
        policy: SupervisorPolicy,
    ) -> Self {
        Self {
            link,
            session,
            sensor,
            device_name,
            topic,
            policy,
            state: SupervisorState::Booting,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Run forever. Only a bounded retry policy (used in tests) can make
    /// this return; with the default unbounded policies it never does.
    pub async fn run(&mut self) -> Result<(), AgentError> {
        info!(device = %self.device_name, topic = %self.topic, "supervisor starting");
        loop {
            self.step().await?;
        }
    }

    /// Advance the machine by one transition, or by one Ready cycle.
    pub async fn step(&mut self) -> Result<SupervisorState, AgentError> {
        match self.state {
            SupervisorState::Booting => {
                info!("booting, bringing the link up");
                self.state = SupervisorState::LinkDown;
            }
            SupervisorState::LinkDown => {
                self.recover_link().await?;
                self.state = SupervisorState::LinkUpSessionDown;
            }
            SupervisorState::LinkUpSessionDown => {
                self.recover_session().await?;
                self.state = SupervisorState::Ready;
            }
            SupervisorState::Ready => {
                self.ready_cycle().await;
            }
        }
        Ok(self.state)
    }

    /// Retry the link manager until a connect call succeeds.
    async fn recover_link(&mut self) -> Result<(), AgentError> {
        let mut attempts = 0u32;
        loop {
            match self.link.connect().await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    attempts += 1;
                    warn!(attempt = attempts, error = %e, "link connect attempt failed");
                    if !self.policy.link_retry.allows_another(attempts) {
                        return Err(AgentError::RetriesExhausted {
                            operation: "link connect",
                            attempts,
                        });
                    }
                    if !self.policy.link_retry.delay.is_zero() {
                        tokio::time::sleep(self.policy.link_retry.delay).await;
                    }
                }
            }
        }
    }

    /// Retry the session manager until a handshake succeeds, pacing attempts
    /// at the policy's fixed delay.
    async fn recover_session(&mut self) -> Result<(), AgentError> {
        let mut attempts = 0u32;
        loop {
            match self.session.connect().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempts += 1;
                    warn!(attempt = attempts, error = %e, "session connect attempt failed");
                    if !self.policy.session_retry.allows_another(attempts) {
                        return Err(AgentError::RetriesExhausted {
                            operation: "session connect",
                            attempts,
                        });
                    }
                    tokio::time::sleep(self.policy.session_retry.delay).await;
                }
            }
        }
    }

    /// One steady-state iteration: health checks, then sample -> encode ->
    /// publish, then the fixed inter-cycle delay.
    ///
    /// A failed health check transitions immediately with no publish and no
    /// cycle delay - recovery pacing takes over from there. A lost link
    /// invalidates the session even when the session has not separately
    /// noticed.
    async fn ready_cycle(&mut self) {
        if !self.link.is_connected() {
            warn!("link lost, rebuilding connectivity from scratch");
            self.state = SupervisorState::LinkDown;
            return;
        }
        if !self.session.is_connected() {
            warn!("broker session lost, re-running session recovery");
            self.state = SupervisorState::LinkUpSessionDown;
            return;
        }

        let reading = guard_measurement(&self.device_name, self.sensor.measure().await);
        if reading.valid {
            let record = TelemetryRecord {
                device: reading.device,
                distance_cm: reading.distance_cm,
            };
            match encode(&record) {
                Ok(payload) => {
                    match self.session.publish(&self.topic, payload.as_bytes()).await {
                        Ok(()) => {
                            info!(
                                topic = %self.topic,
                                distance_cm = record.distance_cm,
                                "telemetry published"
                            );
                        }
                        Err(e) => {
                            warn!(error = %e, "publish failed, next cycle will try again");
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "telemetry encoding failed, dropping reading");
                }
            }
        }

        tokio::time::sleep(self.policy.cycle_delay).await;
    }
}
