//! Broker connection manager.
//!
//! Keeps a publish/subscribe session to the telemetry broker alive from
//! inside the cooperative main loop:
//!
//! - [`ensure_connected`](ConnectionManager::ensure_connected) blocks and
//!   retries until the broker accepts, following the configured
//!   [`RetryPolicy`].  With `RetryPolicy::Forever` this can stall the whole
//!   controller indefinitely if the broker is unreachable.
//! - [`keepalive`](ConnectionManager::keepalive) pings at most once per
//!   keepalive interval.  A failed ping only disconnects; reconnecting is
//!   left to the next iteration's `ensure_connected`.

use core::fmt::Write as _;

use log::{error, info, warn};

use crate::app::commands::RemoteCommand;
use crate::app::ports::{BrokerPort, ClockPort};
use crate::config::RetryPolicy;
use crate::error::CommsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

pub struct ConnectionManager<B: BrokerPort> {
    broker: B,
    state: ConnectionState,
    policy: RetryPolicy,
    keepalive_interval_ms: u32,
    last_ping_ms: u64,
    /// Total connect attempts since boot.
    attempts_total: u32,
}

impl<B: BrokerPort> ConnectionManager<B> {
    pub fn new(broker: B, policy: RetryPolicy, keepalive_interval_ms: u32) -> Self {
        Self {
            broker,
            state: ConnectionState::Disconnected,
            policy,
            keepalive_interval_ms,
            last_ping_ms: 0,
            attempts_total: 0,
        }
    }

    /// Register a subscription with the broker before the first connect.
    pub fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        self.broker.subscribe(topic)?;
        info!("MQTT: subscribed to '{}'", topic);
        Ok(())
    }

    /// Connect if not already connected, blocking between attempts.
    ///
    /// Returns the number of attempts made (0 when already connected).
    pub fn ensure_connected(&mut self, clock: &mut impl ClockPort) -> Result<u32, CommsError> {
        self.refresh_state();
        if self.state == ConnectionState::Connected {
            return Ok(0);
        }

        info!("Connecting to MQTT... ");
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            self.attempts_total = self.attempts_total.saturating_add(1);

            match self.broker.connect() {
                Ok(()) => {
                    self.state = ConnectionState::Connected;
                    info!("MQTT Connected! ({} attempt(s))", attempts);
                    return Ok(attempts);
                }
                Err(e) => {
                    error!("MQTT: error code {} ({})", e.code(), e);
                    self.broker.disconnect();
                    self.state = ConnectionState::Disconnected;

                    if !self.policy.allows_retry(attempts) {
                        warn!("MQTT: giving up after {} attempts", attempts);
                        return Err(CommsError::RetriesExhausted { attempts });
                    }
                    let delay = self.policy.delay_after(attempts);
                    warn!("MQTT: retrying connection in {} ms", delay);
                    clock.delay_ms(delay);
                }
            }
        }
    }

    /// Ping once per keepalive interval; disconnect on failure.
    ///
    /// Returns `Some(alive)` when a ping was due, `None` otherwise.
    pub fn keepalive(&mut self, clock: &impl ClockPort) -> Option<bool> {
        let now = clock.uptime_ms();
        if now.saturating_sub(self.last_ping_ms) < u64::from(self.keepalive_interval_ms) {
            return None;
        }
        self.last_ping_ms = now;

        self.refresh_state();
        if self.state != ConnectionState::Connected {
            warn!("MQTT: keepalive due while disconnected");
            return Some(false);
        }

        let alive = self.broker.ping();
        if !alive {
            warn!("MQTT: ping failed, disconnecting");
            self.broker.disconnect();
            self.state = ConnectionState::Disconnected;
        }
        Some(alive)
    }

    /// Publish a numeric reading; refused without touching the broker
    /// while disconnected.
    pub fn publish_value(&mut self, topic: &str, value: impl core::fmt::Display) -> Result<(), CommsError> {
        if !self.is_connected() {
            return Err(CommsError::NotConnected);
        }
        let mut payload = heapless::String::<32>::new();
        write!(payload, "{value}").map_err(|_| CommsError::PayloadTooLong)?;
        self.broker.publish(topic, &payload)
    }

    /// One subscription poll, waiting at most `timeout_ms`.  The scheduler
    /// calls this until it returns `None`.
    pub fn poll_command(&mut self, timeout_ms: u32) -> Option<RemoteCommand> {
        self.broker.read_subscription(timeout_ms)
    }

    pub fn is_connected(&mut self) -> bool {
        self.refresh_state();
        self.state == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn last_ping_ms(&self) -> u64 {
        self.last_ping_ms
    }

    pub fn attempts_total(&self) -> u32 {
        self.attempts_total
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut B {
        &mut self.broker
    }

    /// The transport may drop the session on its own (TCP reset); mirror it.
    fn refresh_state(&mut self) {
        if self.state == ConnectionState::Connected && !self.broker.is_connected() {
            warn!("MQTT: session lost");
            self.state = ConnectionState::Disconnected;
        }
    }
}
