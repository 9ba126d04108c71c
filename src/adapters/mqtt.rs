//! MQTT broker adapter.
//!
//! Implements [`BrokerPort`] two ways:
//!
//! - **`target_os = "espidf"`**: [`EspBroker`] wraps `EspMqttClient`.
//!   The client's connection object is drained on a dedicated thread that
//!   forwards link status and subscribed messages over `std::sync::mpsc`
//!   channels; the main loop reads them with a timeout.
//! - **everywhere**: [`SimBroker`], an in-memory broker with scripted
//!   connect outcomes, used for host runs and the integration tests.

use std::collections::VecDeque;

use log::{debug, info};

use crate::app::commands::{RemoteCommand, TOPIC_CAP};
use crate::app::ports::BrokerPort;
use crate::error::{CommsError, ConnectError};

type Topic = heapless::String<TOPIC_CAP>;

fn topic_of(s: &str) -> Result<Topic, CommsError> {
    let mut t = Topic::new();
    t.push_str(s).map_err(|_| CommsError::TopicTooLong)?;
    Ok(t)
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF client
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::EspBroker;

#[cfg(target_os = "espidf")]
mod esp {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
    use std::time::Duration;

    use esp_idf_svc::mqtt::client::{
        EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS,
    };
    use log::{info, warn};

    use super::{Topic, topic_of};
    use crate::app::commands::RemoteCommand;
    use crate::app::ports::BrokerPort;
    use crate::config::BrokerConfig;
    use crate::error::{CommsError, ConnectError};

    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    const MAX_SUBSCRIPTIONS: usize = 4;

    #[derive(Debug, Clone, Copy)]
    enum LinkStatus {
        Up,
        Down,
        Failed,
    }

    pub struct EspBroker {
        config: BrokerConfig,
        client_id: heapless::String<32>,
        subscriptions: heapless::Vec<Topic, MAX_SUBSCRIPTIONS>,
        client: Option<EspMqttClient<'static>>,
        link: Arc<AtomicBool>,
        status_rx: Option<Receiver<LinkStatus>>,
        commands_tx: Sender<RemoteCommand>,
        commands_rx: Receiver<RemoteCommand>,
    }

    impl EspBroker {
        pub fn new(config: BrokerConfig, client_id: &str) -> Self {
            let (commands_tx, commands_rx) = mpsc::channel();
            let mut id = heapless::String::new();
            let _ = id.push_str(client_id);
            Self {
                config,
                client_id: id,
                subscriptions: heapless::Vec::new(),
                client: None,
                link: Arc::new(AtomicBool::new(false)),
                status_rx: None,
                commands_tx,
                commands_rx,
            }
        }

        fn spawn_pump(
            mut conn: EspMqttConnection,
            link: Arc<AtomicBool>,
            status_tx: Sender<LinkStatus>,
            commands_tx: Sender<RemoteCommand>,
        ) -> std::io::Result<()> {
            std::thread::Builder::new()
                .name("mqtt-rx".into())
                .stack_size(6 * 1024)
                .spawn(move || {
                    // Ends when the client is dropped and the connection closes.
                    while let Ok(event) = conn.next() {
                        match event.payload() {
                            EventPayload::Connected(_) => {
                                link.store(true, Ordering::Release);
                                let _ = status_tx.send(LinkStatus::Up);
                            }
                            EventPayload::Disconnected => {
                                link.store(false, Ordering::Release);
                                let _ = status_tx.send(LinkStatus::Down);
                            }
                            EventPayload::Received {
                                topic: Some(topic),
                                data,
                                ..
                            } => {
                                let _ = commands_tx.send(RemoteCommand::from_bytes(topic, data));
                            }
                            EventPayload::Error(e) => {
                                warn!("MQTT: transport error {:?}", e);
                                let _ = status_tx.send(LinkStatus::Failed);
                            }
                            _ => {}
                        }
                    }
                    link.store(false, Ordering::Release);
                })
                .map(|_| ())
        }
    }

    impl BrokerPort for EspBroker {
        fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
            let t = topic_of(topic)?;
            if !self.subscriptions.contains(&t) {
                self.subscriptions.push(t).map_err(|_| CommsError::SubscriptionsFull)?;
            }
            Ok(())
        }

        fn connect(&mut self) -> Result<(), ConnectError> {
            self.disconnect();

            let url = self.config.url();
            let conf = MqttClientConfiguration {
                client_id: Some(self.client_id.as_str()),
                username: Some(self.config.username.as_str()),
                password: Some(self.config.key.as_str()),
                // A session the client re-opened on its own would lack the
                // subscriptions; reconnects go through `connect()` instead.
                disable_auto_reconnect: true,
                ..Default::default()
            };
            let (client, conn) = EspMqttClient::new(url.as_str(), &conf).map_err(|e| {
                warn!("MQTT: client init failed: {:?}", e);
                ConnectError::Network
            })?;

            // Fresh flag per session: the previous rx thread may still be
            // winding down and will clear only its own.
            self.link = Arc::new(AtomicBool::new(false));
            let (status_tx, status_rx) = mpsc::channel();
            Self::spawn_pump(conn, self.link.clone(), status_tx, self.commands_tx.clone())
                .map_err(|_| ConnectError::Network)?;
            self.client = Some(client);

            let outcome = match status_rx.recv_timeout(CONNECT_TIMEOUT) {
                Ok(LinkStatus::Up) => Ok(()),
                Ok(LinkStatus::Down | LinkStatus::Failed) => Err(ConnectError::ServerUnavailable),
                Err(RecvTimeoutError::Timeout) => Err(ConnectError::Timeout),
                Err(RecvTimeoutError::Disconnected) => Err(ConnectError::Network),
            };
            self.status_rx = Some(status_rx);
            outcome?;

            if let Some(client) = self.client.as_mut() {
                for topic in &self.subscriptions {
                    if let Err(e) = client.subscribe(topic.as_str(), QoS::AtMostOnce) {
                        warn!("MQTT: subscribe '{}' failed: {:?}", topic, e);
                    }
                }
            }
            info!("MQTT: session up ({} subscriptions)", self.subscriptions.len());
            Ok(())
        }

        fn disconnect(&mut self) {
            // Dropping the client stops it and ends the rx thread.
            self.client = None;
            self.status_rx = None;
            self.link.store(false, Ordering::Release);
        }

        fn is_connected(&self) -> bool {
            self.client.is_some() && self.link.load(Ordering::Acquire)
        }

        /// The client keeps the session alive itself; a ping reports
        /// whether it still considers the link up.
        fn ping(&mut self) -> bool {
            if let Some(rx) = &self.status_rx {
                while let Ok(status) = rx.try_recv() {
                    if !matches!(status, LinkStatus::Up) {
                        self.link.store(false, Ordering::Release);
                    }
                }
            }
            self.is_connected()
        }

        fn publish(&mut self, topic: &str, payload: &str) -> Result<(), CommsError> {
            let client = self.client.as_mut().ok_or(CommsError::NotConnected)?;
            client
                .publish(topic, QoS::AtMostOnce, false, payload.as_bytes())
                .map(|_| ())
                .map_err(|e| {
                    warn!("MQTT: publish '{}' failed: {:?}", topic, e);
                    CommsError::PublishFailed
                })
        }

        fn read_subscription(&mut self, timeout_ms: u32) -> Option<RemoteCommand> {
            self.commands_rx
                .recv_timeout(Duration::from_millis(u64::from(timeout_ms)))
                .ok()
        }
    }
}

// ───────────────────────────────────────────────────────────────
// In-memory broker
// ───────────────────────────────────────────────────────────────

/// Scripted in-memory broker.
///
/// Connect attempts consume `connect_script` front to back; once it is
/// empty every attempt succeeds.  Inbound messages are only delivered on
/// subscribed topics, like a real broker.
#[derive(Debug, Default)]
pub struct SimBroker {
    pub connect_script: VecDeque<Result<(), ConnectError>>,
    pub ping_ok: bool,
    pub subscriptions: Vec<Topic>,
    pub published: Vec<(String, String)>,
    pub inbound: VecDeque<RemoteCommand>,
    pub connect_attempts: u32,
    pub pings: u32,
    pub disconnects: u32,
    connected: bool,
}

impl SimBroker {
    pub fn new() -> Self {
        Self {
            ping_ok: true,
            ..Self::default()
        }
    }

    /// Fail the next `n` connects with `err`.
    pub fn refuse_next(&mut self, n: usize, err: ConnectError) {
        self.connect_script.extend(std::iter::repeat_n(Err(err), n));
    }

    /// Queue a message as if the broker had delivered it.
    pub fn deliver(&mut self, topic: &str, payload: &str) {
        self.deliver_bytes(topic, payload.as_bytes());
    }

    /// Queue a raw, possibly non-UTF-8, payload.
    pub fn deliver_bytes(&mut self, topic: &str, payload: &[u8]) {
        self.inbound.push_back(RemoteCommand::from_bytes(topic, payload));
    }

    /// Drop the session from the broker side.
    pub fn drop_session(&mut self) {
        self.connected = false;
    }

    /// Payloads published to `topic`, oldest first.
    pub fn published_to(&self, topic: &str) -> Vec<&str> {
        self.published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.as_str())
            .collect()
    }
}

impl BrokerPort for SimBroker {
    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        let t = topic_of(topic)?;
        if !self.subscriptions.contains(&t) {
            self.subscriptions.push(t);
        }
        Ok(())
    }

    fn connect(&mut self) -> Result<(), ConnectError> {
        self.connect_attempts += 1;
        let outcome = self.connect_script.pop_front().unwrap_or(Ok(()));
        self.connected = outcome.is_ok();
        if self.connected {
            info!("sim-broker: connected");
        }
        outcome
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn ping(&mut self) -> bool {
        self.pings += 1;
        self.connected && self.ping_ok
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), CommsError> {
        if !self.connected {
            return Err(CommsError::NotConnected);
        }
        debug!("sim-broker: {} <- {}", topic, payload);
        self.published.push((topic.to_owned(), payload.to_owned()));
        Ok(())
    }

    fn read_subscription(&mut self, _timeout_ms: u32) -> Option<RemoteCommand> {
        while let Some(cmd) = self.inbound.pop_front() {
            if self.subscriptions.contains(&cmd.topic) {
                return Some(cmd);
            }
        }
        None
    }
}
