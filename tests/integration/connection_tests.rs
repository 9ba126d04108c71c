//! Integration tests for the connection manager over the in-memory broker.

use crate::mock_hw::MockBoard;

use plantcare::adapters::mqtt::SimBroker;
use plantcare::app::ports::BrokerPort;
use plantcare::config::{RetryPolicy, SystemConfig};
use plantcare::connection::{ConnectionManager, ConnectionState};
use plantcare::error::{CommsError, ConnectError};

const KEEPALIVE_MS: u32 = 120_000;

fn manager(policy: RetryPolicy) -> ConnectionManager<SimBroker> {
    ConnectionManager::new(SimBroker::new(), policy, KEEPALIVE_MS)
}

#[test]
fn bounded_policy_backs_off_then_gives_up() {
    let mut mgr = manager(RetryPolicy::Bounded {
        max_attempts: 6,
        initial_delay_ms: 5_000,
        max_delay_ms: 60_000,
    });
    mgr.broker_mut().refuse_next(10, ConnectError::ServerUnavailable);
    let mut hw = MockBoard::new();

    assert_eq!(
        mgr.ensure_connected(&mut hw),
        Err(CommsError::RetriesExhausted { attempts: 6 })
    );
    assert_eq!(hw.delays, vec![5_000, 10_000, 20_000, 40_000, 60_000]);
    assert_eq!(mgr.broker().connect_attempts, 6);
    // Every failed attempt tears the session down.
    assert_eq!(mgr.broker().disconnects, 6);
    assert_eq!(mgr.state(), ConnectionState::Disconnected);
}

#[test]
fn exhausted_manager_tries_again_on_next_call() {
    let mut mgr = manager(RetryPolicy::Bounded {
        max_attempts: 2,
        initial_delay_ms: 1_000,
        max_delay_ms: 1_000,
    });
    mgr.broker_mut().refuse_next(2, ConnectError::Timeout);
    let mut hw = MockBoard::new();

    assert!(mgr.ensure_connected(&mut hw).is_err());
    assert_eq!(mgr.ensure_connected(&mut hw), Ok(1));
    assert_eq!(mgr.attempts_total(), 3);
}

#[test]
fn default_policy_retries_without_limit() {
    let mut mgr = manager(SystemConfig::default().retry);
    mgr.broker_mut().refuse_next(100, ConnectError::ServerUnavailable);
    let mut hw = MockBoard::new();

    assert_eq!(mgr.ensure_connected(&mut hw), Ok(101));
    assert_eq!(hw.delays, vec![5_000; 100]);
    assert_eq!(mgr.state(), ConnectionState::Connected);
}

#[test]
fn forever_policy_uses_fixed_delay() {
    let mut mgr = manager(RetryPolicy::Forever { delay_ms: 5_000 });
    mgr.broker_mut().refuse_next(4, ConnectError::BadCredentials);
    let mut hw = MockBoard::new();

    assert_eq!(mgr.ensure_connected(&mut hw), Ok(5));
    assert_eq!(hw.delays, vec![5_000; 4]);
    assert_eq!(hw.now_ms, 20_000);
}

#[test]
fn first_ping_is_due_one_interval_after_boot() {
    let mut mgr = manager(RetryPolicy::Forever { delay_ms: 5_000 });
    let mut hw = MockBoard::new();
    mgr.ensure_connected(&mut hw).unwrap();

    hw.now_ms = 119_999;
    assert_eq!(mgr.keepalive(&hw), None);
    hw.now_ms = 120_000;
    assert_eq!(mgr.keepalive(&hw), Some(true));
    assert_eq!(mgr.last_ping_ms(), 120_000);
    assert_eq!(mgr.broker().pings, 1);
}

#[test]
fn keepalive_timestamp_advances_even_on_failure() {
    let mut mgr = manager(RetryPolicy::Forever { delay_ms: 5_000 });
    let mut hw = MockBoard::new();
    mgr.ensure_connected(&mut hw).unwrap();
    mgr.broker_mut().ping_ok = false;

    hw.now_ms = 130_000;
    assert_eq!(mgr.keepalive(&hw), Some(false));
    assert_eq!(mgr.last_ping_ms(), 130_000);
    assert!(!mgr.broker().is_connected());

    // Not due again until a full interval later.
    hw.now_ms = 200_000;
    assert_eq!(mgr.keepalive(&hw), None);
}

#[test]
fn publish_while_disconnected_never_reaches_broker() {
    let mut mgr = manager(RetryPolicy::Forever { delay_ms: 5_000 });
    assert_eq!(
        mgr.publish_value("plantcare/feeds/moisture", 2_048),
        Err(CommsError::NotConnected)
    );
    assert!(mgr.broker().published.is_empty());
}

#[test]
fn broker_drop_is_noticed_before_publishing() {
    let mut mgr = manager(RetryPolicy::Forever { delay_ms: 5_000 });
    let mut hw = MockBoard::new();
    mgr.ensure_connected(&mut hw).unwrap();
    mgr.broker_mut().drop_session();

    assert_eq!(
        mgr.publish_value("plantcare/feeds/dust", 0.0f32),
        Err(CommsError::NotConnected)
    );
    assert_eq!(mgr.state(), ConnectionState::Disconnected);
}

#[test]
fn polling_delivers_only_subscribed_commands_in_order() {
    let mut mgr = manager(RetryPolicy::Forever { delay_ms: 5_000 });
    mgr.subscribe("plantcare/feeds/turnonpump").unwrap();
    let broker = mgr.broker_mut();
    broker.deliver("plantcare/feeds/turnonpump", "1");
    broker.deliver("plantcare/feeds/elsewhere", "1");
    broker.deliver("plantcare/feeds/turnonpump", "0");

    let mut payloads = Vec::new();
    while let Some(cmd) = mgr.poll_command(100) {
        payloads.push(cmd.payload.to_string());
    }
    assert_eq!(payloads, vec!["1", "0"]);
}
