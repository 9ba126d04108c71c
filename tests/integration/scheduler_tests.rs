//! Integration tests for the scheduler tick against the mock board.
//!
//! Time is virtual: the rig advances the mock clock between iterations and
//! blocking steps (dust sampling, connect retries) advance it themselves.

use crate::mock_hw::Rig;

use plantcare::app::commands::PumpIntent;
use plantcare::app::events::AppEvent;
use plantcare::app::ports::{BrokerPort, Region, WallClock};
use plantcare::config::{RetryPolicy, SystemConfig};
use plantcare::error::ConnectError;
use plantcare::pump::{PumpPhase, PumpTrigger};

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 0.01
}

// ── Telemetry publish ─────────────────────────────────────────

#[test]
fn publish_is_gated_on_connection_and_always_rearms() {
    let config = SystemConfig {
        retry: RetryPolicy::Bounded {
            max_attempts: 1,
            initial_delay_ms: 1_000,
            max_delay_ms: 1_000,
        },
        ..SystemConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.broker().refuse_next(1_000, ConnectError::ServerUnavailable);

    rig.run_until(120_000, 1_000);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::PublishSkipped), 1);
    assert!(rig.broker().published.is_empty());
    assert_eq!(
        rig.scheduler.context().timers.publish.deadline_ms(),
        Some(240_000)
    );

    rig.broker().connect_script.clear();
    rig.run_until(240_000, 1_000);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::Telemetry(_))),
        1
    );
    assert_eq!(
        rig.scheduler.context().timers.publish.deadline_ms(),
        Some(360_000)
    );

    let topics = rig.scheduler.topics().clone();
    let broker = rig.broker();
    assert_eq!(broker.published_to(&topics.humidity), vec!["40"]);
    assert_eq!(broker.published_to(&topics.temperature), vec!["68"]);
    assert_eq!(broker.published_to(&topics.air_quality), vec!["321"]);
    assert_eq!(broker.published_to(&topics.moisture), vec!["1800"]);
    // The interrupt window closed at 31 s with no low time.
    assert_eq!(broker.published_to(&topics.dust), vec!["0.62"]);
}

#[test]
fn unsampled_dust_is_published_as_zero() {
    let config = SystemConfig {
        dust_initial_ms: 600_000,
        ..SystemConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.run_until(120_000, 1_000);

    let dust = rig.scheduler.topics().dust.clone();
    assert_eq!(rig.broker().published_to(&dust), vec!["0"]);
    assert!(!rig.scheduler.context().readings.dust_sampled());
}

// ── Auto-water ────────────────────────────────────────────────

fn blocking_rig(moisture: u16) -> Rig {
    let mut rig = Rig::new(SystemConfig::parity());
    rig.hw.moisture = moisture;
    // The dust cycle at 1 s blocks for the 30 s window.
    rig.run_until(1_000, 100);
    assert_eq!(rig.hw.now_ms, 31_000);
    rig
}

#[test]
fn moisture_at_threshold_does_not_water() {
    let rig = blocking_rig(2_500);
    assert!(rig.hw.pump_writes.is_empty());
    assert_eq!(rig.sink.dust_samples().len(), 1);
}

#[test]
fn moisture_above_threshold_waters_for_cutoff() {
    let mut rig = blocking_rig(2_501);
    assert_eq!(rig.hw.pump_writes, vec![(31_000, true)]);
    assert_eq!(rig.scheduler.pump().cutoff_deadline_ms(), Some(31_500));
    assert!(rig.sink.events.contains(&AppEvent::PumpChanged {
        on: true,
        trigger: PumpTrigger::AutoWater
    }));

    rig.step(499);
    assert!(rig.hw.pump_on());
    rig.step(1);
    assert_eq!(rig.hw.pump_writes, vec![(31_000, true), (31_500, false)]);
    assert_eq!(rig.scheduler.pump().phase(), PumpPhase::Idle);
}

fn interrupt_rig(moisture: u16) -> Rig {
    let mut rig = Rig::new(SystemConfig::default());
    rig.hw.moisture = moisture;
    // The window opens at 1 s and is collected by the poll at 31 s.
    rig.run_until(31_000, 100);
    assert_eq!(rig.sink.dust_samples().len(), 1);
    rig
}

#[test]
fn interrupt_sample_at_threshold_does_not_water() {
    let rig = interrupt_rig(2_500);
    assert!(rig.hw.pump_writes.is_empty());
    assert_eq!(rig.scheduler.pump().phase(), PumpPhase::Idle);
}

#[test]
fn interrupt_sample_above_threshold_waters() {
    let rig = interrupt_rig(2_501);
    assert_eq!(rig.hw.pump_writes, vec![(31_000, true)]);
    assert_eq!(rig.scheduler.pump().cutoff_deadline_ms(), Some(31_500));
}

#[test]
fn zero_padded_command_waters() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.run_until(2_000, 100);
    let padded = format!("{}1", "0".repeat(40));
    rig.command(&padded);
    rig.step(10);
    assert!(rig.hw.pump_on());
}

#[test]
fn non_utf8_tail_after_one_waters() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.run_until(2_000, 100);
    let topic = rig.scheduler.topics().pump.clone();
    rig.broker().deliver_bytes(&topic, b"1\xff");
    rig.step(10);
    assert!(rig.hw.pump_on());
    assert!(rig.sink.events.contains(&AppEvent::CommandReceived(PumpIntent::WaterNow)));
}

// ── Remote commands ───────────────────────────────────────────

#[test]
fn remote_stop_leaves_cutoff_pending() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.run_until(2_000, 100);

    rig.command("1");
    rig.step(10);
    assert!(rig.hw.pump_on());
    assert_eq!(rig.scheduler.pump().cutoff_deadline_ms(), Some(2_510));
    assert_eq!(rig.panel.row(Region::Pump), "Pump ON");

    rig.command("0");
    rig.step(100);
    assert!(!rig.hw.pump_on());
    assert_eq!(
        rig.scheduler.pump().phase(),
        PumpPhase::StoppedAwaitingCutoff
    );

    rig.step(399);
    assert_eq!(rig.hw.pump_levels(), vec![true, false]);
    rig.step(1);
    // Redundant OFF from the cutoff.
    assert_eq!(rig.hw.pump_levels(), vec![true, false, false]);
    assert!(rig.scheduler.context().refresh_pending);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::CommandReceived(_))),
        2
    );
    assert!(rig.sink.events.contains(&AppEvent::CommandReceived(PumpIntent::Stop)));
}

#[test]
fn cutoff_forces_a_full_repaint_next_iteration() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.run_until(2_000, 100);
    rig.command("1");
    rig.step(10);
    rig.step(500);
    assert!(rig.scheduler.context().refresh_pending);

    let reads = rig.hw.moisture_reads;
    rig.step(10);
    assert_eq!(rig.hw.moisture_reads, reads + 1);
    assert!(!rig.scheduler.context().refresh_pending);
    assert_eq!(rig.panel.row(Region::Pump), "Pump OFF");
}

#[test]
fn water_while_watering_is_ignored() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.run_until(2_000, 100);
    rig.command("1");
    rig.step(10);
    rig.command("1");
    rig.step(200);
    assert_eq!(rig.hw.pump_levels(), vec![true]);
    assert_eq!(rig.scheduler.pump().cutoff_deadline_ms(), Some(2_510));
}

#[test]
fn garbage_payload_stops_an_idle_pump() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.run_until(2_000, 100);
    rig.command("abc");
    rig.step(10);
    assert_eq!(rig.hw.pump_levels(), vec![false]);
    assert_eq!(rig.scheduler.pump().phase(), PumpPhase::Idle);

    rig.command("  1");
    rig.step(10);
    assert!(rig.hw.pump_on());
}

// ── Display ───────────────────────────────────────────────────

#[test]
fn button_clears_once_per_press() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.hw.button = true;
    rig.step(10);
    rig.step(10);
    rig.hw.button = false;
    rig.step(10);
    rig.hw.button = true;
    rig.step(10);

    assert_eq!(rig.panel.clears, 2);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::DisplayCleared), 2);
}

#[test]
fn clock_region_shows_wall_time_when_synced() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.run_until(100, 100);
    assert_eq!(rig.panel.row(Region::Clock), "Up 00:00:00");

    rig.hw.wall = Some(WallClock {
        hour: 9,
        minute: 5,
        second: 7,
    });
    rig.run_until(1_100, 100);
    assert_eq!(rig.panel.row(Region::Clock), "09:05:07");
}

#[test]
fn sensor_refresh_repaints_every_region() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.run_until(1_000, 100);
    assert_eq!(rig.panel.row(Region::Climate), "T 68.0F H 40.0%");
    assert_eq!(rig.panel.row(Region::AirQuality), "Air Quality = 321");
    assert_eq!(rig.panel.row(Region::Moisture), "Moisture 1800");
    assert_eq!(rig.panel.row(Region::Dust), "Dust 0.00");
    assert_eq!(rig.panel.row(Region::Pump), "Pump OFF");

    let reads = rig.hw.moisture_reads;
    rig.run_until(15_900, 100);
    assert_eq!(rig.hw.moisture_reads, reads);
    rig.step(100);
    assert_eq!(rig.hw.moisture_reads, reads + 1);
}

// ── Dust sampling ─────────────────────────────────────────────

#[test]
fn blocking_sample_shows_banner_and_stalls_the_loop() {
    let mut rig = Rig::new(SystemConfig::parity());
    rig.hw.pulse_low_us = 1_000;
    rig.run_until(1_000, 100);

    assert_eq!(rig.hw.now_ms, 31_000);
    assert!(rig
        .panel
        .writes
        .contains(&(Region::Dust, "Sampling dust".to_owned())));
    let samples = rig.sink.dust_samples();
    assert_eq!(samples.len(), 1);
    assert!(approx(samples[0], 517.92), "got {}", samples[0]);
    assert_eq!(
        rig.scheduler.context().timers.dust.deadline_ms(),
        Some(31_000 + 30 * 60 * 1_000)
    );
}

#[test]
fn interrupt_window_keeps_the_loop_ticking() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.hw.isr_low_us = 999;
    rig.run_until(1_000, 100);
    assert!(rig.scheduler.sampler().window_open());
    // Pulses seen before the window opened are discarded.
    assert_eq!(rig.hw.isr_low_us, 0);

    rig.hw.isr_low_us = 300_000;
    let clock_paints = rig.panel.writes_to(Region::Clock);
    rig.run_until(30_900, 100);
    assert!(rig.sink.dust_samples().is_empty());
    assert!(rig.panel.writes_to(Region::Clock) > clock_paints + 20);

    rig.step(100);
    let samples = rig.sink.dust_samples();
    assert_eq!(samples.len(), 1);
    assert!(approx(samples[0], 517.92), "got {}", samples[0]);
    assert!(approx(
        rig.scheduler.context().readings.dust_concentration,
        517.92
    ));
    assert!(!rig.scheduler.sampler().window_open());
}

// ── Connection ────────────────────────────────────────────────

#[test]
fn failed_ping_disconnects_and_next_iteration_reconnects() {
    let config = SystemConfig {
        retry: RetryPolicy::Forever { delay_ms: 5_000 },
        ..SystemConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.broker().ping_ok = false;

    rig.run_until(120_000, 1_000);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::Disconnected), 1);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::PublishSkipped), 1);

    rig.step(1_000);
    assert_eq!(
        rig.sink.events.last(),
        Some(&AppEvent::Connected { attempts: 1 })
    );
    assert_eq!(rig.broker().connect_attempts, 2);
    assert_eq!(rig.broker().pings, 1);
}

#[test]
fn forever_retry_blocks_until_broker_accepts() {
    let config = SystemConfig {
        retry: RetryPolicy::Forever { delay_ms: 5_000 },
        ..SystemConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.broker().refuse_next(3, ConnectError::Network);
    rig.step(10);

    assert_eq!(rig.hw.delays, vec![5_000, 5_000, 5_000]);
    assert_eq!(rig.hw.now_ms, 15_010);
    assert!(rig
        .sink
        .events
        .contains(&AppEvent::Connected { attempts: 4 }));
}

#[test]
fn broker_side_drop_is_recovered() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.step(10);
    rig.broker().drop_session();
    rig.step(10);
    assert_eq!(rig.broker().connect_attempts, 2);
    assert!(rig.broker().is_connected());

    // The re-opened session still carries the pump feed.
    rig.run_until(2_000, 100);
    rig.command("1");
    rig.step(10);
    assert!(rig.hw.pump_on());
}
