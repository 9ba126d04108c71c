//! Main-loop scheduler.
//!
//! Owns every piece of controller state and runs one fixed-order pass per
//! main-loop iteration.  There is no task switching: each step either
//! returns promptly or blocks the whole loop (connect retries, a blocking
//! dust sample, the subscription poll timeout).
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      iterate()                               │
//! │                                                              │
//! │  1. refresh time ──▶ 2. ensure_connected + keepalive         │
//! │                                                              │
//! │  ┌──────────────────── tick() ─────────────────────────────┐ │
//! │  │ 3. status timer   ──▶ repaint clock                     │ │
//! │  │ 4. button edge    ──▶ clear display                     │ │
//! │  │ 5. sensor timer   ──▶ read sensors, repaint all         │ │
//! │  │    (or refresh flag)                                    │ │
//! │  │ 6. publish timer  ──▶ publish readings if connected     │ │
//! │  │ 7. dust timer     ──▶ sample / open window ─▶ auto-water│ │
//! │  │ 8. subscription   ──▶ remote commands ─▶ PumpController │ │
//! │  │ 9. pump cutoff    ──▶ OFF, request refresh              │ │
//! │  └─────────────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cadence timers are sticky: a step that finds its timer ready runs and
//! re-arms it from the current time, so a late iteration delays the next
//! deadline rather than firing twice.

use log::{debug, info, warn};

use crate::app::commands::{PumpIntent, RemoteCommand, TOPIC_CAP};
use crate::app::events::AppEvent;
use crate::app::ports::{ActuatorPort, BrokerPort, ClockPort, DisplayPort, EventSink, SensorPort};
use crate::config::{BrokerConfig, DustSampling, SystemConfig};
use crate::connection::ConnectionManager;
use crate::context::ControllerContext;
use crate::display::StatusView;
use crate::drivers::button::EdgeDetector;
use crate::error::{CommsError, Result};
use crate::pump::{PumpController, PumpTrigger, Transition};
use crate::sensors::particulate::ParticulateSampler;

type Topic = heapless::String<TOPIC_CAP>;

// ═══════════════════════════════════════════════════════════════
//  Feed topics
// ═══════════════════════════════════════════════════════════════

/// Fully-qualified topics, resolved once at construction.
#[derive(Debug, Clone)]
pub struct FeedTopics {
    pub pump: Topic,
    pub humidity: Topic,
    pub temperature: Topic,
    pub air_quality: Topic,
    pub moisture: Topic,
    pub dust: Topic,
}

impl FeedTopics {
    pub fn from_config(broker: &BrokerConfig) -> core::result::Result<Self, CommsError> {
        Ok(Self {
            pump: broker.topic(&broker.pump_feed)?,
            humidity: broker.topic(&broker.humidity_feed)?,
            temperature: broker.topic(&broker.temperature_feed)?,
            air_quality: broker.topic(&broker.air_quality_feed)?,
            moisture: broker.topic(&broker.moisture_feed)?,
            dust: broker.topic(&broker.dust_feed)?,
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

pub struct Scheduler<B: BrokerPort> {
    config: SystemConfig,
    ctx: ControllerContext,
    pump: PumpController,
    connection: ConnectionManager<B>,
    sampler: ParticulateSampler,
    view: StatusView,
    button: EdgeDetector,
    topics: FeedTopics,
}

impl<B: BrokerPort> Scheduler<B> {
    /// Validate the configuration, arm the cadence timers from `now_ms`
    /// and register the pump-command subscription.
    pub fn new(config: SystemConfig, broker: B, now_ms: u64) -> Result<Self> {
        config.validate()?;
        let topics = FeedTopics::from_config(&config.broker)?;

        let mut connection =
            ConnectionManager::new(broker, config.retry, config.keepalive_interval_ms);
        connection.subscribe(&topics.pump)?;

        info!(
            "Scheduler: dust sampling {:?}, water above {}, cutoff {} ms",
            config.dust_sampling, config.water_above_threshold, config.pump_cutoff_ms
        );

        Ok(Self {
            ctx: ControllerContext::new(&config, now_ms),
            pump: PumpController::new(config.pump_cutoff_ms),
            connection,
            sampler: ParticulateSampler::new(config.dust_window_ms, config.pulse_timeout_us),
            view: StatusView,
            button: EdgeDetector::new(),
            topics,
            config,
        })
    }

    /// One main-loop iteration.
    pub fn iterate(
        &mut self,
        hw: &mut (impl ClockPort + SensorPort + ActuatorPort),
        display: &mut impl DisplayPort,
        sink: &mut impl EventSink,
    ) {
        self.refresh_time(&*hw);
        self.maintain_connection(hw, sink);
        // Connecting may have blocked for a while.
        self.refresh_time(&*hw);
        self.tick(hw, display, sink);
        self.ctx.iterations = self.ctx.iterations.wrapping_add(1);
    }

    /// Steps 3–9: everything driven by the cadence timers and inbound
    /// commands.
    pub fn tick(
        &mut self,
        hw: &mut (impl ClockPort + SensorPort + ActuatorPort),
        display: &mut impl DisplayPort,
        sink: &mut impl EventSink,
    ) {
        self.step_status(display);
        self.step_button(hw, display, sink);
        self.step_sensors(hw, display);
        self.step_publish(sink);
        self.step_dust(hw, display, sink);
        self.step_commands(hw, display, sink);
        self.step_cutoff(hw, display, sink);
    }

    // ── Steps ─────────────────────────────────────────────────

    fn refresh_time(&mut self, clock: &impl ClockPort) {
        self.ctx.now_ms = clock.uptime_ms();
        self.ctx.wall_clock = clock.wall_clock();
    }

    fn maintain_connection(&mut self, hw: &mut impl ClockPort, sink: &mut impl EventSink) {
        let was_connected = self.connection.is_connected();

        match self.connection.ensure_connected(hw) {
            Ok(0) => {}
            Ok(attempts) => sink.emit(&AppEvent::Connected { attempts }),
            Err(e) => {
                warn!("Scheduler: running disconnected ({})", e);
                sink.emit(&AppEvent::Disconnected);
                return;
            }
        }

        if self.connection.keepalive(&*hw) == Some(false) && was_connected {
            sink.emit(&AppEvent::Disconnected);
        }
    }

    fn step_status(&mut self, display: &mut impl DisplayPort) {
        let now = self.ctx.now_ms;
        if !self.ctx.timers.status.is_ready(now) {
            return;
        }
        self.view.repaint_clock(display, self.ctx.wall_clock, now);
        self.ctx.timers.status.arm(now, self.config.status_refresh_ms);
    }

    fn step_button(
        &mut self,
        hw: &mut impl SensorPort,
        display: &mut impl DisplayPort,
        sink: &mut impl EventSink,
    ) {
        if self.button.update(hw.button_pressed()) {
            self.view.clear(display);
            sink.emit(&AppEvent::DisplayCleared);
        }
    }

    fn step_sensors(&mut self, hw: &mut impl SensorPort, display: &mut impl DisplayPort) {
        let now = self.ctx.now_ms;
        if !(self.ctx.timers.sensors.is_ready(now) || self.ctx.refresh_pending) {
            return;
        }

        let readings = &mut self.ctx.readings;
        readings.air_quality = hw.read_air_quality();
        readings.apply_climate(hw.read_climate());
        readings.moisture_raw = hw.read_moisture();
        debug!(
            "Sensors: {:.1}F {:.1}% aq={} moisture={}",
            readings.temperature_f,
            readings.humidity_pct,
            readings.air_quality,
            readings.moisture_raw
        );

        self.view.repaint_all(
            display,
            &self.ctx.readings,
            self.ctx.wall_clock,
            now,
            self.pump.is_on(),
        );
        self.ctx.refresh_pending = false;
        self.ctx.timers.sensors.arm(now, self.config.sensor_refresh_ms);
    }

    fn step_publish(&mut self, sink: &mut impl EventSink) {
        let now = self.ctx.now_ms;
        if !self.ctx.timers.publish.is_ready(now) {
            return;
        }

        if self.connection.is_connected() {
            let r = self.ctx.readings;
            let t = &self.topics;
            let results = [
                (t.humidity.as_str(), self.connection.publish_value(&t.humidity, r.humidity_pct)),
                (t.temperature.as_str(), self.connection.publish_value(&t.temperature, r.temperature_f)),
                (t.air_quality.as_str(), self.connection.publish_value(&t.air_quality, r.air_quality)),
                (t.moisture.as_str(), self.connection.publish_value(&t.moisture, r.moisture_raw)),
                (t.dust.as_str(), self.connection.publish_value(&t.dust, r.dust_concentration)),
            ];
            for (topic, result) in results {
                if let Err(e) = result {
                    warn!("Publish to '{}' failed: {}", topic, e);
                }
            }
            sink.emit(&AppEvent::Telemetry(r.telemetry()));
        } else {
            warn!("Publish skipped: broker disconnected");
            sink.emit(&AppEvent::PublishSkipped);
        }

        self.ctx.timers.publish.arm(now, self.config.publish_interval_ms);
    }

    fn step_dust(
        &mut self,
        hw: &mut (impl ClockPort + SensorPort + ActuatorPort),
        display: &mut impl DisplayPort,
        sink: &mut impl EventSink,
    ) {
        let due = self.ctx.timers.dust.is_ready(self.ctx.now_ms);

        match self.config.dust_sampling {
            DustSampling::Blocking => {
                if !due {
                    return;
                }
                self.view.show_sampling_banner(display);
                let pcs = self.sampler.sample_blocking(hw);
                self.refresh_time(&*hw);
                self.ctx.timers.dust.arm(self.ctx.now_ms, self.config.dust_interval_ms);
                self.complete_dust_sample(pcs, hw, display, sink);
            }
            DustSampling::Interrupt => {
                if due {
                    if self.sampler.window_open() {
                        warn!("Dust: previous window still open, restarting");
                    }
                    self.sampler.begin(self.ctx.now_ms, hw);
                    self.ctx.timers.dust.arm(self.ctx.now_ms, self.config.dust_interval_ms);
                }
                if let Some(pcs) = self.sampler.poll(self.ctx.now_ms, hw) {
                    self.complete_dust_sample(pcs, hw, display, sink);
                }
            }
        }
    }

    fn complete_dust_sample(
        &mut self,
        concentration: f32,
        hw: &mut (impl ClockPort + ActuatorPort),
        display: &mut impl DisplayPort,
        sink: &mut impl EventSink,
    ) {
        self.ctx.readings.dust_concentration = concentration;
        sink.emit(&AppEvent::DustSampled { concentration });

        let moisture = self.ctx.readings.moisture_raw;
        if moisture > self.config.water_above_threshold {
            info!(
                "Soil dry ({} > {}), watering",
                moisture, self.config.water_above_threshold
            );
            self.drive_pump(PumpTrigger::AutoWater, hw, display, sink);
        } else {
            debug!("Soil moist enough ({})", moisture);
        }
    }

    fn step_commands(
        &mut self,
        hw: &mut (impl ClockPort + ActuatorPort),
        display: &mut impl DisplayPort,
        sink: &mut impl EventSink,
    ) {
        let timeout = self.config.subscription_poll_ms;
        while let Some(cmd) = self.connection.poll_command(timeout) {
            self.on_command(&cmd, hw, display, sink);
        }
    }

    fn on_command(
        &mut self,
        cmd: &RemoteCommand,
        hw: &mut (impl ClockPort + ActuatorPort),
        display: &mut impl DisplayPort,
        sink: &mut impl EventSink,
    ) {
        if cmd.topic != self.topics.pump {
            debug!("Ignoring message on '{}'", cmd.topic);
            return;
        }

        let intent = cmd.intent();
        debug!("Command payload {:?} -> {:?}", cmd.payload, intent);
        sink.emit(&AppEvent::CommandReceived(intent));

        let trigger = match intent {
            PumpIntent::WaterNow => PumpTrigger::RemoteWater,
            PumpIntent::Stop => PumpTrigger::RemoteStop,
        };
        self.drive_pump(trigger, hw, display, sink);
    }

    fn step_cutoff(
        &mut self,
        hw: &mut (impl ClockPort + ActuatorPort),
        display: &mut impl DisplayPort,
        sink: &mut impl EventSink,
    ) {
        let now = hw.uptime_ms();
        if let Some(t) = self.pump.evaluate_cutoff(now, hw) {
            self.after_transition(t, PumpTrigger::CutoffExpired, display, sink);
        }
    }

    /// Feed one trigger into the pump, timed at the current uptime so the
    /// cutoff runs for its full duration even after a blocking step.
    fn drive_pump(
        &mut self,
        trigger: PumpTrigger,
        hw: &mut (impl ClockPort + ActuatorPort),
        display: &mut impl DisplayPort,
        sink: &mut impl EventSink,
    ) {
        let now = hw.uptime_ms();
        let t = self.pump.handle(trigger, now, hw);
        self.after_transition(t, trigger, display, sink);
    }

    fn after_transition(
        &mut self,
        t: Transition,
        trigger: PumpTrigger,
        display: &mut impl DisplayPort,
        sink: &mut impl EventSink,
    ) {
        if let Some(on) = t.drive {
            self.view.show_pump(display, on);
            sink.emit(&AppEvent::PumpChanged { on, trigger });
        }
        if t.refresh_display {
            self.ctx.refresh_pending = true;
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn context(&self) -> &ControllerContext {
        &self.ctx
    }

    pub fn pump(&self) -> &PumpController {
        &self.pump
    }

    pub fn connection(&self) -> &ConnectionManager<B> {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut ConnectionManager<B> {
        &mut self.connection
    }

    pub fn sampler(&self) -> &ParticulateSampler {
        &self.sampler
    }

    pub fn topics(&self) -> &FeedTopics {
        &self.topics
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn button_presses(&self) -> u32 {
        self.button.presses()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
