//! Pump controller: two trigger sources, one timed cutoff.
//!
//! The pump can be started by the soil-moisture check at the end of a dust
//! cycle or by a remote "water now" command.  Every ON transition arms the
//! cutoff timer; the cutoff is the only thing that returns the controller
//! to `Idle`.  A remote "stop" kills the relay immediately but leaves the
//! cutoff pending, so the later cutoff performs a redundant OFF and asks
//! for a display refresh.
//!
//! The behaviour is a tagged transition table rather than a set of flags:
//!
//! ```text
//!  phase \ trigger        │ AutoWater/RemoteWater │ RemoteStop              │ CutoffExpired
//!  ───────────────────────┼───────────────────────┼─────────────────────────┼──────────────────────
//!  Idle                   │ ON, arm ─▶ Watering   │ OFF ─▶ Idle             │ (not evaluated)
//!  Watering               │ ignored               │ OFF ─▶ StoppedAwaiting  │ OFF, refresh ─▶ Idle
//!  StoppedAwaitingCutoff  │ ON, arm ─▶ Watering   │ OFF ─▶ StoppedAwaiting  │ OFF, refresh ─▶ Idle
//! ```

use log::{debug, info};

use crate::app::ports::ActuatorPort;
use crate::timer::OneShotTimer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpPhase {
    /// Relay off, no cutoff pending.
    Idle,
    /// Relay on, cutoff pending.
    Watering,
    /// Relay forced off by a remote stop, cutoff still pending.
    StoppedAwaitingCutoff,
}

impl PumpPhase {
    pub const fn awaiting_cutoff(self) -> bool {
        matches!(self, Self::Watering | Self::StoppedAwaitingCutoff)
    }

    pub const fn pump_on(self) -> bool {
        matches!(self, Self::Watering)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpTrigger {
    /// Moisture above threshold when a dust cycle completed.
    AutoWater,
    /// Remote command with intent "water now".
    RemoteWater,
    /// Remote command with any other intent.
    RemoteStop,
    /// The cutoff timer reached readiness.
    CutoffExpired,
}

/// Side effects of a single transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: PumpPhase,
    /// Relay level to drive, if any.
    pub drive: Option<bool>,
    pub arm_cutoff: bool,
    /// Request an out-of-cadence full display repaint.
    pub refresh_display: bool,
}

impl Transition {
    const fn stay(phase: PumpPhase) -> Self {
        Self {
            next: phase,
            drive: None,
            arm_cutoff: false,
            refresh_display: false,
        }
    }

    const fn turn_on() -> Self {
        Self {
            next: PumpPhase::Watering,
            drive: Some(true),
            arm_cutoff: true,
            refresh_display: false,
        }
    }

    const fn force_off(next: PumpPhase) -> Self {
        Self {
            next,
            drive: Some(false),
            arm_cutoff: false,
            refresh_display: false,
        }
    }

    const fn cutoff() -> Self {
        Self {
            next: PumpPhase::Idle,
            drive: Some(false),
            arm_cutoff: false,
            refresh_display: true,
        }
    }
}

/// The transition table.  Pure: no timers, no I/O.
pub const fn transition(phase: PumpPhase, trigger: PumpTrigger) -> Transition {
    use PumpPhase::{Idle, StoppedAwaitingCutoff, Watering};
    use PumpTrigger::{AutoWater, CutoffExpired, RemoteStop, RemoteWater};

    match (phase, trigger) {
        (Idle | StoppedAwaitingCutoff, AutoWater | RemoteWater) => Transition::turn_on(),
        (Watering, AutoWater | RemoteWater) => Transition::stay(Watering),

        (Idle, RemoteStop) => Transition::force_off(Idle),
        (Watering | StoppedAwaitingCutoff, RemoteStop) => {
            Transition::force_off(StoppedAwaitingCutoff)
        }

        (Watering | StoppedAwaitingCutoff, CutoffExpired) => Transition::cutoff(),
        (Idle, CutoffExpired) => Transition::stay(Idle),
    }
}

/// Owns the pump phase and its cutoff timer.
pub struct PumpController {
    phase: PumpPhase,
    cutoff: OneShotTimer,
    cutoff_ms: u32,
    /// Uptime at the most recent ON transition.
    last_on_ms: Option<u64>,
}

impl PumpController {
    pub fn new(cutoff_ms: u32) -> Self {
        Self {
            phase: PumpPhase::Idle,
            cutoff: OneShotTimer::new(),
            cutoff_ms,
            last_on_ms: None,
        }
    }

    /// Apply one trigger and return what happened.
    pub fn handle(
        &mut self,
        trigger: PumpTrigger,
        now_ms: u64,
        hw: &mut impl ActuatorPort,
    ) -> Transition {
        let t = transition(self.phase, trigger);

        if let Some(on) = t.drive {
            hw.set_pump(on);
        }
        if t.arm_cutoff {
            self.cutoff.arm(now_ms, self.cutoff_ms);
            self.last_on_ms = Some(now_ms);
        }

        if t.next != self.phase {
            info!("Pump: {:?} -> {:?} ({:?})", self.phase, t.next, trigger);
        } else {
            debug!("Pump: {:?} stays on {:?}", self.phase, trigger);
        }
        self.phase = t.next;
        t
    }

    /// Fire `CutoffExpired` if a cutoff is pending and due.
    ///
    /// Returns the transition taken, or `None` when nothing was pending or
    /// the deadline has not yet passed.
    pub fn evaluate_cutoff(
        &mut self,
        now_ms: u64,
        hw: &mut impl ActuatorPort,
    ) -> Option<Transition> {
        if self.phase.awaiting_cutoff() && self.cutoff.is_ready(now_ms) {
            Some(self.handle(PumpTrigger::CutoffExpired, now_ms, hw))
        } else {
            None
        }
    }

    pub fn phase(&self) -> PumpPhase {
        self.phase
    }

    pub fn is_on(&self) -> bool {
        self.phase.pump_on()
    }

    pub fn awaiting_cutoff(&self) -> bool {
        self.phase.awaiting_cutoff()
    }

    /// Deadline of the pending cutoff, if one is armed.
    pub fn cutoff_deadline_ms(&self) -> Option<u64> {
        if self.phase.awaiting_cutoff() {
            self.cutoff.deadline_ms()
        } else {
            None
        }
    }

    pub fn last_on_ms(&self) -> Option<u64> {
        self.last_on_ms
    }

    pub fn cutoff_ms(&self) -> u32 {
        self.cutoff_ms
    }
}
