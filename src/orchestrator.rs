use crate::events::Event;
use crate::state::SatelliteState;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const MAX_MODE_HISTORY: usize = 32;
const MAX_EMITTED: usize = 1;

pub const SAFE_KP_THRESHOLD: f64 = 6.0;
pub const DOWNLINK_WINDOW_MINUTES: i64 = 10;
pub const DEFAULT_KP_INDEX: f64 = 1.0;

pub const COMMS_CAPABILITY: &str = "comms";
pub const IMAGING_CAPABILITY: &str = "imaging";

/// Events an orchestrator handler wants published, in order.
pub type Emitted = Vec<Event, MAX_EMITTED>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    Idle,
    Safe,
    Downlink,
    Imaging,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Idle => "IDLE",
            Mode::Safe => "SAFE",
            Mode::Downlink => "DOWNLINK",
            Mode::Imaging => "IMAGING",
        }
    }
}

impl core::fmt::Display for Mode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModeTransition {
    pub from: Mode,
    pub to: Mode,
    pub why: alloc::string::String,
}

/// Derives the operating mode from environment inputs and joined capabilities.
///
/// Rules, first match wins:
/// 1. `kp >= 6` → `SAFE`
/// 2. a pass within 10 minutes and a comms module → `DOWNLINK`
/// 3. an imaging module → `IMAGING`
/// 4. otherwise `IDLE`
///
/// The anomaly override forces `SAFE` outside these rules and is not
/// remembered; the next recompose may leave `SAFE` again.
#[derive(Debug)]
pub struct Orchestrator {
    mode: Mode,
    kp_index: f64,
    next_pass_minutes: Option<i64>,
    history: Vec<ModeTransition, MAX_MODE_HISTORY>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            mode: Mode::Idle,
            kp_index: DEFAULT_KP_INDEX,
            next_pass_minutes: None,
            history: Vec::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn kp_index(&self) -> f64 {
        self.kp_index
    }

    pub fn next_pass_minutes(&self) -> Option<i64> {
        self.next_pass_minutes
    }

    /// Recent mode transitions, oldest first.
    pub fn history(&self) -> &[ModeTransition] {
        &self.history
    }

    /// Route an event to its handler. Topics the orchestrator does not
    /// react to produce nothing.
    pub fn handle(&mut self, event: &Event, state: &SatelliteState) -> Emitted {
        match event {
            Event::ModuleJoined { module_id } => self.on_module_joined(module_id, state),
            Event::SpaceWeather { kp } => self.on_space_weather(*kp, state),
            Event::NextPass { minutes } => self.on_next_pass(*minutes, state),
            Event::Anomaly { signature } => self.on_anomaly(signature),
            _ => Emitted::new(),
        }
    }

    pub fn on_module_joined(&mut self, module_id: &str, state: &SatelliteState) -> Emitted {
        self.recompose(&alloc::format!("module joined: {module_id}"), state)
    }

    pub fn on_module_removed(&mut self, module_id: &str, state: &SatelliteState) -> Emitted {
        self.recompose(&alloc::format!("module removed: {module_id}"), state)
    }

    pub fn on_space_weather(&mut self, kp: f64, state: &SatelliteState) -> Emitted {
        self.kp_index = kp;
        self.recompose(&alloc::format!("space weather kp={kp:?}"), state)
    }

    pub fn on_next_pass(&mut self, minutes: i64, state: &SatelliteState) -> Emitted {
        self.next_pass_minutes = Some(minutes);
        self.recompose(&alloc::format!("next pass in {minutes} min"), state)
    }

    /// Notice to publish before the orchestrator reacts to `event`, while
    /// the mode still reflects the state that preceded it.
    pub fn announce(event: &Event) -> Option<Event> {
        match event {
            Event::Anomaly { signature } => Some(Event::log(alloc::format!(
                "Anomaly detected: {signature}. Entering SAFE MODE."
            ))),
            _ => None,
        }
    }

    /// Force `SAFE` regardless of the rules; always announces the change.
    pub fn on_anomaly(&mut self, signature: &str) -> Emitted {
        warn!("Anomaly detected: {}", signature);
        self.transition(Mode::Safe, "anomaly");

        let mut emitted = Emitted::new();
        let _ = emitted.push(Event::ModeChanged {
            mode: Mode::Safe,
            why: "anomaly".into(),
        });
        emitted
    }

    /// Mode the rules select for the current inputs.
    pub fn derive_mode(&self, state: &SatelliteState) -> Mode {
        if self.kp_index >= SAFE_KP_THRESHOLD {
            Mode::Safe
        } else if self
            .next_pass_minutes
            .is_some_and(|m| m <= DOWNLINK_WINDOW_MINUTES)
            && state.has_capability(COMMS_CAPABILITY)
        {
            Mode::Downlink
        } else if state.has_capability(IMAGING_CAPABILITY) {
            Mode::Imaging
        } else {
            Mode::Idle
        }
    }

    /// Re-derive the mode. Emits `MODE_CHANGED` only when it actually changes.
    pub fn recompose(&mut self, reason: &str, state: &SatelliteState) -> Emitted {
        let mut emitted = Emitted::new();
        let new_mode = self.derive_mode(state);
        if new_mode != self.mode {
            self.transition(new_mode, reason);
            let _ = emitted.push(Event::ModeChanged {
                mode: new_mode,
                why: reason.into(),
            });
        }
        emitted
    }

    fn transition(&mut self, to: Mode, why: &str) {
        info!("Mode {} -> {} ({})", self.mode, to, why);
        if self.history.is_full() {
            self.history.remove(0);
        }
        let _ = self.history.push(ModeTransition {
            from: self.mode,
            to,
            why: why.into(),
        });
        self.mode = to;
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}
