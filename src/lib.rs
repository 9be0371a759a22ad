//! # Satellite OS
//!
//! Plug-and-play module admission and mode orchestration for a simulated
//! satellite bus.
//!
//! ## Features
//!
//! - **Module admission**: schema check, then compatibility and budget checks
//!   against the bus voltage, data protocol, power and thermal budgets
//! - **Quarantine**: every rejected descriptor is kept with its full list of reasons
//! - **Mode orchestration**: `IDLE`, `SAFE`, `DOWNLINK` and `IMAGING` derived
//!   from space weather, pass timing and joined capabilities
//! - **Event bus**: synchronous in-process publish/subscribe
//! - **Descriptor store**: JSON descriptors on disk with atomic saves
//!
//! ## Quick Start
//!
//! ```rust
//! use satos::{Event, Mode, SatelliteAgent};
//! use serde_json::json;
//!
//! let agent = SatelliteAgent::default();
//!
//! let outcome = agent.connect_module(&json!({
//!     "module_id": "CAM-001",
//!     "name": "Imager",
//!     "vendor": "Optics Co",
//!     "version": "1.0.0",
//!     "certified": true,
//!     "interfaces": {"power": {"bus_v": 28, "max_w": 12}, "data": {"protocol": "SpaceWire"}},
//!     "capabilities": [{"type": "imaging", "tag": "CAMERA"}],
//!     "constraints": {"thermal_w": 4}
//! }));
//! assert!(outcome.accepted);
//! assert_eq!(agent.mode(), Mode::Imaging);
//!
//! agent.publish(Event::SpaceWeather { kp: 7.0 });
//! assert_eq!(agent.mode(), Mode::Safe);
//! ```
//!
//! ## Architecture
//!
//! - [`registry`] - Descriptor validation, quarantine and join/remove bookkeeping
//! - [`state`] - The satellite's resource aggregate
//! - [`orchestrator`] - Mode derivation rules and the anomaly override
//! - [`bus`] / [`events`] - Publish/subscribe dispatcher and domain events
//! - [`agent`] - Wiring of the above and the public entry points
//! - [`store`] - Descriptor files on disk
//! - [`shell`] - Operator command parsing and execution

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]

extern crate alloc;

pub mod agent;
pub mod bus;
pub mod descriptor;
pub mod events;
pub mod limits;
pub mod orchestrator;
pub mod registry;
pub mod shell;
pub mod state;
pub mod store;

// Re-export main public types for convenience
pub use agent::{AgentError, SatelliteAgent};
pub use bus::EventBus;
pub use descriptor::ModuleDescriptor;
pub use events::{Event, Topic};
pub use limits::SatelliteLimits;
pub use orchestrator::{Mode, Orchestrator};
pub use registry::{JoinOutcome, JoinStatus, ModuleRegistry};
pub use state::SatelliteState;
pub use store::DescriptorStore;
