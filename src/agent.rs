use crate::bus::EventBus;
use crate::events::{Event, EventError, Topic};
use crate::limits::{LimitsError, SatelliteLimits};
use crate::orchestrator::{Emitted, Mode, Orchestrator};
use crate::registry::{JoinOutcome, JoinStatus, ModuleRegistry};
use crate::store::{DescriptorStore, StoreError};
use serde_json::Value;
use std::cell::{Ref, RefCell};
use std::io::BufRead;
use std::rc::Rc;
use thiserror::Error;
use tracing::info;

/// Topics the orchestrator recomputes on.
const ORCHESTRATOR_TOPICS: [Topic; 4] = [
    Topic::ModuleJoined,
    Topic::SpaceWeather,
    Topic::NextPass,
    Topic::Anomaly,
];

/// The satellite OS: registry, orchestrator and the bus that connects them.
///
/// Everything runs on the caller's thread. Components are shared with bus
/// handlers through `Rc<RefCell<_>>`, and every borrow is released before
/// the resulting events are published, so handlers may call back into the
/// agent's read accessors.
pub struct SatelliteAgent {
    bus: EventBus,
    registry: Rc<RefCell<ModuleRegistry>>,
    orchestrator: Rc<RefCell<Orchestrator>>,
}

impl SatelliteAgent {
    pub fn new(limits: SatelliteLimits) -> Self {
        Self::with_observers(limits, |_| {})
    }

    /// Build an agent whose `observe` handlers are registered ahead of the
    /// orchestrator. They see each event before the mode change it causes,
    /// and see an anomaly's notice before the switch to `SAFE`.
    pub fn with_observers<F>(limits: SatelliteLimits, observe: F) -> Self
    where
        F: FnOnce(&EventBus),
    {
        let agent = Self {
            bus: EventBus::new(),
            registry: Rc::new(RefCell::new(ModuleRegistry::new(limits))),
            orchestrator: Rc::new(RefCell::new(Orchestrator::new())),
        };
        observe(&agent.bus);

        for topic in ORCHESTRATOR_TOPICS {
            let registry = Rc::clone(&agent.registry);
            let orchestrator = Rc::clone(&agent.orchestrator);
            agent.bus.subscribe(topic, move |bus, event| {
                if let Some(notice) = Orchestrator::announce(event) {
                    bus.publish(notice);
                }
                let emitted = orchestrator
                    .borrow_mut()
                    .handle(event, registry.borrow().state());
                publish_all(bus, emitted);
            });
        }

        agent
    }

    /// Attach a handler, e.g. for operator output. Handlers registered here
    /// run after the orchestrator for the topics it listens on.
    pub fn subscribe<F>(&self, topic: Topic, handler: F)
    where
        F: Fn(&EventBus, &Event) + 'static,
    {
        self.bus.subscribe(topic, handler);
    }

    pub fn publish(&self, event: Event) {
        self.bus.publish(event);
    }

    /// Decode an untyped payload and publish it.
    ///
    /// # Errors
    ///
    /// Returns [`EventError`] without publishing anything if the topic or
    /// payload is malformed.
    pub fn publish_payload(&self, topic: &str, payload: Value) -> Result<(), EventError> {
        let event = Event::from_payload(topic, payload)?;
        self.publish(event);
        Ok(())
    }

    /// Submit a descriptor document and announce the outcome on the bus.
    pub fn connect_module(&self, doc: &Value) -> JoinOutcome {
        let outcome = self.registry.borrow_mut().discover_and_join(doc);

        match outcome.status {
            JoinStatus::Joined => self.publish(Event::ModuleJoined {
                module_id: outcome.module_id.clone(),
            }),
            JoinStatus::QuarantinedSchema | JoinStatus::QuarantinedCompat => {
                self.publish(Event::ModuleQuarantined {
                    module_id: outcome.module_id.clone(),
                    status: outcome.status,
                    reasons: outcome.reasons.to_vec(),
                });
            }
            JoinStatus::AlreadyJoined => self.publish(Event::log(alloc::format!(
                "Module {} already joined; descriptor ignored",
                outcome.module_id
            ))),
        }

        outcome
    }

    /// Remove a joined module, announce it, and re-derive the mode.
    /// Returns `false` if the module was not joined.
    pub fn disconnect_module(&self, module_id: &str) -> bool {
        if !self.registry.borrow_mut().remove_module(module_id) {
            return false;
        }

        self.publish(Event::ModuleRemoved {
            module_id: module_id.to_string(),
        });
        let emitted = self
            .orchestrator
            .borrow_mut()
            .on_module_removed(module_id, self.registry.borrow().state());
        publish_all(&self.bus, emitted);
        true
    }

    /// Submit every descriptor in the store. Returns how many joined.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store directory cannot be listed.
    pub fn boot_from_store(&self, store: &DescriptorStore) -> Result<usize, StoreError> {
        let documents = store.load_all()?;
        info!(
            "Booting with {} descriptor(s) from {}",
            documents.len(),
            store.dir().display()
        );
        Ok(documents
            .iter()
            .filter(|doc| self.connect_module(doc).accepted)
            .count())
    }

    /// Publish each line of a JSON-lines event script. Blank lines and lines
    /// starting with `#` are skipped. Returns the number of events published.
    ///
    /// # Errors
    ///
    /// Stops at the first unreadable or malformed line.
    pub fn replay<R: BufRead>(&self, reader: R) -> Result<usize, AgentError> {
        let mut published = 0;
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            self.publish(Event::from_line(trimmed)?);
            published += 1;
        }
        Ok(published)
    }

    pub fn mode(&self) -> Mode {
        self.orchestrator.borrow().mode()
    }

    pub fn registry(&self) -> Ref<'_, ModuleRegistry> {
        self.registry.borrow()
    }

    pub fn orchestrator(&self) -> Ref<'_, Orchestrator> {
        self.orchestrator.borrow()
    }

    /// Operator-facing report: budgets, tags, membership, quarantine and mode.
    pub fn status_report(&self) -> String {
        let registry = self.registry.borrow();
        let orchestrator = self.orchestrator.borrow();
        let quarantined = if registry.quarantine().is_empty() {
            "(none)".to_string()
        } else {
            registry
                .quarantine()
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        };
        let next_pass = orchestrator
            .next_pass_minutes()
            .map_or_else(|| "unknown".to_string(), |m| alloc::format!("{m} min"));

        alloc::format!(
            "{}\nQuarantine IDs: {}\nMode: {} (kp={:?}, next pass: {})",
            registry.state().summary(),
            quarantined,
            orchestrator.mode(),
            orchestrator.kp_index(),
            next_pass,
        )
    }
}

impl Default for SatelliteAgent {
    fn default() -> Self {
        Self::new(SatelliteLimits::default())
    }
}

impl core::fmt::Debug for SatelliteAgent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SatelliteAgent")
            .field("bus", &self.bus)
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

fn publish_all(bus: &EventBus, emitted: Emitted) {
    for event in emitted {
        bus.publish(event);
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Event error: {0}")]
    Event(#[from] EventError),
    #[error("Limits error: {0}")]
    Limits(#[from] LimitsError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
