use crate::descriptor::{document_module_id, ModuleDescriptor};
use crate::limits::SatelliteLimits;
use crate::state::SatelliteState;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use static_assertions::const_assert_eq;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// One slot per compatibility rule; schema and duplicate rejections use one.
pub const MAX_REASONS: usize = 7;
const COMPATIBILITY_RULES: usize = 7;
const_assert_eq!(COMPATIBILITY_RULES, MAX_REASONS);

pub type Reasons = Vec<String, MAX_REASONS>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinStatus {
    Joined,
    QuarantinedSchema,
    QuarantinedCompat,
    AlreadyJoined,
}

impl JoinStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinStatus::Joined => "JOINED",
            JoinStatus::QuarantinedSchema => "QUARANTINED_SCHEMA",
            JoinStatus::QuarantinedCompat => "QUARANTINED_COMPAT",
            JoinStatus::AlreadyJoined => "ALREADY_JOINED",
        }
    }

    pub fn is_quarantine(self) -> bool {
        matches!(self, JoinStatus::QuarantinedSchema | JoinStatus::QuarantinedCompat)
    }
}

impl core::fmt::Display for JoinStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub module_id: String,
    pub accepted: bool,
    pub status: JoinStatus,
    pub reasons: Reasons,
}

impl JoinOutcome {
    fn joined(module_id: String) -> Self {
        Self {
            module_id,
            accepted: true,
            status: JoinStatus::Joined,
            reasons: Vec::new(),
        }
    }

    fn rejected(module_id: String, status: JoinStatus, reasons: Reasons) -> Self {
        Self {
            module_id,
            accepted: false,
            status,
            reasons,
        }
    }
}

/// A rejected document, kept verbatim alongside why it was rejected.
#[derive(Debug, Clone)]
pub struct QuarantineEntry {
    pub descriptor: Value,
    pub status: JoinStatus,
    pub reasons: alloc::vec::Vec<String>,
}

/// Admission control for plug-in modules.
///
/// Owns the [`SatelliteState`] and the quarantine. Every descriptor goes
/// through a schema check and then a compatibility/budget check; the first
/// failing phase decides the outcome.
#[derive(Debug)]
pub struct ModuleRegistry {
    state: SatelliteState,
    quarantine: BTreeMap<String, QuarantineEntry>,
}

impl ModuleRegistry {
    pub fn new(limits: SatelliteLimits) -> Self {
        Self {
            state: SatelliteState::new(limits),
            quarantine: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> &SatelliteState {
        &self.state
    }

    pub fn quarantine(&self) -> &BTreeMap<String, QuarantineEntry> {
        &self.quarantine
    }

    pub fn is_quarantined(&self, module_id: &str) -> bool {
        self.quarantine.contains_key(module_id)
    }

    /// Validate a descriptor document and either join it or quarantine it.
    pub fn discover_and_join(&mut self, doc: &Value) -> JoinOutcome {
        let module_id = document_module_id(doc).to_string();

        // A joined id must never also land in quarantine.
        if self.state.is_joined(&module_id) {
            warn!("Module {} already joined; descriptor ignored", module_id);
            let mut reasons = Reasons::new();
            let _ = reasons.push(alloc::format!("Module already joined: {}", module_id));
            return JoinOutcome::rejected(module_id, JoinStatus::AlreadyJoined, reasons);
        }

        let descriptor = match ModuleDescriptor::from_document(doc) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                let mut reasons = Reasons::new();
                let _ = reasons.push(e.to_string());
                return self.reject(doc, module_id, JoinStatus::QuarantinedSchema, reasons);
            }
        };

        let reasons = self.compatibility_check(&descriptor);
        if !reasons.is_empty() {
            return self.reject(doc, module_id, JoinStatus::QuarantinedCompat, reasons);
        }

        self.quarantine.remove(&module_id);
        self.state.admit(descriptor);
        info!(
            "Module {} joined (power {}W/{}W, thermal {}W/{}W)",
            module_id,
            self.state.used_power_w,
            self.state.limits.power_budget_w,
            self.state.used_thermal_w,
            self.state.limits.thermal_budget_w,
        );
        JoinOutcome::joined(module_id)
    }

    /// Remove a joined module and rebuild budgets and tags from what remains.
    /// Returns `false` without side effects if the module is not joined.
    pub fn remove_module(&mut self, module_id: &str) -> bool {
        if self.state.modules.remove(module_id).is_none() {
            return false;
        }
        self.state.recompute();
        info!("Module {} removed", module_id);
        true
    }

    fn reject(
        &mut self,
        doc: &Value,
        module_id: String,
        status: JoinStatus,
        reasons: Reasons,
    ) -> JoinOutcome {
        warn!("Module {} quarantined ({}): {:?}", module_id, status, reasons);
        self.quarantine.insert(
            module_id.clone(),
            QuarantineEntry {
                descriptor: doc.clone(),
                status,
                reasons: reasons.to_vec(),
            },
        );
        JoinOutcome::rejected(module_id, status, reasons)
    }

    /// Evaluate every compatibility rule against the pre-join state.
    fn compatibility_check(&self, desc: &ModuleDescriptor) -> Reasons {
        let mut reasons = Reasons::new();
        let lim = &self.state.limits;
        let power = &desc.interfaces.power;
        let constraints = &desc.constraints;

        if !desc.certified {
            let _ = reasons.push("Module not certified (zero-trust policy).".to_string());
        }

        if power.bus_v != Some(lim.power_bus_v) {
            let _ = reasons.push(alloc::format!(
                "Power bus mismatch: sat {}V vs module {}V",
                lim.power_bus_v,
                display_or_none(power.bus_v.as_ref()),
            ));
        }

        let protocol = desc.interfaces.data.protocol.as_deref();
        if protocol != Some(lim.data_protocol.as_str()) {
            let _ = reasons.push(alloc::format!(
                "Data protocol mismatch: sat {} vs module {}",
                lim.data_protocol,
                display_or_none(protocol),
            ));
        }

        let used_power = self.state.used_power_w;
        if !fits_budget(used_power, power.max_w, lim.power_budget_w) {
            let _ = reasons.push(alloc::format!(
                "Power budget exceeded: used {}W + {}W > {}W",
                used_power, power.max_w, lim.power_budget_w,
            ));
        }

        let used_thermal = self.state.used_thermal_w;
        if !fits_budget(used_thermal, constraints.thermal_w, lim.thermal_budget_w) {
            let _ = reasons.push(alloc::format!(
                "Thermal budget exceeded: used {}W + {}W > {}W",
                used_thermal, constraints.thermal_w, lim.thermal_budget_w,
            ));
        }

        let tags = &self.state.tags_present;
        let missing: alloc::vec::Vec<&String> = constraints.requires.difference(tags).collect();
        if !missing.is_empty() {
            let _ = reasons.push(alloc::format!(
                "Missing required capabilities/tags: {:?}",
                missing
            ));
        }

        let conflicting: alloc::vec::Vec<&String> =
            constraints.conflicts.intersection(tags).collect();
        if !conflicting.is_empty() {
            let _ = reasons.push(alloc::format!(
                "Conflicts with present tags: {:?}",
                conflicting
            ));
        }

        reasons
    }
}

/// An overflowing sum never fits.
fn fits_budget(used: i64, draw: i64, budget: i64) -> bool {
    used.checked_add(draw).is_some_and(|total| total <= budget)
}

fn display_or_none<T: core::fmt::Display>(value: Option<T>) -> alloc::string::String {
    value.map_or_else(|| "None".to_string(), |v| v.to_string())
}
