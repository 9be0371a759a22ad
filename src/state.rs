use crate::descriptor::ModuleDescriptor;
use crate::limits::SatelliteLimits;
use std::collections::{BTreeMap, BTreeSet};

/// The satellite's live resource aggregate.
///
/// Only [`ModuleRegistry`](crate::registry::ModuleRegistry) mutates this; everyone
/// else gets a shared reference.
#[derive(Debug, Clone)]
pub struct SatelliteState {
    pub(crate) limits: SatelliteLimits,
    pub(crate) modules: BTreeMap<String, ModuleDescriptor>,
    pub(crate) tags_present: BTreeSet<String>,
    pub(crate) used_power_w: i64,
    pub(crate) used_thermal_w: i64,
}

impl SatelliteState {
    pub fn new(limits: SatelliteLimits) -> Self {
        Self {
            limits,
            modules: BTreeMap::new(),
            tags_present: BTreeSet::new(),
            used_power_w: 0,
            used_thermal_w: 0,
        }
    }

    pub fn limits(&self) -> &SatelliteLimits {
        &self.limits
    }

    pub fn modules(&self) -> &BTreeMap<String, ModuleDescriptor> {
        &self.modules
    }

    pub fn tags_present(&self) -> &BTreeSet<String> {
        &self.tags_present
    }

    pub fn used_power_w(&self) -> i64 {
        self.used_power_w
    }

    pub fn used_thermal_w(&self) -> i64 {
        self.used_thermal_w
    }

    pub fn is_joined(&self, module_id: &str) -> bool {
        self.modules.contains_key(module_id)
    }

    /// True if any joined module declares a capability of this type.
    pub fn has_capability(&self, kind: &str) -> bool {
        self.modules.values().any(|m| m.has_capability(kind))
    }

    pub(crate) fn admit(&mut self, descriptor: ModuleDescriptor) {
        self.used_power_w = self.used_power_w.saturating_add(descriptor.interfaces.power.max_w);
        self.used_thermal_w = self
            .used_thermal_w
            .saturating_add(descriptor.constraints.thermal_w);
        self.tags_present
            .extend(descriptor.tags().map(str::to_string));
        self.modules.insert(descriptor.module_id.clone(), descriptor);
    }

    /// Rebuild budgets and tags from the joined modules.
    pub(crate) fn recompute(&mut self) {
        self.used_power_w = 0;
        self.used_thermal_w = 0;
        self.tags_present.clear();

        for desc in self.modules.values() {
            self.used_power_w = self.used_power_w.saturating_add(desc.interfaces.power.max_w);
            self.used_thermal_w = self.used_thermal_w.saturating_add(desc.constraints.thermal_w);
            self.tags_present.extend(desc.tags().map(str::to_string));
        }
    }

    /// Multi-line operator summary of budgets, tags and membership.
    pub fn summary(&self) -> String {
        let tags: Vec<&str> = self.tags_present.iter().map(String::as_str).collect();
        let joined = if self.modules.is_empty() {
            "(none)".to_string()
        } else {
            self.modules.keys().cloned().collect::<Vec<_>>().join(", ")
        };

        format!(
            "Modules joined: {}\n\
             Used power: {}W / {}W\n\
             Used thermal: {}W / {}W\n\
             Tags present: {:?}\n\
             Joined module_ids: {}",
            self.modules.len(),
            self.used_power_w,
            self.limits.power_budget_w,
            self.used_thermal_w,
            self.limits.thermal_budget_w,
            tags,
            joined,
        )
    }
}

impl Default for SatelliteState {
    fn default() -> Self {
        Self::new(SatelliteLimits::default())
    }
}
