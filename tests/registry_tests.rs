use satos::descriptor::UNKNOWN_MODULE_ID;
use satos::registry::*;
use satos::*;
use serde_json::{json, Value};
use std::collections::BTreeSet;

fn scenario_limits() -> SatelliteLimits {
    SatelliteLimits {
        power_bus_v: 28,
        power_budget_w: 60,
        thermal_budget_w: 30,
        data_protocol: "SpaceWire".to_string(),
    }
}

fn descriptor(id: &str, max_w: i64, thermal_w: i64, capabilities: Value, requires: &[&str]) -> Value {
    json!({
        "module_id": id,
        "name": format!("{id} module"),
        "vendor": "Test Vendor",
        "version": "1.0.0",
        "certified": true,
        "interfaces": {
            "power": {"bus_v": 28, "max_w": max_w},
            "data": {"protocol": "SpaceWire"}
        },
        "capabilities": capabilities,
        "constraints": {"thermal_w": thermal_w, "requires": requires, "conflicts": []}
    })
}

/// Budgets and tags recomputed independently from the joined modules.
fn assert_aggregates_consistent(registry: &ModuleRegistry) {
    let state = registry.state();
    let power: i64 = state.modules().values().map(|m| m.interfaces.power.max_w).sum();
    let thermal: i64 = state.modules().values().map(|m| m.constraints.thermal_w).sum();
    let tags: BTreeSet<String> = state
        .modules()
        .values()
        .flat_map(|m| m.tags().map(str::to_string).collect::<Vec<_>>())
        .collect();

    assert_eq!(state.used_power_w(), power);
    assert_eq!(state.used_thermal_w(), thermal);
    assert_eq!(state.tags_present(), &tags);
    for id in state.modules().keys() {
        assert!(!registry.is_quarantined(id), "{id} joined and quarantined");
    }
}

#[test]
fn test_scenario_join_sequence() {
    let mut registry = ModuleRegistry::new(scenario_limits());

    let cpu = descriptor("CPU-001", 20, 5, json!([{"type": "compute"}]), &[]);
    let outcome = registry.discover_and_join(&cpu);
    assert!(outcome.accepted);
    assert_eq!(outcome.status, JoinStatus::Joined);
    assert!(outcome.reasons.is_empty());
    assert_eq!(registry.state().used_power_w(), 20);
    assert_eq!(
        registry.state().tags_present().iter().cloned().collect::<Vec<_>>(),
        vec!["COMPUTE".to_string()]
    );

    let comms = descriptor(
        "COM-001",
        15,
        5,
        json!([{"type": "comms", "tag": "COMMS"}]),
        &["COMPUTE"],
    );
    let outcome = registry.discover_and_join(&comms);
    assert!(outcome.accepted);
    assert_eq!(registry.state().used_power_w(), 35);
    assert_eq!(registry.state().used_thermal_w(), 10);
    assert_eq!(
        registry.state().tags_present().iter().cloned().collect::<Vec<_>>(),
        vec!["COMMS".to_string(), "COMPUTE".to_string()]
    );

    assert!(registry.remove_module("COM-001"));
    assert_eq!(registry.state().used_power_w(), 20);
    assert_eq!(
        registry.state().tags_present().iter().cloned().collect::<Vec<_>>(),
        vec!["COMPUTE".to_string()]
    );
    assert_aggregates_consistent(&registry);
}

#[test]
fn test_rejection_scenario_reports_both_reasons_in_rule_order() {
    let mut registry = ModuleRegistry::new(scenario_limits());
    let mut doc = descriptor("MYS-001", 5, 1, json!([{"type": "sensor"}]), &[]);
    doc["certified"] = json!(false);
    doc["interfaces"]["power"]["bus_v"] = json!(12);

    let outcome = registry.discover_and_join(&doc);

    assert!(!outcome.accepted);
    assert_eq!(outcome.status, JoinStatus::QuarantinedCompat);
    assert_eq!(
        outcome.reasons.to_vec(),
        vec![
            "Module not certified (zero-trust policy).".to_string(),
            "Power bus mismatch: sat 28V vs module 12V".to_string(),
        ]
    );
    assert!(registry.is_quarantined("MYS-001"));
    assert!(!registry.state().is_joined("MYS-001"));
}

#[test]
fn test_every_violated_rule_is_reported() {
    let mut registry = ModuleRegistry::new(scenario_limits());
    assert!(registry
        .discover_and_join(&descriptor("CPU-001", 20, 5, json!([{"type": "compute"}]), &[]))
        .accepted);

    let doc = json!({
        "module_id": "BAD-001",
        "name": "Everything wrong",
        "vendor": "Nobody",
        "version": "0.0.1",
        "certified": false,
        "interfaces": {
            "power": {"bus_v": 5, "max_w": 50},
            "data": {"protocol": "CAN"}
        },
        "capabilities": [],
        "constraints": {
            "thermal_w": 40,
            "requires": ["RADIO", "GPS"],
            "conflicts": ["COMPUTE"]
        }
    });

    let outcome = registry.discover_and_join(&doc);
    assert_eq!(outcome.status, JoinStatus::QuarantinedCompat);
    assert_eq!(
        outcome.reasons.to_vec(),
        vec![
            "Module not certified (zero-trust policy).".to_string(),
            "Power bus mismatch: sat 28V vs module 5V".to_string(),
            "Data protocol mismatch: sat SpaceWire vs module CAN".to_string(),
            "Power budget exceeded: used 20W + 50W > 60W".to_string(),
            "Thermal budget exceeded: used 5W + 40W > 30W".to_string(),
            r#"Missing required capabilities/tags: ["GPS", "RADIO"]"#.to_string(),
            r#"Conflicts with present tags: ["COMPUTE"]"#.to_string(),
        ]
    );
    assert_eq!(outcome.reasons.len(), MAX_REASONS);
    assert_eq!(registry.state().used_power_w(), 20);
    assert_aggregates_consistent(&registry);
}

#[test]
fn test_budget_check_uses_pre_join_totals() {
    let mut registry = ModuleRegistry::new(scenario_limits());
    assert!(registry
        .discover_and_join(&descriptor("A", 40, 10, json!([]), &[]))
        .accepted);

    // Exactly at budget is fine.
    assert!(registry
        .discover_and_join(&descriptor("B", 20, 20, json!([]), &[]))
        .accepted);
    assert_eq!(registry.state().used_power_w(), 60);
    assert_eq!(registry.state().used_thermal_w(), 30);

    let outcome = registry.discover_and_join(&descriptor("C", 1, 0, json!([]), &[]));
    assert_eq!(outcome.reasons.to_vec(), vec![
        "Power budget exceeded: used 60W + 1W > 60W".to_string()
    ]);
    assert_eq!(registry.state().used_power_w(), 60);
}

#[test]
fn test_schema_failure_never_reaches_compatibility() {
    let mut registry = ModuleRegistry::new(scenario_limits());
    let doc = json!({
        "module_id": "HALF-001",
        "name": "Half a descriptor",
        "certified": false,
        "interfaces": {"power": {"bus_v": 5, "max_w": 500}, "data": {}}
    });

    let outcome = registry.discover_and_join(&doc);

    assert!(!outcome.accepted);
    assert_eq!(outcome.status, JoinStatus::QuarantinedSchema);
    assert_eq!(
        outcome.reasons.to_vec(),
        vec![r#"Missing keys: ["capabilities", "constraints", "vendor", "version"]"#.to_string()]
    );
    assert_eq!(registry.state().used_power_w(), 0);
    assert_eq!(registry.state().used_thermal_w(), 0);
    assert!(registry.state().tags_present().is_empty());
    assert_eq!(registry.quarantine()["HALF-001"].status, JoinStatus::QuarantinedSchema);
}

#[test]
fn test_schema_failure_without_id_uses_placeholder() {
    let mut registry = ModuleRegistry::new(scenario_limits());
    let doc = json!({"name": "anonymous"});

    let outcome = registry.discover_and_join(&doc);

    assert_eq!(outcome.module_id, UNKNOWN_MODULE_ID);
    assert_eq!(outcome.status, JoinStatus::QuarantinedSchema);
    assert!(registry.is_quarantined(UNKNOWN_MODULE_ID));
}

#[test]
fn test_missing_data_interface_is_schema_failure() {
    let mut registry = ModuleRegistry::new(scenario_limits());
    let mut doc = descriptor("NODATA-1", 1, 1, json!([]), &[]);
    doc["interfaces"] = json!({"power": {"bus_v": 28, "max_w": 1}});

    let outcome = registry.discover_and_join(&doc);
    assert_eq!(outcome.status, JoinStatus::QuarantinedSchema);
    assert_eq!(
        outcome.reasons.to_vec(),
        vec!["interfaces must include power and data".to_string()]
    );
}

#[test]
fn test_remove_unknown_module_has_no_effect() {
    let mut registry = ModuleRegistry::new(scenario_limits());
    assert!(registry
        .discover_and_join(&descriptor("CPU-001", 20, 5, json!([{"type": "compute"}]), &[]))
        .accepted);

    assert!(!registry.remove_module("GHOST-1"));
    assert_eq!(registry.state().used_power_w(), 20);
    assert_eq!(registry.state().modules().len(), 1);
}

#[test]
fn test_tags_recomputed_when_shared_tag_provider_leaves() {
    let mut registry = ModuleRegistry::new(scenario_limits());
    // Two modules both contribute COMPUTE; removing one must keep the tag.
    assert!(registry
        .discover_and_join(&descriptor("CPU-A", 10, 2, json!([{"type": "compute"}]), &[]))
        .accepted);
    assert!(registry
        .discover_and_join(&descriptor(
            "CPU-B",
            10,
            2,
            json!([{"type": "compute", "tag": "GPU"}]),
            &[]
        ))
        .accepted);

    assert!(registry.remove_module("CPU-A"));
    assert!(registry.state().tags_present().contains("COMPUTE"));
    assert!(registry.state().tags_present().contains("GPU"));

    assert!(registry.remove_module("CPU-B"));
    assert!(registry.state().tags_present().is_empty());
    assert_eq!(registry.state().used_power_w(), 0);
    assert_eq!(registry.state().used_thermal_w(), 0);
}

#[test]
fn test_budget_invariant_over_join_remove_sequence() {
    let mut registry = ModuleRegistry::new(SatelliteLimits {
        power_budget_w: 100,
        thermal_budget_w: 50,
        ..scenario_limits()
    });

    let plan: [(&str, i64, i64, Option<&str>); 8] = [
        ("M1", 10, 3, None),
        ("M2", 25, 7, Some("M1")),
        ("M3", 30, 10, None),
        ("M4", 50, 5, Some("M3")),
        ("M5", 5, 30, None),
        ("M6", 40, 1, Some("M2")),
        ("M7", 12, 12, Some("M5")),
        ("M8", 8, 8, Some("M9")),
    ];

    for (id, max_w, thermal_w, remove) in plan {
        registry.discover_and_join(&descriptor(
            id,
            max_w,
            thermal_w,
            json!([{"type": "payload", "tag": id}]),
            &[],
        ));
        assert_aggregates_consistent(&registry);

        if let Some(victim) = remove {
            registry.remove_module(victim);
            assert_aggregates_consistent(&registry);
        }
    }
}

#[test]
fn test_requires_satisfied_by_explicit_tag() {
    let mut registry = ModuleRegistry::new(scenario_limits());
    assert!(registry
        .discover_and_join(&descriptor("GPS-1", 5, 1, json!([{"type": "nav", "tag": "GPS"}]), &[]))
        .accepted);

    let outcome = registry.discover_and_join(&descriptor("AOCS-1", 5, 1, json!([]), &["GPS"]));
    assert!(outcome.accepted);
    assert!(registry.state().is_joined("AOCS-1"));
    assert_eq!(registry.state().tags_present().len(), 1);
}

#[test]
fn test_oversized_draw_is_rejected_not_panicking() {
    let mut registry = ModuleRegistry::new(scenario_limits());
    assert!(registry
        .discover_and_join(&descriptor("A", 20, 5, json!([]), &[]))
        .accepted);

    let mut doc = descriptor("HOG-1", 0, 0, json!([]), &[]);
    doc["interfaces"]["power"]["max_w"] = json!(i64::MAX);
    doc["constraints"]["thermal_w"] = json!(i64::MAX);

    let outcome = registry.discover_and_join(&doc);

    assert!(!outcome.accepted);
    assert_eq!(outcome.status, JoinStatus::QuarantinedCompat);
    assert_eq!(
        outcome.reasons.to_vec(),
        vec![
            format!("Power budget exceeded: used 20W + {}W > 60W", i64::MAX),
            format!("Thermal budget exceeded: used 5W + {}W > 30W", i64::MAX),
        ]
    );
    assert_eq!(registry.state().used_power_w(), 20);
    assert_eq!(registry.state().used_thermal_w(), 5);
    assert_aggregates_consistent(&registry);
}

#[test]
fn test_negative_draw_is_schema_failure() {
    let mut registry = ModuleRegistry::new(scenario_limits());

    let negative = descriptor("NEG-1", -1000, 1, json!([]), &[]);
    let outcome = registry.discover_and_join(&negative);
    assert_eq!(outcome.status, JoinStatus::QuarantinedSchema);
    assert_eq!(
        outcome.reasons.to_vec(),
        vec!["Malformed descriptor: interfaces.power.max_w must not be negative".to_string()]
    );

    let cold = descriptor("COLD-1", 1, -50, json!([]), &[]);
    assert_eq!(
        registry.discover_and_join(&cold).status,
        JoinStatus::QuarantinedSchema
    );

    // Nothing was credited, so the budget still holds.
    let outcome = registry.discover_and_join(&descriptor("BIG-1", 500, 1, json!([]), &[]));
    assert_eq!(outcome.status, JoinStatus::QuarantinedCompat);
    assert_eq!(registry.state().used_power_w(), 0);
    assert_eq!(registry.state().used_thermal_w(), 0);
    assert_aggregates_consistent(&registry);
}
