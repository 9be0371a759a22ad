//! Module descriptor documents and the schema check that turns a raw JSON
//! document into a typed [`ModuleDescriptor`].

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

/// Placeholder key used to quarantine documents that carry no usable `module_id`.
pub const UNKNOWN_MODULE_ID: &str = "UNKNOWN";

/// Capability type that contributes the implicit `COMPUTE` tag.
pub const COMPUTE_CAPABILITY: &str = "compute";
pub const COMPUTE_TAG: &str = "COMPUTE";

pub const REQUIRED_TOP_KEYS: [&str; 8] = [
    "module_id",
    "name",
    "vendor",
    "version",
    "certified",
    "interfaces",
    "capabilities",
    "constraints",
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModuleDescriptor {
    pub module_id: String,
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub certified: bool,
    pub interfaces: Interfaces,
    pub capabilities: Vec<Capability>,
    pub constraints: Constraints,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Interfaces {
    pub power: PowerInterface,
    pub data: DataInterface,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PowerInterface {
    /// Absent bus voltage never matches the satellite bus.
    #[serde(default)]
    pub bus_v: Option<i64>,
    #[serde(default)]
    pub max_w: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataInterface {
    #[serde(default)]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Capability {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub thermal_w: i64,
    #[serde(default)]
    pub requires: BTreeSet<String>,
    #[serde(default)]
    pub conflicts: BTreeSet<String>,
}

/// Structural defects detected before any compatibility logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Missing keys: {0:?}")]
    MissingKeys(Vec<String>),
    #[error("interfaces must include power and data")]
    MissingInterfaces,
    #[error("Malformed descriptor: {0}")]
    Malformed(String),
}

impl ModuleDescriptor {
    /// Run the schema check over a raw document.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaError`] found: missing top-level keys, an
    /// `interfaces` object without `power`/`data`, a field of the wrong type, or a
    /// negative power or thermal draw.
    pub fn from_document(doc: &Value) -> Result<Self, SchemaError> {
        let missing: Vec<String> = REQUIRED_TOP_KEYS
            .iter()
            .filter(|key| doc.get(**key).is_none())
            .map(|key| (*key).to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !missing.is_empty() {
            return Err(SchemaError::MissingKeys(missing));
        }

        let interfaces = &doc["interfaces"];
        if interfaces.get("power").is_none() || interfaces.get("data").is_none() {
            return Err(SchemaError::MissingInterfaces);
        }

        let descriptor: Self = serde_json::from_value(doc.clone())
            .map_err(|e| SchemaError::Malformed(e.to_string()))?;

        if descriptor.interfaces.power.max_w < 0 {
            return Err(SchemaError::Malformed(
                "interfaces.power.max_w must not be negative".to_string(),
            ));
        }
        if descriptor.constraints.thermal_w < 0 {
            return Err(SchemaError::Malformed(
                "constraints.thermal_w must not be negative".to_string(),
            ));
        }

        Ok(descriptor)
    }

    /// Tags this module contributes while joined.
    pub fn tags(&self) -> impl Iterator<Item = &str> + '_ {
        self.capabilities.iter().flat_map(|cap| {
            let implicit = (cap.kind == COMPUTE_CAPABILITY).then_some(COMPUTE_TAG);
            implicit.into_iter().chain(cap.tag.as_deref())
        })
    }

    pub fn has_capability(&self, kind: &str) -> bool {
        self.capabilities.iter().any(|cap| cap.kind == kind)
    }
}

/// Key a raw document is filed under, whether or not it passes the schema check.
pub fn document_module_id(doc: &Value) -> &str {
    doc.get("module_id")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_MODULE_ID)
}
