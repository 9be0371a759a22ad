use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

const DEFAULT_POWER_BUS_V: i64 = 28;
const DEFAULT_POWER_BUDGET_W: i64 = 60;
const DEFAULT_THERMAL_BUDGET_W: i64 = 30;
const DEFAULT_DATA_PROTOCOL: &str = "SpaceWire";

/// Static electrical, thermal and data-bus limits of the host satellite.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SatelliteLimits {
    pub power_bus_v: i64,
    pub power_budget_w: i64,
    pub thermal_budget_w: i64,
    pub data_protocol: String,
}

impl Default for SatelliteLimits {
    fn default() -> Self {
        Self {
            power_bus_v: DEFAULT_POWER_BUS_V,
            power_budget_w: DEFAULT_POWER_BUDGET_W,
            thermal_budget_w: DEFAULT_THERMAL_BUDGET_W,
            data_protocol: DEFAULT_DATA_PROTOCOL.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LimitsError {
    #[error("could not read limits file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid limits document: {0}")]
    Parse(#[from] serde_json::Error),
}

impl SatelliteLimits {
    /// Load limits from a JSON document. Fields missing from the document
    /// keep their default values.
    ///
    /// # Errors
    ///
    /// Returns [`LimitsError`] if the file cannot be read or is not valid JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LimitsError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = SatelliteLimits::default();
        assert_eq!(limits.power_bus_v, 28);
        assert_eq!(limits.power_budget_w, 60);
        assert_eq!(limits.thermal_budget_w, 30);
        assert_eq!(limits.data_protocol, "SpaceWire");
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let limits: SatelliteLimits =
            serde_json::from_str(r#"{"power_budget_w": 100, "data_protocol": "CAN"}"#).unwrap();
        assert_eq!(limits.power_budget_w, 100);
        assert_eq!(limits.data_protocol, "CAN");
        assert_eq!(limits.power_bus_v, 28);
        assert_eq!(limits.thermal_budget_w, 30);
    }
}
