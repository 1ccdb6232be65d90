//! Physical quantity metadata.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name and unit of a physical quantity, e.g. "Water Level [m]".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quantity {
    pub name: String,
    pub unit: String,
    /// Directional quantities (wave or wind direction) are scored with circular metrics.
    #[serde(default)]
    pub is_directional: bool,
}

impl Quantity {
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            is_directional: false,
        }
    }

    /// A directional quantity measured in degrees.
    pub fn directional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: "degree".to_string(),
            is_directional: true,
        }
    }

    pub fn undefined() -> Self {
        Self::new("Undefined", "Undefined")
    }

    pub fn is_undefined(&self) -> bool {
        self.name == "Undefined"
    }

    /// Two quantities are comparable when either is undefined or both agree on name and unit.
    pub fn is_compatible(&self, other: &Quantity) -> bool {
        self.is_undefined() || other.is_undefined() || (self.name == other.name && self.unit == other.unit)
    }

    /// Short label for axes and tables, e.g. "Water Level [m]".
    pub fn unit_text(&self) -> String {
        self.to_string()
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::undefined()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.unit)
    }
}
