//! Named data variables.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role of a variable in a series or matched dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarKind {
    Observation,
    Model,
    #[serde(rename = "auxiliary")]
    Auxiliary,
}

impl fmt::Display for VarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VarKind::Observation => "observation",
            VarKind::Model => "model",
            VarKind::Auxiliary => "auxiliary",
        })
    }
}

/// One named column of values along a time axis. Missing values are NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
    pub values: Vec<f64>,
}

impl Variable {
    pub fn new(name: impl Into<String>, kind: VarKind, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            kind,
            values,
        }
    }

    /// Values at the given row positions.
    pub fn take(&self, rows: &[usize]) -> Variable {
        Variable {
            name: self.name.clone(),
            kind: self.kind,
            values: rows.iter().map(|&i| self.values[i]).collect(),
        }
    }

    pub fn count_valid(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }
}
