//! User attributes carried by observations and matched data.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SkillError, SkillResult};

/// Attribute keys set by the library itself.
pub const BUILTIN_ATTRS: [&str; 4] = ["name", "gtype", "weight", "color"];

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Int(v) => write!(f, "{v}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

/// Ordered user attributes.
pub type Attrs = BTreeMap<String, AttrValue>;

/// Reject user attributes that would shadow a built-in attribute.
pub fn validate_user_attrs(attrs: &Attrs) -> SkillResult<()> {
    for key in attrs.keys() {
        if BUILTIN_ATTRS.contains(&key.as_str()) {
            return Err(SkillError::invalid_value(format!(
                "attribute '{key}' is reserved and cannot be set by the user"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_attr_rejected() {
        let mut attrs = Attrs::new();
        attrs.insert("station_id".into(), AttrValue::Int(42));
        assert!(validate_user_attrs(&attrs).is_ok());

        attrs.insert("weight".into(), AttrValue::Float(2.0));
        assert!(validate_user_attrs(&attrs).is_err());
    }

    #[test]
    fn test_untagged_json() {
        let json = serde_json::to_string(&AttrValue::from("buoy")).unwrap();
        assert_eq!(json, "\"buoy\"");
        let back: AttrValue = serde_json::from_str("3").unwrap();
        assert_eq!(back, AttrValue::Int(3));
    }
}
