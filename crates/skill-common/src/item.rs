//! Selecting variables by name or position.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SkillError, SkillResult};

/// Reference to an item (column, variable, model) by name or index.
///
/// Negative indices count from the end, so `-1` is the last item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemRef {
    Index(i64),
    Name(String),
}

impl ItemRef {
    /// Resolve to a position in `names`.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> SkillResult<usize> {
        match self {
            ItemRef::Name(name) => names
                .iter()
                .position(|n| n.as_ref() == name)
                .ok_or_else(|| {
                    let valid: Vec<&str> = names.iter().map(|n| n.as_ref()).collect();
                    SkillError::not_found(format!("item '{name}' not found. Valid items: {valid:?}"))
                }),
            ItemRef::Index(idx) => {
                let len = names.len();
                let resolved = if *idx < 0 { len as i64 + idx } else { *idx };
                if resolved < 0 || resolved >= len as i64 {
                    return Err(SkillError::IndexOutOfRange { index: *idx, len });
                }
                Ok(resolved as usize)
            }
        }
    }

    /// Resolve to the name it refers to.
    pub fn resolve_name<S: AsRef<str>>(&self, names: &[S]) -> SkillResult<String> {
        let idx = self.resolve(names)?;
        Ok(names[idx].as_ref().to_string())
    }
}

/// Resolve several item references, rejecting duplicates.
pub fn resolve_unique<S: AsRef<str>>(items: &[ItemRef], names: &[S]) -> SkillResult<Vec<usize>> {
    let mut resolved = Vec::with_capacity(items.len());
    for item in items {
        let idx = item.resolve(names)?;
        if resolved.contains(&idx) {
            return Err(SkillError::invalid_value(format!(
                "item '{}' is selected more than once",
                names[idx].as_ref()
            )));
        }
        resolved.push(idx);
    }
    Ok(resolved)
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemRef::Index(i) => write!(f, "{i}"),
            ItemRef::Name(n) => f.write_str(n),
        }
    }
}

impl From<&str> for ItemRef {
    fn from(name: &str) -> Self {
        ItemRef::Name(name.to_string())
    }
}

impl From<String> for ItemRef {
    fn from(name: String) -> Self {
        ItemRef::Name(name)
    }
}

impl From<&String> for ItemRef {
    fn from(name: &String) -> Self {
        ItemRef::Name(name.clone())
    }
}

impl From<i64> for ItemRef {
    fn from(idx: i64) -> Self {
        ItemRef::Index(idx)
    }
}

impl From<i32> for ItemRef {
    fn from(idx: i32) -> Self {
        ItemRef::Index(idx as i64)
    }
}

impl From<usize> for ItemRef {
    fn from(idx: usize) -> Self {
        ItemRef::Index(idx as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_by_name_and_index() {
        let names = ["Observation", "m1", "m2"];
        assert_eq!(ItemRef::from("m2").resolve(&names).unwrap(), 2);
        assert_eq!(ItemRef::from(0).resolve(&names).unwrap(), 0);
        assert_eq!(ItemRef::from(-1).resolve(&names).unwrap(), 2);
    }

    #[test]
    fn test_resolve_errors() {
        let names = ["a", "b"];
        assert!(matches!(ItemRef::from("c").resolve(&names), Err(SkillError::NotFound(_))));
        assert!(matches!(
            ItemRef::from(2).resolve(&names),
            Err(SkillError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(ItemRef::from(-3).resolve(&names).is_err());
    }

    #[test]
    fn test_resolve_unique_rejects_repeats() {
        let names = ["a", "b"];
        let items = [ItemRef::from("a"), ItemRef::from(0)];
        assert!(resolve_unique(&items, &names).is_err());
    }
}
