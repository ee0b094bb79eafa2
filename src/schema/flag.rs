use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A value a story flag can hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FlagValue {
    /// The value an unset flag reads as.
    pub const UNSET: FlagValue = FlagValue::Bool(false);

    /// Returns true for `Bool(true)`, non-zero ints and non-empty text.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Text(s) => !s.is_empty(),
        }
    }
}

impl Default for FlagValue {
    fn default() -> Self {
        Self::Bool(true)
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FlagValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Named story flags. Ordered so saves serialize deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameFlags(BTreeMap<String, FlagValue>);

impl GameFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FlagValue> {
        self.0.get(name)
    }

    /// Set a flag. Returns true if the stored value changed.
    pub fn set(&mut self, name: &str, value: FlagValue) -> bool {
        if self.0.get(name) == Some(&value) {
            return false;
        }
        self.0.insert(name.to_string(), value);
        true
    }

    /// Remove a flag. Returns true if it was present.
    pub fn clear(&mut self, name: &str) -> bool {
        self.0.remove(name).is_some()
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.0.get(name).is_some_and(FlagValue::is_truthy)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FlagValue)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reports_change_once() {
        let mut flags = GameFlags::new();
        assert!(flags.set("met_mara", FlagValue::Bool(true)));
        assert!(!flags.set("met_mara", FlagValue::Bool(true)));
        assert_eq!(flags.len(), 1);
    }

    #[test]
    fn overwrite_with_different_value() {
        let mut flags = GameFlags::new();
        flags.set("debt", FlagValue::Int(20));
        assert!(flags.set("debt", FlagValue::Int(40)));
        assert_eq!(flags.get("debt"), Some(&FlagValue::Int(40)));
    }

    #[test]
    fn truthiness() {
        assert!(FlagValue::Bool(true).is_truthy());
        assert!(!FlagValue::Bool(false).is_truthy());
        assert!(!FlagValue::Int(0).is_truthy());
        assert!(FlagValue::Int(-2).is_truthy());
        assert!(!FlagValue::Text(String::new()).is_truthy());
        assert!(FlagValue::from("ally").is_truthy());
    }

    #[test]
    fn clear_and_is_set() {
        let mut flags = GameFlags::new();
        flags.set("door_open", true.into());
        assert!(flags.is_set("door_open"));
        assert!(flags.clear("door_open"));
        assert!(!flags.clear("door_open"));
        assert!(!flags.is_set("door_open"));
    }
}
