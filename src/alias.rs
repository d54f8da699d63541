use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while translating between on-wire integers and names.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AliasError {
    #[error("value {index} out of range for property {code}")]
    OutOfRange { code: String, index: i64 },
    #[error("unknown value {name:?} for property {code}")]
    UnknownValue { code: String, name: String },
}

/// A device property value after alias translation.
///
/// Serializes untagged, so a translated map renders as plain JSON
/// (`{"Pow":"on","SetTem":24,"Add0.5":true}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Human-readable label from the alias table.
    Alias(String),
    /// Boolean flag property.
    Flag(bool),
    /// Raw integer for properties the table does not know.
    Raw(i64),
}

impl PropertyValue {
    pub fn as_alias(&self) -> Option<&str> {
        match self {
            PropertyValue::Alias(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            PropertyValue::Flag(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<i64> {
        match self {
            PropertyValue::Raw(raw) => Some(*raw),
            _ => None,
        }
    }
}

/// Bidirectional mapping between property codes and their enumerated values.
///
/// The position of a name in a property's list is the integer the device puts
/// on the wire. The table is immutable once built; share it behind an `Arc`.
/// Nothing checks the table against the device firmware, so a stale table
/// yields `OutOfRange` or wrong labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    values: HashMap<String, Vec<String>>,
    flags: BTreeSet<String>,
}

impl AliasTable {
    /// Empty table; every property passes through as a raw integer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an enumerated property whose names are listed in wire order.
    #[must_use]
    pub fn with_property<I, S>(mut self, code: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values
            .insert(code.into(), names.into_iter().map(Into::into).collect());
        self
    }

    /// Adds a property whose wire values `0`/`1` mean `false`/`true`.
    #[must_use]
    pub fn with_flag(mut self, code: impl Into<String>) -> Self {
        self.flags.insert(code.into());
        self
    }

    /// Table matching current split-unit firmware.
    pub fn gree_default() -> Self {
        const OFF_ON: [&str; 2] = ["off", "on"];
        Self::new()
            .with_property("Pow", OFF_ON)
            .with_property("Mod", ["auto", "cool", "dry", "fan", "heat"])
            .with_property("TemUn", ["celsius", "fahrenheit"])
            .with_property(
                "WdSpd",
                ["auto", "low", "medium-low", "medium", "medium-high", "high"],
            )
            .with_property("Air", OFF_ON)
            .with_property("Blo", OFF_ON)
            .with_property("Health", OFF_ON)
            .with_property("SwhSlp", OFF_ON)
            .with_property("Lig", OFF_ON)
            .with_property(
                "SwingLfRig",
                ["default", "full swing", "pos 1", "pos 2", "pos 3", "pos 4", "pos 5"],
            )
            .with_property(
                "SwUpDn",
                [
                    "default",
                    "full swing",
                    "upmost position",
                    "middle-up position",
                    "middle position",
                    "middle-low position",
                    "lowest position",
                    "downmost region",
                    "middle-low region",
                    "middle region",
                    "middle-up region",
                    "upmost region",
                ],
            )
            .with_property("Quiet", OFF_ON)
            .with_property("Tur", OFF_ON)
            .with_property("SvSt", OFF_ON)
            .with_property("StHt", OFF_ON)
            .with_flag("Add0.5")
    }

    /// True when the property has an enumerated list or is a flag.
    pub fn contains(&self, code: &str) -> bool {
        self.values.contains_key(code) || self.flags.contains(code)
    }

    pub fn is_flag(&self, code: &str) -> bool {
        self.flags.contains(code)
    }

    /// Names for an enumerated property, in wire order.
    pub fn names(&self, code: &str) -> Option<&[String]> {
        self.values.get(code).map(Vec::as_slice)
    }

    /// Returns the name at `index` in the property's list.
    pub fn resolve(&self, code: &str, index: i64) -> Result<&str, AliasError> {
        let out_of_range = || AliasError::OutOfRange {
            code: code.to_string(),
            index,
        };
        let names = self.values.get(code).ok_or_else(out_of_range)?;
        usize::try_from(index)
            .ok()
            .and_then(|i| names.get(i))
            .map(String::as_str)
            .ok_or_else(out_of_range)
    }

    /// Returns the wire index of `name` in the property's list.
    pub fn reverse_resolve(&self, code: &str, name: &str) -> Result<i64, AliasError> {
        self.values
            .get(code)
            .and_then(|names| names.iter().position(|n| n == name))
            .map(|i| i as i64)
            .ok_or_else(|| AliasError::UnknownValue {
                code: code.to_string(),
                name: name.to_string(),
            })
    }

    /// Translates a raw device value for `code`.
    ///
    /// Unknown properties come back as [`PropertyValue::Raw`]; known ones fail
    /// with `OutOfRange` when the value has no entry.
    pub fn resolve_value(&self, code: &str, raw: i64) -> Result<PropertyValue, AliasError> {
        if self.flags.contains(code) {
            return match raw {
                0 => Ok(PropertyValue::Flag(false)),
                1 => Ok(PropertyValue::Flag(true)),
                _ => Err(AliasError::OutOfRange {
                    code: code.to_string(),
                    index: raw,
                }),
            };
        }
        if !self.values.contains_key(code) {
            return Ok(PropertyValue::Raw(raw));
        }
        self.resolve(code, raw)
            .map(|name| PropertyValue::Alias(name.to_string()))
    }
}
