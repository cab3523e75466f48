//! Edit instructions loaded from JSON.
//!
//! ```json
//! {
//!   "plugins": {
//!     "Patch.esp": {
//!       "delete": ["0x0001A2B3"],
//!       "udr": [70000],
//!       "strip": [{ "id": "0001A2B4", "field": "XCLW" }],
//!       "donors": ["Master.esm"],
//!       "optimize": true
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use tessera_common::Tag;

use crate::{Error, Result};

/// A record ID, written in JSON as a number or a hex string with or
/// without a `0x` prefix.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RecordId(pub u32);

impl RecordId {
    /// Parse a hex ID such as `0x0001A2B3` or `0001a2b3`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);
        if digits.is_empty() || digits.len() > 8 {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().map(Self)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({:08X})", self.0)
    }
}

impl From<RecordId> for u32 {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{:08X}", self.0))
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self(n)),
            Raw::Text(s) => Self::parse(&s)
                .ok_or_else(|| de::Error::custom(format!("invalid record id {:?}", s))),
        }
    }
}

/// A field type to remove from one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripField {
    pub id: RecordId,
    pub field: Tag,
}

/// Edits for one plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditInstructions {
    /// Records removed outright.
    pub delete: Vec<RecordId>,
    /// Records undeleted and disabled.
    pub udr: Vec<RecordId>,
    pub strip: Vec<StripField>,
    /// Donor plugin file names, lowest priority first.
    pub donors: Vec<String>,
    /// IDs always listed in the header's override field.
    pub extra_overrides: Vec<RecordId>,
    /// Drop fields the game never reads.
    pub optimize: bool,
}

impl EditInstructions {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn is_empty(&self) -> bool {
        self.delete.is_empty()
            && self.udr.is_empty()
            && self.strip.is_empty()
            && self.extra_overrides.is_empty()
            && !self.optimize
    }

    pub fn delete_ids(&self) -> Vec<u32> {
        self.delete.iter().map(|id| id.0).collect()
    }

    pub fn udr_ids(&self) -> Vec<u32> {
        self.udr.iter().map(|id| id.0).collect()
    }

    pub fn strip_targets(&self) -> Vec<(u32, Tag)> {
        self.strip.iter().map(|s| (s.id.0, s.field)).collect()
    }

    pub fn extra_override_ids(&self) -> Vec<u32> {
        self.extra_overrides.iter().map(|id| id.0).collect()
    }
}

/// Instructions for several plugins, keyed by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningConfig {
    #[serde(default)]
    pub plugins: BTreeMap<String, EditInstructions>,
}

impl CleaningConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Look up a plugin's instructions, ignoring case.
    pub fn instructions(&self, plugin: &str) -> Result<&EditInstructions> {
        self.plugins
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(plugin))
            .map(|(_, instructions)| instructions)
            .ok_or_else(|| Error::MissingInstructions(plugin.to_string()))
    }
}
