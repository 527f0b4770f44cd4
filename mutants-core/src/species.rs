//! Per-template behaviour overrides.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::ai::{Gate, WakeEvent};
use crate::config::ConfigError;
use crate::numbers::clamp_pct;

/// Threshold adjustment for a single gate.
///
/// Accepts `{"set": n}`, `{"add": n}` or a bare integer meaning "add".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdOverride {
    Set { set: i32 },
    Add { add: i32 },
    Delta(i32),
}

impl ThresholdOverride {
    /// Apply the override to `base` and clamp the result to `0..=100`.
    #[must_use]
    pub const fn apply(self, base: i32) -> i32 {
        let raw = match self {
            Self::Set { set } => set,
            Self::Add { add } | Self::Delta(add) => base.saturating_add(add),
        };
        clamp_pct(raw)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesProfile {
    #[serde(default)]
    pub gates: BTreeMap<Gate, ThresholdOverride>,
    #[serde(default)]
    pub prefers_ranged: Option<bool>,
    #[serde(default)]
    pub prefers_innate: bool,
    #[serde(default)]
    pub wake_on_look: Option<i32>,
    #[serde(default)]
    pub wake_on_entry: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Species profiles keyed by creature template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeciesTable {
    profiles: BTreeMap<String, SpeciesProfile>,
}

impl SpeciesTable {
    /// Parse a table from a JSON object keyed by template.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` when the JSON does not match the profile shape.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Load a species file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn insert(&mut self, template: &str, profile: SpeciesProfile) {
        self.profiles.insert(template.to_string(), profile);
    }

    #[must_use]
    pub fn get(&self, template: &str) -> Option<&SpeciesProfile> {
        self.profiles.get(template)
    }

    /// Threshold for `gate` after the template's override, always in `0..=100`.
    #[must_use]
    pub fn threshold(&self, template: &str, gate: Gate, base: i32) -> i32 {
        match self.get(template).and_then(|p| p.gates.get(&gate)) {
            Some(rule) => rule.apply(base),
            None => clamp_pct(base),
        }
    }

    #[must_use]
    pub fn prefers_ranged(&self, template: &str) -> Option<bool> {
        self.get(template).and_then(|p| p.prefers_ranged)
    }

    #[must_use]
    pub fn prefers_innate(&self, template: &str) -> bool {
        self.get(template).is_some_and(|p| p.prefers_innate)
    }

    /// Species wake threshold for `event`, if the template sets one.
    #[must_use]
    pub fn wake_threshold(&self, template: &str, event: WakeEvent) -> Option<i32> {
        let profile = self.get(template)?;
        match event {
            WakeEvent::Look => profile.wake_on_look,
            WakeEvent::Entry => profile.wake_on_entry,
        }
    }

    #[must_use]
    pub fn has_tag(&self, template: &str, tag: &str) -> bool {
        self.get(template)
            .is_some_and(|p| p.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
    }
}
