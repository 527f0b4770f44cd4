//! Combat tuning loaded once per process and shared by reference.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default action-credit distribution over 0, 1, 2 and 3 credits.
pub const DEFAULT_CREDIT_WEIGHTS: [f64; 4] = [0.5, 0.3, 0.15, 0.05];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be between {min} and {max} (got {value})")]
    RangeViolation {
        field: &'static str,
        min: i32,
        max: i32,
        value: i32,
    },
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: i32,
        value: i32,
    },
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON data")]
    Parse(#[from] serde_json::Error),
    #[error("override file must contain a JSON object")]
    NotAnObject,
}

/// Optional fixed seeds for side streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngSeeds {
    /// Wake checks draw from their own stream when set.
    #[serde(default)]
    pub wake: Option<u64>,
}

/// Percent thresholds and costs steering the decision cascade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatConfig {
    #[serde(default = "CombatConfig::default_wake_on_look")]
    pub wake_on_look: i32,
    #[serde(default = "CombatConfig::default_wake_on_entry")]
    pub wake_on_entry: i32,
    #[serde(default = "CombatConfig::default_flee_hp_pct")]
    pub flee_hp_pct: i32,
    #[serde(default = "CombatConfig::default_flee_pct")]
    pub flee_pct: i32,
    #[serde(default = "CombatConfig::default_heal_at_pct")]
    pub heal_at_pct: i32,
    #[serde(default = "CombatConfig::default_heal_pct")]
    pub heal_pct: i32,
    /// Ion cost per creature level.
    #[serde(default = "CombatConfig::default_heal_cost")]
    pub heal_cost: i32,
    #[serde(default = "CombatConfig::default_convert_pct")]
    pub convert_pct: i32,
    #[serde(default = "CombatConfig::default_low_ion_pct")]
    pub low_ion_pct: i32,
    #[serde(default = "CombatConfig::default_cast_pct")]
    pub cast_pct: i32,
    #[serde(default = "CombatConfig::default_attack_pct")]
    pub attack_pct: i32,
    #[serde(default = "CombatConfig::default_pickup_pct")]
    pub pickup_pct: i32,
    #[serde(default = "CombatConfig::default_emote_pct")]
    pub emote_pct: i32,
    #[serde(default = "CombatConfig::default_spell_cost")]
    pub spell_cost: i32,
    #[serde(default = "CombatConfig::default_spell_success_pct")]
    pub spell_success_pct: i32,
    #[serde(default = "CombatConfig::default_cracked_pickup_bonus")]
    pub cracked_pickup_bonus: i32,
    #[serde(default = "CombatConfig::default_cracked_flee_bonus")]
    pub cracked_flee_bonus: i32,
    /// Chance that a bonus action forces a pickup.
    #[serde(default = "CombatConfig::default_bonus_pickup_pct")]
    pub bonus_pickup_pct: i32,
    #[serde(default = "CombatConfig::default_credit_weights")]
    pub credit_weights: [f64; 4],
    #[serde(default)]
    pub rng_seeds: RngSeeds,
}

impl CombatConfig {
    const fn default_wake_on_look() -> i32 {
        15
    }

    const fn default_wake_on_entry() -> i32 {
        10
    }

    const fn default_flee_hp_pct() -> i32 {
        25
    }

    const fn default_flee_pct() -> i32 {
        10
    }

    const fn default_heal_at_pct() -> i32 {
        80
    }

    const fn default_heal_pct() -> i32 {
        20
    }

    const fn default_heal_cost() -> i32 {
        5
    }

    const fn default_convert_pct() -> i32 {
        20
    }

    const fn default_low_ion_pct() -> i32 {
        50
    }

    const fn default_cast_pct() -> i32 {
        25
    }

    const fn default_attack_pct() -> i32 {
        35
    }

    const fn default_pickup_pct() -> i32 {
        15
    }

    const fn default_emote_pct() -> i32 {
        10
    }

    const fn default_spell_cost() -> i32 {
        10
    }

    const fn default_spell_success_pct() -> i32 {
        75
    }

    const fn default_cracked_pickup_bonus() -> i32 {
        10
    }

    const fn default_cracked_flee_bonus() -> i32 {
        5
    }

    const fn default_bonus_pickup_pct() -> i32 {
        50
    }

    const fn default_credit_weights() -> [f64; 4] {
        DEFAULT_CREDIT_WEIGHTS
    }

    /// Parse a full configuration document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the JSON is malformed or a field is out of range.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load defaults merged with the integer overrides found at `path`.
    ///
    /// A missing file yields the defaults. Known keys holding non-integer
    /// values are skipped with a warning; unknown keys are skipped quietly.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the file cannot be read or parsed, or when
    /// the merged configuration fails validation.
    pub fn load_with_overrides(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("combat config {} not found; using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        let serde_json::Value::Object(map) = value else {
            return Err(ConfigError::NotAnObject);
        };
        let cfg = Self::default().with_overrides(&map);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply loosely-typed integer overrides key by key.
    #[must_use]
    pub fn with_overrides(&self, overrides: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut cfg = self.clone();
        for (key, value) in overrides {
            if key == "rng_seeds" {
                match serde_json::from_value::<RngSeeds>(value.clone()) {
                    Ok(seeds) => cfg.rng_seeds = seeds,
                    Err(err) => log::warn!("ignoring combat config rng_seeds: {err}"),
                }
                continue;
            }
            if key == "credit_weights" {
                match serde_json::from_value::<Vec<f64>>(value.clone()) {
                    Ok(weights) => cfg.credit_weights = sanitize_credit_weights(&weights),
                    Err(err) => log::warn!("ignoring combat config credit_weights: {err}"),
                }
                continue;
            }
            let Some(slot) = cfg.int_field_mut(key) else {
                log::debug!("unknown combat config key {key}");
                continue;
            };
            match value.as_i64().and_then(|raw| i32::try_from(raw).ok()) {
                Some(parsed) => *slot = parsed,
                None => log::warn!("combat config {key} expects an integer (got {value})"),
            }
        }
        cfg
    }

    /// Merge the populated fields of `overlay` onto this configuration.
    #[must_use]
    pub fn with_overlay(&self, overlay: &CombatConfigOverlay) -> Self {
        Self {
            wake_on_look: overlay.wake_on_look.unwrap_or(self.wake_on_look),
            wake_on_entry: overlay.wake_on_entry.unwrap_or(self.wake_on_entry),
            flee_hp_pct: overlay.flee_hp_pct.unwrap_or(self.flee_hp_pct),
            flee_pct: overlay.flee_pct.unwrap_or(self.flee_pct),
            heal_at_pct: overlay.heal_at_pct.unwrap_or(self.heal_at_pct),
            heal_pct: overlay.heal_pct.unwrap_or(self.heal_pct),
            convert_pct: overlay.convert_pct.unwrap_or(self.convert_pct),
            cast_pct: overlay.cast_pct.unwrap_or(self.cast_pct),
            attack_pct: overlay.attack_pct.unwrap_or(self.attack_pct),
            pickup_pct: overlay.pickup_pct.unwrap_or(self.pickup_pct),
            emote_pct: overlay.emote_pct.unwrap_or(self.emote_pct),
            bonus_pickup_pct: overlay.bonus_pickup_pct.unwrap_or(self.bonus_pickup_pct),
            ..self.clone()
        }
    }

    fn int_field_mut(&mut self, key: &str) -> Option<&mut i32> {
        let slot = match key {
            "wake_on_look" => &mut self.wake_on_look,
            "wake_on_entry" => &mut self.wake_on_entry,
            "flee_hp_pct" => &mut self.flee_hp_pct,
            "flee_pct" => &mut self.flee_pct,
            "heal_at_pct" => &mut self.heal_at_pct,
            "heal_pct" => &mut self.heal_pct,
            "heal_cost" => &mut self.heal_cost,
            "convert_pct" => &mut self.convert_pct,
            "low_ion_pct" => &mut self.low_ion_pct,
            "cast_pct" => &mut self.cast_pct,
            "attack_pct" => &mut self.attack_pct,
            "pickup_pct" => &mut self.pickup_pct,
            "emote_pct" => &mut self.emote_pct,
            "spell_cost" => &mut self.spell_cost,
            "spell_success_pct" => &mut self.spell_success_pct,
            "cracked_pickup_bonus" => &mut self.cracked_pickup_bonus,
            "cracked_flee_bonus" => &mut self.cracked_flee_bonus,
            "bonus_pickup_pct" | "post_kill_force_pickup_pct" => &mut self.bonus_pickup_pct,
            _ => return None,
        };
        Some(slot)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a percentage leaves `0..=100` or a cost is negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let percents = [
            ("wake_on_look", self.wake_on_look),
            ("wake_on_entry", self.wake_on_entry),
            ("flee_hp_pct", self.flee_hp_pct),
            ("flee_pct", self.flee_pct),
            ("heal_at_pct", self.heal_at_pct),
            ("heal_pct", self.heal_pct),
            ("convert_pct", self.convert_pct),
            ("low_ion_pct", self.low_ion_pct),
            ("cast_pct", self.cast_pct),
            ("attack_pct", self.attack_pct),
            ("pickup_pct", self.pickup_pct),
            ("emote_pct", self.emote_pct),
            ("spell_success_pct", self.spell_success_pct),
            ("bonus_pickup_pct", self.bonus_pickup_pct),
        ];
        for (field, value) in percents {
            if !(0..=100).contains(&value) {
                return Err(ConfigError::RangeViolation {
                    field,
                    min: 0,
                    max: 100,
                    value,
                });
            }
        }
        let costs = [
            ("heal_cost", self.heal_cost),
            ("spell_cost", self.spell_cost),
        ];
        for (field, value) in costs {
            if value < 0 {
                return Err(ConfigError::MinViolation {
                    field,
                    min: 0,
                    value,
                });
            }
        }
        Ok(())
    }

    /// Clamp every field back into its documented range.
    pub fn sanitize(&mut self) {
        for slot in [
            &mut self.wake_on_look,
            &mut self.wake_on_entry,
            &mut self.flee_hp_pct,
            &mut self.flee_pct,
            &mut self.heal_at_pct,
            &mut self.heal_pct,
            &mut self.convert_pct,
            &mut self.low_ion_pct,
            &mut self.cast_pct,
            &mut self.attack_pct,
            &mut self.pickup_pct,
            &mut self.emote_pct,
            &mut self.spell_success_pct,
            &mut self.bonus_pickup_pct,
        ] {
            *slot = (*slot).clamp(0, 100);
        }
        self.heal_cost = self.heal_cost.max(0);
        self.spell_cost = self.spell_cost.max(0);
        self.credit_weights = sanitize_credit_weights(&self.credit_weights);
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            wake_on_look: Self::default_wake_on_look(),
            wake_on_entry: Self::default_wake_on_entry(),
            flee_hp_pct: Self::default_flee_hp_pct(),
            flee_pct: Self::default_flee_pct(),
            heal_at_pct: Self::default_heal_at_pct(),
            heal_pct: Self::default_heal_pct(),
            heal_cost: Self::default_heal_cost(),
            convert_pct: Self::default_convert_pct(),
            low_ion_pct: Self::default_low_ion_pct(),
            cast_pct: Self::default_cast_pct(),
            attack_pct: Self::default_attack_pct(),
            pickup_pct: Self::default_pickup_pct(),
            emote_pct: Self::default_emote_pct(),
            spell_cost: Self::default_spell_cost(),
            spell_success_pct: Self::default_spell_success_pct(),
            cracked_pickup_bonus: Self::default_cracked_pickup_bonus(),
            cracked_flee_bonus: Self::default_cracked_flee_bonus(),
            bonus_pickup_pct: Self::default_bonus_pickup_pct(),
            credit_weights: Self::default_credit_weights(),
            rng_seeds: RngSeeds::default(),
        }
    }
}

/// Partial configuration merged onto a base via [`CombatConfig::with_overlay`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatConfigOverlay {
    #[serde(default)]
    pub wake_on_look: Option<i32>,
    #[serde(default)]
    pub wake_on_entry: Option<i32>,
    #[serde(default)]
    pub flee_hp_pct: Option<i32>,
    #[serde(default)]
    pub flee_pct: Option<i32>,
    #[serde(default)]
    pub heal_at_pct: Option<i32>,
    #[serde(default)]
    pub heal_pct: Option<i32>,
    #[serde(default)]
    pub convert_pct: Option<i32>,
    #[serde(default)]
    pub cast_pct: Option<i32>,
    #[serde(default)]
    pub attack_pct: Option<i32>,
    #[serde(default)]
    pub pickup_pct: Option<i32>,
    #[serde(default)]
    pub emote_pct: Option<i32>,
    #[serde(default)]
    pub bonus_pickup_pct: Option<i32>,
}

/// Keep at most four non-negative weights; all-zero input restores the defaults.
#[must_use]
pub fn sanitize_credit_weights(raw: &[f64]) -> [f64; 4] {
    let mut weights = [0.0; 4];
    for (slot, value) in weights.iter_mut().zip(raw.iter()) {
        *slot = if value.is_finite() { value.max(0.0) } else { 0.0 };
    }
    if weights.iter().all(|weight| *weight <= 0.0) {
        return DEFAULT_CREDIT_WEIGHTS;
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg: CombatConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, CombatConfig::default());
        assert_eq!(cfg.wake_on_look, 15);
        assert_eq!(cfg.wake_on_entry, 10);
        assert_eq!(cfg.attack_pct, 35);
        assert_eq!(cfg.bonus_pickup_pct, 50);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn overrides_skip_non_integers_and_unknown_keys() {
        let overrides = json!({
            "flee_pct": 30,
            "heal_pct": "lots",
            "mystery": 4,
            "post_kill_force_pickup_pct": 80,
            "credit_weights": [-1.0, 2.0],
            "rng_seeds": { "wake": 11, "loot": 4 }
        });
        let serde_json::Value::Object(map) = overrides else {
            panic!("object literal");
        };
        let cfg = CombatConfig::default().with_overrides(&map);
        assert_eq!(cfg.flee_pct, 30);
        assert_eq!(cfg.heal_pct, 20);
        assert_eq!(cfg.bonus_pickup_pct, 80);
        assert_eq!(cfg.credit_weights, [0.0, 2.0, 0.0, 0.0]);
        assert_eq!(cfg.rng_seeds, RngSeeds { wake: Some(11) });
    }

    #[test]
    fn validate_reports_range_violations() {
        let cfg = CombatConfig {
            attack_pct: 140,
            ..CombatConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::RangeViolation {
                field: "attack_pct",
                value: 140,
                ..
            })
        ));

        let cfg = CombatConfig {
            spell_cost: -2,
            ..CombatConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MinViolation {
                field: "spell_cost",
                ..
            })
        ));
    }

    #[test]
    fn sanitize_clamps_fields() {
        let mut cfg = CombatConfig {
            emote_pct: -4,
            cast_pct: 250,
            heal_cost: -1,
            credit_weights: [0.0; 4],
            ..CombatConfig::default()
        };
        cfg.sanitize();
        assert_eq!(cfg.emote_pct, 0);
        assert_eq!(cfg.cast_pct, 100);
        assert_eq!(cfg.heal_cost, 0);
        assert_eq!(cfg.credit_weights, DEFAULT_CREDIT_WEIGHTS);
    }

    #[test]
    fn overlay_only_replaces_present_fields() {
        let overlay = CombatConfigOverlay {
            attack_pct: Some(60),
            ..CombatConfigOverlay::default()
        };
        let cfg = CombatConfig::default().with_overlay(&overlay);
        assert_eq!(cfg.attack_pct, 60);
        assert_eq!(cfg.flee_pct, 10);
    }

    #[test]
    fn missing_override_file_yields_defaults() {
        let path = std::env::temp_dir().join("mutants-core-missing-combat.json");
        let cfg = CombatConfig::load_with_overrides(&path).unwrap();
        assert_eq!(cfg, CombatConfig::default());
    }

    #[test]
    fn override_file_merges_integer_values() {
        let path = std::env::temp_dir().join(format!(
            "mutants-core-combat-{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        std::fs::write(&path, r#"{ "attack_pct": 60, "emote_pct": 1.5 }"#).unwrap();
        let cfg = CombatConfig::load_with_overrides(&path).unwrap();
        assert_eq!(cfg.attack_pct, 60);
        assert_eq!(cfg.emote_pct, 10);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn credit_weights_fall_back_when_all_zero() {
        assert_eq!(sanitize_credit_weights(&[]), DEFAULT_CREDIT_WEIGHTS);
        assert_eq!(
            sanitize_credit_weights(&[1.0, 1.0, 1.0, 1.0, 9.0]),
            [1.0, 1.0, 1.0, 1.0]
        );
    }
}
