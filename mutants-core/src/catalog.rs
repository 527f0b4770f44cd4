//! Item templates keyed by catalog id.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::ConfigError;
use crate::constants::{BROKEN_ARMOUR_ID, BROKEN_WEAPON_ID, ENCHANT_POWER_STEP};
use crate::items::ItemRecord;

/// Static description of an item kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTemplate {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub base_power: i32,
    #[serde(default)]
    pub ranged: bool,
    #[serde(default)]
    pub armour: bool,
    /// Ions gained when a creature converts this item.
    #[serde(default)]
    pub convert_value: i64,
    #[serde(default = "ItemTemplate::default_spawnable")]
    pub spawnable: bool,
}

impl ItemTemplate {
    const fn default_spawnable() -> bool {
        true
    }

    #[must_use]
    pub fn new(id: &str, base_power: i32, convert_value: i64) -> Self {
        Self {
            id: id.to_string(),
            name: id.replace('_', " "),
            base_power,
            ranged: false,
            armour: false,
            convert_value,
            spawnable: true,
        }
    }

    #[must_use]
    pub const fn ranged(mut self) -> Self {
        self.ranged = true;
        self
    }

    #[must_use]
    pub const fn armour(mut self) -> Self {
        self.armour = true;
        self
    }
}

/// Catalog of every known item template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemCatalog {
    templates: BTreeMap<String, ItemTemplate>,
}

impl ItemCatalog {
    /// Catalog holding only the broken placeholders.
    #[must_use]
    pub fn with_placeholders() -> Self {
        let mut catalog = Self::default();
        catalog.insert(ItemTemplate {
            spawnable: false,
            ..ItemTemplate::new(BROKEN_WEAPON_ID, 1, 0)
        });
        catalog.insert(ItemTemplate {
            spawnable: false,
            ..ItemTemplate::new(BROKEN_ARMOUR_ID, 0, 0).armour()
        });
        catalog
    }

    /// Parse a catalog from a JSON object keyed by item id.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` when the JSON does not match the template shape.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let mut catalog: Self = serde_json::from_str(raw)?;
        for (key, template) in &mut catalog.templates {
            if template.id.is_empty() {
                template.id.clone_from(key);
            }
        }
        Ok(catalog)
    }

    /// Load a catalog file.
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

    pub fn insert(&mut self, template: ItemTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ItemTemplate> {
        self.templates.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemTemplate> {
        self.templates.values()
    }

    /// Template for an item instance.
    #[must_use]
    pub fn template_of(&self, record: &ItemRecord) -> Option<&ItemTemplate> {
        self.get(&record.catalog_id)
    }

    /// Raw damage rating: template power plus the enchant bonus, never negative.
    #[must_use]
    pub fn base_damage(&self, record: &ItemRecord) -> i32 {
        let base = self.template_of(record).map_or(0, |t| t.base_power);
        base.saturating_add(record.enchant.saturating_mul(ENCHANT_POWER_STEP))
            .max(0)
    }

    #[must_use]
    pub fn convert_value(&self, record: &ItemRecord) -> i64 {
        self.template_of(record).map_or(0, |t| t.convert_value.max(0))
    }

    #[must_use]
    pub fn is_armour(&self, record: &ItemRecord) -> bool {
        record.catalog_id == BROKEN_ARMOUR_ID || self.template_of(record).is_some_and(|t| t.armour)
    }

    #[must_use]
    pub fn is_ranged(&self, record: &ItemRecord) -> bool {
        self.template_of(record).is_some_and(|t| t.ranged)
    }

    /// Known, non-armour items count as weapons; the broken weapon does too.
    #[must_use]
    pub fn is_weapon(&self, record: &ItemRecord) -> bool {
        if record.catalog_id == BROKEN_WEAPON_ID {
            return true;
        }
        self.template_of(record).is_some_and(|t| !t.armour)
    }
}
