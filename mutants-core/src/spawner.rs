//! Population maintenance run once per tick after every reaction.
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::constants::LOG_SPAWN;
use crate::creature::{Creature, CreatureId, Health, InnateAttack};
use crate::store::CreatureStore;
use crate::turnlog::TurnLog;
use crate::world::Pos;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpawnError {
    #[error("year {year} has no spawn templates")]
    NoTemplates { year: i32 },
    #[error("year {year} has no spawn points")]
    NoSpawnPoints { year: i32 },
}

/// What one spawner pass created, and the years it could not populate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnReport {
    pub spawned: Vec<CreatureId>,
    pub errors: Vec<SpawnError>,
}

pub trait Spawner {
    /// Top up the population. A year that cannot be populated is reported
    /// and the pass moves on to the next one.
    fn tick(
        &mut self,
        creatures: &mut dyn CreatureStore,
        log: &mut TurnLog,
        rng: &mut dyn RngCore,
    ) -> SpawnReport;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnTemplate {
    pub template: String,
    pub hp: i32,
    #[serde(default = "SpawnTemplate::default_level")]
    pub level: i32,
    #[serde(default)]
    pub ions_max: i64,
    #[serde(default)]
    pub innate_attack: Option<InnateAttack>,
}

impl SpawnTemplate {
    const fn default_level() -> i32 {
        1
    }

    #[must_use]
    pub fn new(template: &str, hp: i32) -> Self {
        Self {
            template: template.to_string(),
            hp,
            level: 1,
            ions_max: 0,
            innate_attack: None,
        }
    }

    fn instantiate(&self, id: &str, pos: Pos) -> Creature {
        let mut creature = Creature::new(id, &self.template, pos, self.hp);
        creature.hp = Health::full(self.hp.max(1));
        creature.level = self.level.max(1);
        creature.ions_max = self.ions_max.max(0);
        creature.ions = creature.ions_max;
        creature.innate_attack.clone_from(&self.innate_attack);
        creature
    }
}

/// Minimum population for one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearFloor {
    pub minimum: usize,
    pub templates: Vec<SpawnTemplate>,
    pub spawn_points: Vec<(i32, i32)>,
}

/// Keeps each configured year at or above its floor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorSpawner {
    pub floors: BTreeMap<i32, YearFloor>,
    #[serde(default)]
    next_serial: u64,
}

impl FloorSpawner {
    #[must_use]
    pub fn with_floor(mut self, year: i32, floor: YearFloor) -> Self {
        self.floors.insert(year, floor);
        self
    }

    fn living_in_year(creatures: &dyn CreatureStore, year: i32) -> usize {
        creatures
            .list_all()
            .iter()
            .filter_map(|id| creatures.get(id))
            .filter(|creature| creature.is_alive() && creature.pos.is_some_and(|p| p.year == year))
            .count()
    }

    /// Next `template#serial` id not already held by the store.
    fn fresh_id(serial: &mut u64, creatures: &dyn CreatureStore, template: &str) -> CreatureId {
        loop {
            *serial = serial.saturating_add(1);
            let id = CreatureId::new(&format!("{template}#{serial}"));
            if creatures.get(&id).is_none() {
                return id;
            }
            log::debug!("spawn id {} already taken", id.as_str());
        }
    }
}

impl Spawner for FloorSpawner {
    fn tick(
        &mut self,
        creatures: &mut dyn CreatureStore,
        log: &mut TurnLog,
        rng: &mut dyn RngCore,
    ) -> SpawnReport {
        let mut report = SpawnReport::default();
        for (&year, floor) in &self.floors {
            let living = Self::living_in_year(creatures, year);
            if living >= floor.minimum {
                continue;
            }
            if floor.templates.is_empty() {
                report.errors.push(SpawnError::NoTemplates { year });
                continue;
            }
            if floor.spawn_points.is_empty() {
                report.errors.push(SpawnError::NoSpawnPoints { year });
                continue;
            }
            for _ in living..floor.minimum {
                let template = &floor.templates[rng.gen_range(0..floor.templates.len())];
                let (x, y) = floor.spawn_points[rng.gen_range(0..floor.spawn_points.len())];
                let id = Self::fresh_id(&mut self.next_serial, creatures, &template.template);
                let creature = template.instantiate(id.as_str(), Pos::new(year, x, y));
                log.emit(
                    LOG_SPAWN,
                    json!({ "monster": creature.id.as_str(), "template": creature.template, "pos": creature.pos.map(|p| p.to_string()) }),
                );
                report.spawned.push(creature.id.clone());
                creatures.insert(creature);
            }
        }
        report
    }
}
