//! Wake gate: does a dormant creature notice the player?
use rand::RngCore;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::config::CombatConfig;
use crate::creature::Creature;
use crate::rng::percent_roll;
use crate::species::SpeciesTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WakeEvent {
    Look,
    Entry,
}

impl WakeEvent {
    /// Normalise a stimulus name; anything other than LOOK/ENTRY is `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LOOK" => Some(Self::Look),
            "ENTRY" => Some(Self::Entry),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Look => "LOOK",
            Self::Entry => "ENTRY",
        }
    }
}

/// Outcome of one wake check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeCheck {
    pub event: Option<WakeEvent>,
    pub threshold: Option<i32>,
    pub roll: Option<i32>,
    pub woke: bool,
}

/// Threshold for `event`: creature field, then species, then config.
#[must_use]
pub fn wake_threshold(
    creature: &Creature,
    event: WakeEvent,
    config: &CombatConfig,
    species: Option<&SpeciesTable>,
) -> i32 {
    let own = match event {
        WakeEvent::Look => creature.wake_on_look,
        WakeEvent::Entry => creature.wake_on_entry,
    };
    own.or_else(|| species.and_then(|table| table.wake_threshold(&creature.template, event)))
        .unwrap_or(match event {
            WakeEvent::Look => config.wake_on_look,
            WakeEvent::Entry => config.wake_on_entry,
        })
}

/// Run the wake check and report every input that decided it.
pub fn check_wake(
    creature: &Creature,
    event: &str,
    rng: &mut dyn RngCore,
    config: &CombatConfig,
    species: Option<&SpeciesTable>,
) -> WakeCheck {
    let Some(event) = WakeEvent::parse(event) else {
        return WakeCheck {
            event: None,
            threshold: None,
            roll: None,
            woke: true,
        };
    };
    let threshold = wake_threshold(creature, event, config, species);
    if threshold <= 0 || threshold >= 100 {
        return WakeCheck {
            event: Some(event),
            threshold: Some(threshold),
            roll: None,
            woke: threshold >= 100,
        };
    }
    let roll = percent_roll(rng);
    WakeCheck {
        event: Some(event),
        threshold: Some(threshold),
        roll: Some(roll),
        woke: roll < threshold,
    }
}

/// Whether `creature` wakes on `event`.
pub fn should_wake(
    creature: &Creature,
    event: &str,
    rng: &mut dyn RngCore,
    config: &CombatConfig,
) -> bool {
    check_wake(creature, event, rng, config, None).woke
}

/// LOOK/ENTRY stimuli implied by a command, resolved form first.
#[must_use]
pub fn wake_events(token: &str, resolved: Option<&str>) -> SmallVec<[WakeEvent; 2]> {
    let mut events: SmallVec<[WakeEvent; 2]> = SmallVec::new();
    for raw in [resolved.unwrap_or_default(), token] {
        let cleaned = raw.trim().to_ascii_uppercase();
        if cleaned.is_empty() {
            continue;
        }
        let parts = std::iter::once(cleaned.as_str())
            .chain(cleaned.split(|c| matches!(c, '/' | ' ' | '-' | ':')));
        for part in parts {
            if let Some(event) = WakeEvent::parse(part)
                && !events.contains(&event)
            {
                events.push(event);
            }
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::CountingRng;
    use crate::world::Pos;
    use rand::rngs::mock::StepRng;

    fn sleeper() -> Creature {
        Creature::new("m1", "rat", Pos::new(2000, 0, 0), 5)
    }

    #[test]
    fn extremes_skip_the_roll() {
        let mut creature = sleeper();
        let config = CombatConfig::default();
        let mut rng = CountingRng::new(StepRng::new(0, 1));
        creature.wake_on_look = Some(0);
        assert!(!should_wake(&creature, "look", &mut rng, &config));
        creature.wake_on_look = Some(100);
        assert!(should_wake(&creature, "LOOK", &mut rng, &config));
        assert!(should_wake(&creature, "sneeze", &mut rng, &config));
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn config_threshold_applies_without_override() {
        let creature = sleeper();
        let config = CombatConfig {
            wake_on_entry: 50,
            ..CombatConfig::default()
        };
        // StepRng(0) always rolls 0.
        let mut low = StepRng::new(0, 0);
        let check = check_wake(&creature, "entry", &mut low, &config, None);
        assert_eq!(check.threshold, Some(50));
        assert_eq!(check.roll, Some(0));
        assert!(check.woke);
    }

    #[test]
    fn species_threshold_sits_between_creature_and_config() {
        let mut table = SpeciesTable::default();
        table.insert(
            "rat",
            crate::species::SpeciesProfile {
                wake_on_look: Some(100),
                ..crate::species::SpeciesProfile::default()
            },
        );
        let mut creature = sleeper();
        let config = CombatConfig::default();
        assert_eq!(wake_threshold(&creature, WakeEvent::Look, &config, Some(&table)), 100);
        creature.wake_on_look = Some(3);
        assert_eq!(wake_threshold(&creature, WakeEvent::Look, &config, Some(&table)), 3);
        assert_eq!(wake_threshold(&creature, WakeEvent::Entry, &config, Some(&table)), 10);
    }

    #[test]
    fn events_come_from_resolved_then_token() {
        let events = wake_events("l", Some("look"));
        assert_eq!(events.as_slice(), &[WakeEvent::Look]);
        let events = wake_events("travel:entry", Some("MOVE/LOOK"));
        assert_eq!(events.as_slice(), &[WakeEvent::Look, WakeEvent::Entry]);
        assert!(wake_events("north", None).is_empty());
    }
}
