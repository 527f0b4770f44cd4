use mutants_core::ai::cascade::GateDetail;
use mutants_core::rng::CountingRng;
use mutants_core::{
    BROKEN_WEAPON_ID, CombatConfig, ContextMap, Creature, CreatureId, Gate, Health, ItemCatalog,
    ItemTemplate, MemoryCreatureStore, MemoryPlayerStore, Owner, Player, PlayerId, Pos, SimState,
    SpeciesTable, evaluate_cascade, execute_random_action,
};
use rand::rngs::mock::StepRng;

const LAIR: Pos = Pos::new(2000, 4, 4);

fn world(creature: &Creature, player_pos: Pos, config: CombatConfig) -> SimState {
    let mut catalog = ItemCatalog::with_placeholders();
    catalog.insert(ItemTemplate::new("opal", 0, 4000));
    catalog.insert(ItemTemplate::new("axe", 9, 40));
    SimState::new(
        config,
        Box::new(MemoryCreatureStore::from_creatures([creature.clone()])),
        Box::new(MemoryPlayerStore::with_active(Player::new(
            "p1", player_pos, 50,
        ))),
    )
    .with_catalog(catalog)
}

fn zero_roll() -> CountingRng<StepRng> {
    CountingRng::new(StepRng::new(0, 0))
}

#[test]
fn wounded_creature_flees_on_zero_roll() {
    let mut creature = Creature::new("m1", "ogre", LAIR, 20);
    creature.hp = Health::new(4, 20);
    let config = CombatConfig {
        flee_pct: 10,
        ..CombatConfig::default()
    };
    let mut state = world(&creature, LAIR, config);
    let mut rng = zero_roll();
    let decision = evaluate_cascade(&creature, &mut state, &ContextMap::new(), &mut rng);
    assert_eq!(decision.gate, Gate::Flee);
    assert_eq!(decision.gate.as_str(), "FLEE");
    assert_eq!(decision.roll, Some(0));
    assert_eq!(decision.threshold, Some(10));
    assert_eq!(rng.draws(), 1);
    assert_eq!(state.turnlog.of_kind("AI/GATE").count(), 1);
}

#[test]
fn cracked_weapon_halves_attack_threshold() {
    let mut creature = Creature::new("m1", "ogre", LAIR, 20);
    let config = CombatConfig {
        attack_pct: 60,
        ..CombatConfig::default()
    };
    let mut state = world(&creature, LAIR, config);
    let broken = state
        .items
        .mint(BROKEN_WEAPON_ID, 0, Owner::Bag(creature.id.clone()));
    creature.wielded = Some(broken);
    state.creatures.insert(creature.clone());

    let decision = evaluate_cascade(&creature, &mut state, &ContextMap::new(), &mut zero_roll());
    assert_eq!(decision.gate, Gate::Attack);
    assert_eq!(decision.threshold, Some(30));
    assert!(decision.snapshot.cracked_weapon);
    assert_eq!(decision.detail, GateDetail::Attack { cracked_weapon: true });
}

#[test]
fn low_ions_convert_tracked_loot_for_full_value() {
    let mut creature = Creature::new("m1", "ogre", LAIR, 20);
    creature.ions = 10;
    creature.ions_max = 400;
    let mut state = world(&creature, Pos::new(2000, 0, 0), CombatConfig::default());
    let opal = state
        .items
        .mint("opal", 0, Owner::Bag(creature.id.clone()));
    state
        .creatures
        .get_mut(&creature.id)
        .unwrap()
        .ai
        .picked_up
        .insert(opal);

    let outcome =
        execute_random_action(&mut state, &ContextMap::new(), &mut zero_roll(), &creature.id)
            .unwrap();
    assert_eq!(outcome.decision.gate, Gate::Convert);
    let after = state.creature(&creature.id).unwrap();
    assert_eq!(after.ions, 4010);
    assert!(state.items.bag(&creature.id).is_empty());
    assert!(!state.items.contains(opal));
}

#[test]
fn separated_target_pursues_without_drawing() {
    let mut creature = Creature::new("m1", "ogre", LAIR, 20);
    creature.target_player_id = Some(PlayerId::new("p1"));
    let mut state = world(&creature, Pos::new(2000, 1, 4), CombatConfig::default());
    let mut rng = zero_roll();
    let decision = evaluate_cascade(&creature, &mut state, &ContextMap::new(), &mut rng);
    assert_eq!(decision.gate, Gate::Pursue);
    assert_eq!(decision.roll, None);
    assert_eq!(rng.draws(), 0);
    assert_eq!(
        decision.detail,
        GateDetail::Pursue {
            from: LAIR,
            target: Pos::new(2000, 1, 4),
        }
    );
}

#[test]
fn successful_flee_roll_beats_every_later_gate() {
    for (ions, target, loot) in [(0, false, false), (300, true, false), (5, true, true)] {
        let mut creature = Creature::new("m1", "ogre", LAIR, 20);
        creature.hp = Health::new(2, 20);
        creature.ions = ions;
        creature.ions_max = 400;
        if target {
            creature.target_player_id = Some(PlayerId::new("p1"));
        }
        let config = CombatConfig {
            flee_pct: 1,
            attack_pct: 100,
            pickup_pct: 100,
            heal_pct: 100,
            ..CombatConfig::default()
        };
        let mut state = world(&creature, Pos::new(2000, 0, 0), config);
        if loot {
            state.items.mint("axe", 0, Owner::Ground(LAIR));
        }
        let decision =
            evaluate_cascade(&creature, &mut state, &ContextMap::new(), &mut zero_roll());
        assert_eq!(decision.gate, Gate::Flee, "ions={ions} target={target} loot={loot}");
    }
}

#[test]
fn species_overrides_stay_within_percent_range() {
    let table = SpeciesTable::from_json_str(
        r#"{
            "ogre": { "gates": { "ATTACK": { "set": 250 }, "FLEE": { "add": -500 }, "EMOTE": 90 } }
        }"#,
    )
    .unwrap();
    for base in [-40, 0, 35, 100, 180] {
        for gate in Gate::ORDER {
            let value = table.threshold("ogre", gate, base);
            assert!((0..=100).contains(&value), "{gate} from {base} gave {value}");
        }
    }
    assert_eq!(table.threshold("ogre", Gate::Attack, 10), 100);
    assert_eq!(table.threshold("ogre", Gate::Flee, 90), 0);
    assert_eq!(table.threshold("ogre", Gate::Emote, 20), 100);

    let mut creature = Creature::new("m1", "ogre", LAIR, 20);
    creature.hp = Health::new(1, 20);
    let mut state = world(&creature, LAIR, CombatConfig::default()).with_species(table);
    let mut rng = zero_roll();
    let decision = evaluate_cascade(&creature, &mut state, &ContextMap::new(), &mut rng);
    assert_eq!(decision.gate, Gate::Attack);
    assert_eq!(decision.threshold, Some(100));
    // FLEE clamped to zero fails without a roll; ATTACK draws once.
    assert_eq!(rng.draws(), 1);
    assert!(!decision.trail[0].triggered);
}

#[test]
fn missing_creature_reports_an_error() {
    let creature = Creature::new("m1", "ogre", LAIR, 20);
    let mut state = world(&creature, LAIR, CombatConfig::default());
    let err = execute_random_action(
        &mut state,
        &ContextMap::new(),
        &mut zero_roll(),
        &CreatureId::new("nobody"),
    )
    .unwrap_err();
    assert!(err.to_string().contains("nobody"));
}
