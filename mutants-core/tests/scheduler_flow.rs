use mutants_core::config::RngSeeds;
use mutants_core::context::BonusAction;
use mutants_core::creature::InnateAttack;
use mutants_core::scheduler::Stage;
use mutants_core::{
    AiContext, CombatConfig, Context, ContextExt, ContextKey, ContextMap, ContextValue, Creature,
    CreatureId, FreeAction, MemoryCreatureStore, MemoryPlayerStore, Player, PlayerId, Pos,
    RngHandle, SimState, StatusManager, TurnScheduler, on_player_command, queue_bonus_action,
    queue_free_emote,
};

const CAVE: Pos = Pos::new(2000, 0, 0);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn wyrm() -> Creature {
    let mut wyrm = Creature::new("wyrm", "cave_wyrm", CAVE, 40);
    wyrm.wake_on_entry = Some(0);
    wyrm.innate_attack = Some(InnateAttack {
        name: "bite".to_string(),
        power: 60,
    });
    wyrm
}

fn arena(config: CombatConfig) -> SimState {
    SimState::new(
        config,
        Box::new(MemoryCreatureStore::from_creatures([wyrm()])),
        Box::new(MemoryPlayerStore::with_active(Player::new("p1", CAVE, 10))),
    )
    .with_respawn_point(Pos::new(2000, -5, -5))
}

fn no_credits() -> ContextMap {
    let mut ctx = ContextMap::new();
    ctx.set(ContextKey::CreditWeights, Some(ContextValue::Weights(vec![1.0])));
    ctx
}

#[test]
fn binding_is_restored_for_map_and_struct_contexts() {
    init_logging();
    let mut scheduler = TurnScheduler::new(21);
    let mut state = arena(CombatConfig::default());

    let mut map = no_credits();
    scheduler
        .tick(&mut state, &mut map, |_, ctx| {
            assert!(ctx.rng(ContextKey::AiRng).is_some());
            Ok("wait")
        })
        .unwrap();
    assert!(ctx_is_unbound(&map));

    let previous = RngHandle::from_seed(5);
    let mut slots = AiContext {
        ai_rng: Some(ContextValue::Rng(previous.clone())),
        ..AiContext::default()
    };
    queue_free_emote(&mut state, &CreatureId::new("ghost"));
    let report = scheduler
        .tick(&mut state, &mut slots, |_, ctx| {
            let bound = ctx.rng(ContextKey::AiRng).unwrap();
            assert!(!bound.same_stream(&previous));
            Ok(())
        })
        .unwrap();
    assert_eq!(report.failures[0].stage, Stage::FreeActions);
    assert!(slots.rng(ContextKey::AiRng).unwrap().same_stream(&previous));
}

fn ctx_is_unbound(ctx: &ContextMap) -> bool {
    !ctx.contains(ContextKey::AiRng) && !ctx.contains(ContextKey::BonusAction)
}

#[test]
fn work_queued_during_the_drain_waits_for_the_next_tick() {
    let config = CombatConfig {
        attack_pct: 100,
        ..CombatConfig::default()
    };
    let mut state = arena(config);
    let mut scheduler = TurnScheduler::new(8);
    let mut ctx = no_credits();

    queue_bonus_action(&mut state, &CreatureId::new("wyrm"));
    let first = scheduler.tick(&mut state, &mut ctx, |_, _| Ok("wait")).unwrap();
    assert_eq!(
        first.free_actions,
        vec![FreeAction::Bonus {
            monster: CreatureId::new("wyrm")
        }]
    );
    assert!(first.failures.is_empty());
    assert!(!state.active_player().unwrap().hp.is_alive());
    assert_eq!(
        state.free_actions.pending(),
        &[
            FreeAction::PlayerRespawn {
                player: PlayerId::new("p1")
            },
            FreeAction::Bonus {
                monster: CreatureId::new("wyrm")
            },
        ]
    );
    assert_eq!(state.turnlog.of_kind("TURN/RESPAWN").count(), 0);

    let second = scheduler.tick(&mut state, &mut ctx, |_, _| Ok("wait")).unwrap();
    assert_eq!(second.free_actions.len(), 2);
    assert!(state.free_actions.is_empty());
    let player = state.active_player().unwrap();
    assert_eq!(player.hp.current, player.hp.max);
    assert_eq!(player.pos, Pos::new(2000, -5, -5));
    assert_eq!(state.turnlog.of_kind("TURN/BONUS").count(), 2);
    assert!(ctx_is_unbound(&ctx));
}

#[test]
fn bonus_pickup_override_forces_the_pickup_gate() {
    let mut state = arena(CombatConfig::default());
    state.items.mint("gem", 0, mutants_core::Owner::Ground(CAVE));
    let mut ctx = no_credits();
    ctx.set(ContextKey::BonusPickupPct, Some(ContextValue::Percent(100)));
    queue_bonus_action(&mut state, &CreatureId::new("wyrm"));

    let mut scheduler = TurnScheduler::new(2);
    scheduler.tick(&mut state, &mut ctx, |_, _| Ok(())).unwrap();
    let bonus = state.turnlog.of_kind("TURN/BONUS").next().unwrap();
    assert_eq!(bonus.get("force_pickup"), Some(&serde_json::json!(true)));
    assert_eq!(bonus.get("gate"), Some(&serde_json::json!("PICKUP")));
    assert_eq!(state.items.bag(&CreatureId::new("wyrm")).len(), 1);
    assert_eq!(ctx.bonus_action(), None::<BonusAction>);
}

#[test]
fn stages_log_in_order_and_checkpoint_saves() {
    let mut status = StatusManager::default();
    status.apply("p1", "poisoned", 1);
    let mut state = arena(CombatConfig::default()).with_status(status);
    state.players.mark_dirty();
    let mut scheduler = TurnScheduler::new(13);
    let report = scheduler
        .tick(&mut state, &mut no_credits(), |_, _| Ok(("l", "look")))
        .unwrap();
    assert_eq!(report.command.token, "l");
    assert_eq!(report.expired.len(), 1);

    let kinds: Vec<&str> = state
        .turnlog
        .entries()
        .iter()
        .map(|entry| entry.kind.as_str())
        .collect();
    let position = |kind: &str| kinds.iter().position(|k| *k == kind).unwrap();
    assert_eq!(kinds[0], "TURN/TICK");
    assert!(position("AI/WAKE") < position("STATUS/EXPIRED"));
    assert!(!state.players.is_dirty());
    assert!(!state.creatures.is_dirty());
}

fn sleeper_den(config: CombatConfig) -> SimState {
    let mut sleeper = Creature::new("sleeper", "cave_rat", CAVE, 8);
    sleeper.wake_on_entry = Some(0);
    sleeper.wake_on_look = Some(50);
    SimState::new(
        config,
        Box::new(MemoryCreatureStore::from_creatures([sleeper])),
        Box::new(MemoryPlayerStore::with_active(Player::new("p1", CAVE, 10))),
    )
}

#[test]
fn wake_checks_draw_from_their_own_stream() {
    init_logging();
    let config = CombatConfig {
        rng_seeds: RngSeeds { wake: Some(77) },
        ..CombatConfig::default()
    };
    let mut state = sleeper_den(config);
    let mut scheduler = TurnScheduler::new(31);
    let mut ctx = no_credits();
    let mut wake_stream = None;
    let report = scheduler
        .tick(&mut state, &mut ctx, |_, bound| {
            let turn = bound.rng(ContextKey::AiRng).unwrap();
            let wake = bound.rng(ContextKey::WakeRng).unwrap();
            assert!(!wake.same_stream(&turn));
            wake_stream = Some(wake);
            Ok("look")
        })
        .unwrap();
    assert!(wake_stream.unwrap().draws() >= 1);
    assert_eq!(state.turnlog.of_kind("AI/WAKE").count(), 1);
    assert!(!ctx.contains(ContextKey::WakeRng));
    // Only a woken sleeper's credit roll touches the turn stream.
    let woke = report.dispatch.dormant.is_empty();
    assert_eq!(report.rng_draws, u64::from(woke));

    let mut seeded = sleeper_den(CombatConfig::default());
    TurnScheduler::new(31)
        .with_wake_seed(77)
        .tick(&mut seeded, &mut no_credits(), |_, _| Ok("look"))
        .unwrap();
    assert_eq!(seeded.turnlog.render(), state.turnlog.render());

    let mut shared = sleeper_den(CombatConfig::default());
    let baseline = TurnScheduler::new(31)
        .tick(&mut shared, &mut no_credits(), |_, bound| {
            assert!(bound.rng(ContextKey::WakeRng).is_none());
            Ok("look")
        })
        .unwrap();
    let woke = baseline.dispatch.dormant.is_empty();
    assert!(baseline.rng_draws > u64::from(woke));
}

#[test]
fn wake_handle_aliasing_the_turn_stream_is_ignored() {
    let mut state = sleeper_den(CombatConfig::default());
    let shared = RngHandle::from_seed(12);
    let mut ctx = no_credits();
    ctx.set(ContextKey::AiRng, Some(ContextValue::Rng(shared.clone())));
    ctx.set(ContextKey::WakeRng, Some(ContextValue::Rng(shared.clone())));

    let summary = on_player_command(&mut state, &ctx, "look", None);
    assert_eq!(summary.player, Some(PlayerId::new("p1")));
    assert!(shared.draws() >= 1);
    assert_eq!(state.turnlog.of_kind("AI/WAKE").count(), 1);
}
