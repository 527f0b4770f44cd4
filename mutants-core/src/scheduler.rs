//! One game tick: player action, creature reactions, status effects, free
//! actions, population maintenance and the end-of-tick checkpoint.
use anyhow::Context as _;
use serde::Serialize;
use serde_json::json;

use crate::ai::{DispatchSummary, execute_random_action, on_player_command};
use crate::ai::emote::emit_emote;
use crate::constants::{
    LOG_CHECK_POS, LOG_STATUS_EXPIRED, LOG_TURN_BONUS, LOG_TURN_FAILURE, LOG_TURN_FREE,
    LOG_TURN_RESPAWN, LOG_TURN_TICK, TURN_STREAM, WAKE_STREAM,
};
use crate::context::{BonusAction, Context, ContextExt, ContextKey, ContextValue, SlotGuard};
use crate::creature::CreatureId;
use crate::player::PlayerId;
use crate::rng::{RngHandle, RngPool, percent_roll};
use crate::state::SimState;
use crate::status::ExpiredStatus;

/// Work deferred to the free-action drain of the current tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FreeAction {
    Emote { monster: CreatureId },
    Bonus { monster: CreatureId },
    PlayerRespawn { player: PlayerId },
}

/// Single-shot queue: `take_all` empties it, so anything queued while the
/// drain runs waits for the next tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeActionQueue {
    pending: Vec<FreeAction>,
}

impl FreeActionQueue {
    pub fn push(&mut self, action: FreeAction) {
        self.pending.push(action);
    }

    pub fn take_all(&mut self) -> Vec<FreeAction> {
        std::mem::take(&mut self.pending)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn pending(&self) -> &[FreeAction] {
        &self.pending
    }
}

/// Command the player action reports back, normalised to `(token, resolved)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandEcho {
    pub token: String,
    pub resolved: Option<String>,
}

impl CommandEcho {
    #[must_use]
    pub fn new(token: &str, resolved: Option<&str>) -> Self {
        Self {
            token: token.to_string(),
            resolved: resolved.map(str::to_string),
        }
    }
}

impl From<()> for CommandEcho {
    fn from((): ()) -> Self {
        Self::default()
    }
}

impl From<&str> for CommandEcho {
    fn from(token: &str) -> Self {
        Self::new(token, None)
    }
}

impl From<String> for CommandEcho {
    fn from(token: String) -> Self {
        Self {
            token,
            resolved: None,
        }
    }
}

impl From<(&str, &str)> for CommandEcho {
    fn from((token, resolved): (&str, &str)) -> Self {
        Self::new(token, Some(resolved))
    }
}

impl From<(String, Option<String>)> for CommandEcho {
    fn from((token, resolved): (String, Option<String>)) -> Self {
        Self { token, resolved }
    }
}

impl<T: Into<Self>> From<Option<T>> for CommandEcho {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PlayerAction,
    FreeActions,
    Spawner,
    Checkpoint,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PlayerAction => "player_action",
            Self::FreeActions => "free_actions",
            Self::Spawner => "spawner",
            Self::Checkpoint => "checkpoint",
        }
    }
}

/// A swallowed failure from one tick stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub command: CommandEcho,
    pub dispatch: DispatchSummary,
    pub expired: Vec<ExpiredStatus>,
    pub free_actions: Vec<FreeAction>,
    pub spawned: Vec<CreatureId>,
    pub failures: Vec<StageFailure>,
    /// Draws taken from the turn stream this tick.
    pub rng_draws: u64,
}

/// Owns the tick counter and the streams every tick draws from.
#[derive(Debug, Clone)]
pub struct TurnScheduler {
    pool: RngPool,
    wake_pool: Option<RngPool>,
    stream: String,
}

impl TurnScheduler {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            pool: RngPool::new(seed),
            wake_pool: None,
            stream: TURN_STREAM.to_string(),
        }
    }

    /// Draw wake checks from their own stream seeded with `seed`.
    #[must_use]
    pub fn with_wake_seed(mut self, seed: u64) -> Self {
        self.wake_pool = Some(RngPool::new(seed));
        self
    }

    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.pool.tick(&self.stream)
    }

    #[must_use]
    pub const fn pool(&self) -> &RngPool {
        &self.pool
    }

    /// Start over from `seed` at tick zero.
    pub fn reseed(&mut self, seed: u64) {
        self.pool = RngPool::new(seed);
        if let Some(wake) = self.wake_pool.as_mut() {
            *wake = RngPool::new(wake.seed());
        }
    }

    /// Run one full tick around `player_action`.
    ///
    /// The turn stream is bound under [`ContextKey::AiRng`] for the duration
    /// of the tick and the previous binding is restored afterwards, whatever
    /// happened in between.
    ///
    /// An error from `player_action` is recorded like any other stage failure
    /// and the tick carries on with an empty command.
    ///
    /// # Errors
    ///
    /// Only a failure to advance a tick counter. Every stage logs and
    /// swallows its failures into [`TickReport::failures`].
    pub fn tick<F, R>(
        &mut self,
        state: &mut SimState,
        ctx: &mut dyn Context,
        player_action: F,
    ) -> anyhow::Result<TickReport>
    where
        F: FnOnce(&mut SimState, &dyn Context) -> anyhow::Result<R>,
        R: Into<CommandEcho>,
    {
        let tick = self
            .pool
            .advance_tick(&self.stream, 1)
            .context("advancing the turn stream")?;
        state.turnlog.set_tick(tick);
        state.turnlog.emit(
            LOG_TURN_TICK,
            json!({ "tick": tick, "stream": self.stream }),
        );
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        if self.wake_pool.is_none()
            && let Some(seed) = state.config.rng_seeds.wake
        {
            self.wake_pool = Some(RngPool::new(seed));
        }
        let wake = match self.wake_pool.as_mut() {
            Some(pool) => {
                pool.advance_tick(WAKE_STREAM, 1)
                    .context("advancing the wake stream")?;
                Some(pool.get_rng(WAKE_STREAM))
            }
            None => None,
        };

        let rng = self.pool.get_rng(&self.stream);
        let draws_before = rng.draws();
        {
            let mut ai_guard =
                SlotGuard::bind(ctx, ContextKey::AiRng, ContextValue::Rng(rng.clone()));
            match wake {
                Some(wake) => {
                    let mut wake_guard = SlotGuard::bind(
                        &mut *ai_guard,
                        ContextKey::WakeRng,
                        ContextValue::Rng(wake),
                    );
                    run_stages(state, &mut *wake_guard, &rng, player_action, &mut report)
                }
                None => run_stages(state, &mut *ai_guard, &rng, player_action, &mut report),
            }
        }
        report.rng_draws = rng.draws().saturating_sub(draws_before);

        check_positions(state);
        checkpoint(state, &mut report);
        Ok(report)
    }
}

fn record_failure(state: &mut SimState, report: &mut TickReport, stage: Stage, message: String) {
    log::error!("tick stage {} failed: {message}", stage.as_str());
    state.turnlog.emit(
        LOG_TURN_FAILURE,
        json!({ "stage": stage.as_str(), "error": message }),
    );
    report.failures.push(StageFailure { stage, message });
}

fn run_stages<F, R>(
    state: &mut SimState,
    ctx: &mut dyn Context,
    rng: &RngHandle,
    player_action: F,
    report: &mut TickReport,
) where
    F: FnOnce(&mut SimState, &dyn Context) -> anyhow::Result<R>,
    R: Into<CommandEcho>,
{
    let command = match player_action(state, &*ctx) {
        Ok(command) => command.into(),
        Err(err) => {
            record_failure(state, report, Stage::PlayerAction, format!("{err:#}"));
            CommandEcho::default()
        }
    };
    report.dispatch = on_player_command(
        state,
        &*ctx,
        &command.token,
        command.resolved.as_deref(),
    );
    report.command = command;

    if let Some(status) = state.status.as_mut() {
        let expired = status.tick(1);
        for entry in &expired {
            state.turnlog.emit(
                LOG_STATUS_EXPIRED,
                json!({ "target": entry.target, "status": entry.status }),
            );
        }
        report.expired = expired;
    }

    let pending = state.free_actions.take_all();
    for action in &pending {
        if let Err(err) = run_free_action(state, ctx, rng, action) {
            record_failure(state, report, Stage::FreeActions, format!("{err:#}"));
        }
    }
    report.free_actions = pending;

    if let Some(spawner) = state.spawner.as_mut() {
        let outcome = spawner.tick(
            state.creatures.as_mut(),
            &mut state.turnlog,
            &mut *rng.borrow_mut(),
        );
        report.spawned = outcome.spawned;
        for err in outcome.errors {
            record_failure(state, report, Stage::Spawner, err.to_string());
        }
    }
}

fn run_free_action(
    state: &mut SimState,
    ctx: &mut dyn Context,
    rng: &RngHandle,
    action: &FreeAction,
) -> anyhow::Result<()> {
    match action {
        FreeAction::Bonus { monster } => {
            let bias = ctx
                .percent(ContextKey::BonusPickupPct)
                .unwrap_or(state.config.bonus_pickup_pct);
            let roll = percent_roll(&mut *rng.borrow_mut());
            let force_pickup = roll < bias;
            let guard = SlotGuard::bind(
                ctx,
                ContextKey::BonusAction,
                ContextValue::Bonus(BonusAction {
                    monster_id: monster.clone(),
                    force_pickup,
                }),
            );
            let outcome = execute_random_action(state, &*guard, &mut *rng.borrow_mut(), monster)
                .with_context(|| format!("bonus action for {}", monster.as_str()))?;
            drop(guard);
            state.turnlog.emit(
                LOG_TURN_BONUS,
                json!({
                    "monster": monster.as_str(),
                    "roll": roll,
                    "bias": bias,
                    "force_pickup": force_pickup,
                    "gate": outcome.decision.gate.as_str(),
                }),
            );
        }
        FreeAction::PlayerRespawn { player } => {
            let respawn_point = state.respawn_point;
            let mut restored = None;
            if let Some(active) = state.players.active_mut()
                && &active.id == player
            {
                active.hp.current = active.hp.max;
                if let Some(pos) = respawn_point {
                    active.pos = pos;
                }
                restored = Some(active.pos);
            }
            let pos = restored
                .with_context(|| format!("respawn for inactive player {}", player.0))?;
            state.players.mark_dirty();
            state.turnlog.emit(
                LOG_TURN_RESPAWN,
                json!({ "player": player.0, "pos": pos.to_string() }),
            );
        }
        FreeAction::Emote { monster } => {
            let creature = state
                .creatures
                .get(monster)
                .filter(|creature| creature.is_alive())
                .with_context(|| format!("free emote for missing creature {}", monster.as_str()))?;
            let line = emit_emote(creature, None, &mut state.feedback, &mut *rng.borrow_mut());
            state.turnlog.emit(
                LOG_TURN_FREE,
                json!({ "monster": monster.as_str(), "line": format!("{line:?}") }),
            );
        }
    }
    Ok(())
}

/// Drop any transient view of the player's position, logging it first.
fn check_positions(state: &mut SimState) {
    let Some(player) = state.players.active_mut() else {
        return;
    };
    let Some(view) = player.view_pos.take() else {
        return;
    };
    let canonical = player.pos;
    let id = player.id.0.clone();
    if view != canonical {
        log::warn!("player {id} view position {view} disagrees with {canonical}");
    }
    state.players.mark_dirty();
    state.turnlog.emit(
        LOG_CHECK_POS,
        json!({
            "player": id,
            "view": view.to_string(),
            "canonical": canonical.to_string(),
            "matches": view == canonical,
        }),
    );
}

fn checkpoint(state: &mut SimState, report: &mut TickReport) {
    if state.creatures.is_dirty()
        && let Err(err) = state.creatures.save()
    {
        record_failure(state, report, Stage::Checkpoint, format!("creatures: {err}"));
    }
    if state.players.is_dirty()
        && let Err(err) = state.players.save()
    {
        record_failure(state, report, Stage::Checkpoint, format!("player: {err}"));
    }
}

/// Queue a free emote for `monster` on the current tick's drain.
pub fn queue_free_emote(state: &mut SimState, monster: &CreatureId) {
    state.free_actions.push(FreeAction::Emote {
        monster: monster.clone(),
    });
}

/// Queue one more cascade for `monster`, biased toward picking up loot.
pub fn queue_bonus_action(state: &mut SimState, monster: &CreatureId) {
    state.free_actions.push(FreeAction::Bonus {
        monster: monster.clone(),
    });
}

pub fn queue_player_respawn(state: &mut SimState, player: &PlayerId) {
    state.free_actions.push(FreeAction::PlayerRespawn {
        player: player.clone(),
    });
}
