use crate::context::{AiContext, Context};
use crate::scheduler::{CommandEcho, TickReport, TurnScheduler};
use crate::state::SimState;

/// High-level session wrapper binding a turn scheduler to a world and its context.
pub struct GameSession {
    scheduler: TurnScheduler,
    state: SimState,
    ctx: AiContext,
}

impl GameSession {
    /// Construct a session whose streams derive from `seed`.
    #[must_use]
    pub fn new(state: SimState, seed: u64) -> Self {
        let mut scheduler = TurnScheduler::new(seed);
        if let Some(wake) = state.config.rng_seeds.wake {
            scheduler = scheduler.with_wake_seed(wake);
        }
        Self {
            scheduler,
            state,
            ctx: AiContext::default(),
        }
    }

    /// Replace the context the scheduler binds streams into.
    #[must_use]
    pub fn with_context(mut self, ctx: AiContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Advance one tick for a command that needs no player-side work.
    ///
    /// # Errors
    ///
    /// See [`TurnScheduler::tick`].
    pub fn command(&mut self, command: impl Into<CommandEcho>) -> anyhow::Result<TickReport> {
        let command = command.into();
        self.scheduler
            .tick(&mut self.state, &mut self.ctx, move |_, _| Ok(command))
    }

    /// Advance one tick around an arbitrary player action.
    ///
    /// # Errors
    ///
    /// See [`TurnScheduler::tick`].
    pub fn tick<F, R>(&mut self, player_action: F) -> anyhow::Result<TickReport>
    where
        F: FnOnce(&mut SimState, &dyn Context) -> anyhow::Result<R>,
        R: Into<CommandEcho>,
    {
        self.scheduler
            .tick(&mut self.state, &mut self.ctx, player_action)
    }

    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.scheduler.current_tick()
    }

    #[must_use]
    pub const fn state(&self) -> &SimState {
        &self.state
    }

    /// Apply a closure to the mutable world.
    pub fn with_state_mut<R>(&mut self, f: impl FnOnce(&mut SimState) -> R) -> R {
        f(&mut self.state)
    }

    #[must_use]
    pub const fn context(&self) -> &AiContext {
        &self.ctx
    }

    /// Deterministically restart the streams from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.scheduler.reseed(seed);
    }

    /// Consume the session, returning the world.
    #[must_use]
    pub fn into_state(self) -> SimState {
        self.state
    }
}
